//! Completion-context state machine
//!
//! A detached context receives the identity provider's redirect and
//! reports the result back to the context that opened it. The channel
//! is best-effort with no acknowledgment, so success is broadcast on a
//! fixed redundant schedule and the token is additionally persisted to
//! a recoverable store before any broadcast. Termination of the
//! context is the only cancellation path; pending timers are discarded
//! at teardown, not awaited.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::message::{CompletionParams, HandshakeMessage};
use crate::constants::{
    ERROR_CLOSE_DELAY, HANDSHAKE_TIMEOUT_ERROR, MAX_PARAM_RETRIES, PARAM_RETRY_DELAY,
    RECOVERED_TOKEN_KEY, SUCCESS_BROADCAST_OFFSETS, SUCCESS_CLOSE_DELAY,
};
use crate::session::ClientStore;

/// Completion-context states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingParams,
    ResolvedSuccess,
    ResolvedError,
    Closing,
}

/// The completion context's own finite-state record. Lives for the
/// lifetime of the completion context only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeSession {
    pub state: HandshakeState,
    /// Broadcasts actually sent
    pub attempts_sent: u32,
}

impl HandshakeSession {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: HandshakeState::AwaitingParams,
            attempts_sent: 0,
        }
    }
}

impl Default for HandshakeSession {
    fn default() -> Self {
        Self::new()
    }
}

/// What the invocation parameters demand, decided once per parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionPlan {
    /// Success marker plus token present
    Success {
        email: Option<String>,
        token: String,
    },
    /// Error code present
    Error { code: Option<String> },
    /// Parameters not attached yet; reload and re-parse
    Retry,
}

impl CompletionPlan {
    /// Pure transition: classify the invocation parameters.
    ///
    /// A success marker without a token means the provider redirect is
    /// still incomplete and is treated like missing parameters.
    #[must_use]
    pub fn from_params(params: &CompletionParams) -> Self {
        if params.success {
            if let Some(token) = &params.token {
                return Self::Success {
                    email: params.email.clone(),
                    token: token.clone(),
                };
            }
        }
        if params.error.is_some() {
            return Self::Error {
                code: params.error.clone(),
            };
        }
        Self::Retry
    }
}

/// Handle to the opener context, if any
#[async_trait]
pub trait OpenerPort: Send + Sync {
    /// Whether an opener exists and is still open
    fn is_open(&self) -> bool;

    /// Fire-and-forget delivery, restricted to the exact target origin
    async fn post(&self, message: &HandshakeMessage, target_origin: &str);
}

/// Control over the completion context's own location
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Reload the context's location and re-parse its parameters
    async fn reload(&self) -> CompletionParams;

    /// Leave the completion flow for the application home route,
    /// optionally surfacing an error code as a query parameter
    async fn goto_home(&self, error: Option<&str>);
}

async fn sleep_unless_cancelled(cancel: &CancellationToken, duration: std::time::Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// Broadcast a success message on the redundant schedule, then hold
/// the context open long enough for the last broadcast to land.
/// Returns the number of broadcasts sent before teardown.
pub async fn run_success_broadcasts<O: OpenerPort + ?Sized>(
    opener: &O,
    message: &HandshakeMessage,
    target_origin: &str,
    cancel: &CancellationToken,
) -> u32 {
    let mut sent = 0;
    let mut elapsed = std::time::Duration::ZERO;
    for offset in SUCCESS_BROADCAST_OFFSETS {
        if !sleep_unless_cancelled(cancel, offset - elapsed).await {
            return sent;
        }
        elapsed = offset;
        opener.post(message, target_origin).await;
        sent += 1;
        tracing::debug!(sent, "success broadcast dispatched");
    }
    sleep_unless_cancelled(cancel, SUCCESS_CLOSE_DELAY - elapsed).await;
    sent
}

/// Broadcast a single error message, then hold the close margin.
pub async fn run_error_broadcast<O: OpenerPort + ?Sized>(
    opener: &O,
    message: &HandshakeMessage,
    target_origin: &str,
    cancel: &CancellationToken,
) -> u32 {
    opener.post(message, target_origin).await;
    tracing::debug!("error broadcast dispatched");
    sleep_unless_cancelled(cancel, ERROR_CLOSE_DELAY).await;
    1
}

/// Drives a completion context from load to termination.
pub struct CompletionDriver<O, N> {
    opener: O,
    navigator: N,
    store: Arc<dyn ClientStore>,
    client_key: String,
    opener_origin: String,
    cancel: CancellationToken,
}

impl<O, N> std::fmt::Debug for CompletionDriver<O, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionDriver")
            .field("client_key", &self.client_key)
            .field("opener_origin", &self.opener_origin)
            .finish_non_exhaustive()
    }
}

impl<O: OpenerPort, N: Navigator> CompletionDriver<O, N> {
    #[must_use]
    pub fn new(
        opener: O,
        navigator: N,
        store: Arc<dyn ClientStore>,
        client_key: impl Into<String>,
        opener_origin: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            opener,
            navigator,
            store,
            client_key: client_key.into(),
            opener_origin: opener_origin.into(),
            cancel,
        }
    }

    /// Run the state machine to termination. Returns the final session
    /// record for inspection.
    pub async fn run(self, initial: CompletionParams) -> HandshakeSession {
        let mut session = HandshakeSession::new();
        let mut reloads = initial.attempt;
        let mut params = initial;

        loop {
            match CompletionPlan::from_params(&params) {
                CompletionPlan::Retry => {
                    if reloads >= MAX_PARAM_RETRIES {
                        tracing::warn!(
                            reloads,
                            "completion parameters never arrived; surfacing timeout"
                        );
                        self.navigator
                            .goto_home(Some(HANDSHAKE_TIMEOUT_ERROR))
                            .await;
                        session.state = HandshakeState::Closing;
                        return session;
                    }
                    if !sleep_unless_cancelled(&self.cancel, PARAM_RETRY_DELAY).await {
                        return session;
                    }
                    reloads += 1;
                    tracing::debug!(reloads, "reloading completion context");
                    params = self.navigator.reload().await;
                }

                CompletionPlan::Success { email, token } => {
                    session.state = HandshakeState::ResolvedSuccess;
                    tracing::info!("completion resolved: success");

                    // Recovery path before any broadcast: the opener
                    // can read the token from the store even if the
                    // message channel fails entirely.
                    self.store
                        .set(&self.client_key, RECOVERED_TOKEN_KEY, token.clone());

                    if self.opener.is_open() {
                        let message = HandshakeMessage::success(email, token);
                        session.attempts_sent = run_success_broadcasts(
                            &self.opener,
                            &message,
                            &self.opener_origin,
                            &self.cancel,
                        )
                        .await;
                    } else {
                        tracing::debug!("no opener context; navigating home");
                        self.navigator.goto_home(None).await;
                    }

                    session.state = HandshakeState::Closing;
                    return session;
                }

                CompletionPlan::Error { code } => {
                    session.state = HandshakeState::ResolvedError;
                    tracing::info!(
                        error = code.as_deref().unwrap_or("unknown"),
                        "completion resolved: error"
                    );

                    if self.opener.is_open() {
                        let message = HandshakeMessage::error(code);
                        session.attempts_sent = run_error_broadcast(
                            &self.opener,
                            &message,
                            &self.opener_origin,
                            &self.cancel,
                        )
                        .await;
                    } else {
                        self.navigator.goto_home(code.as_deref()).await;
                    }

                    session.state = HandshakeState::Closing;
                    return session;
                }
            }
        }
    }
}
