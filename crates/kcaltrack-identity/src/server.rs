//! HTTP server wiring
//!
//! Assembles the identity middleware, session store, and handshake
//! channel into the service surface. The in-process opener registry
//! stands in for the cross-window message API: each client context has
//! a broadcast channel its opener subscribes to while an authentication
//! attempt is in flight.

use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Extension, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::{delete, get};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{
    AuthState, AuthenticationOutcome, DeviceFingerprintVerifier, HttpIntrospector,
    IdentityResolver, Principal, UnauthenticatedReason, identity_middleware,
};
use crate::config::Config;
use crate::constants::{
    CLIENT_ID_HEADER, HANDSHAKE_TIMEOUT_ERROR, HOME_ROUTE, MAX_PARAM_RETRIES,
    OPENER_WAIT_TIMEOUT, PARAM_RETRY_DELAY, RECOVERED_TOKEN_KEY,
};
use crate::handshake::{
    CompletionParams, CompletionPlan, HandshakeMessage, OpenerPort, OpenerReceiver,
    run_error_broadcast, run_success_broadcasts,
};
use crate::session::{ClientStore, InMemoryStore, SessionContext, SessionIdentity, SessionRecord};
use crate::{Error, Result};

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Authentication status for one request
#[derive(Debug, Serialize)]
struct AuthStatusResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<UnauthenticatedReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recovered_token: Option<String>,
}

/// Clear-session response
#[derive(Debug, Serialize)]
struct ClearSessionResponse {
    cleared: bool,
}

/// Long-poll response carrying the first accepted handshake message
#[derive(Debug, Serialize)]
struct WaitResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<HandshakeMessage>,
}

/// Per-client broadcast channels standing in for window messaging
#[derive(Clone, Default)]
pub struct OpenerRegistry {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<HandshakeMessage>>>>,
}

impl std::fmt::Debug for OpenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenerRegistry")
            .field("channel_count", &self.channels.read().len())
            .finish()
    }
}

impl OpenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe the opener side for a client, creating the channel on
    /// first use.
    pub fn subscribe(&self, client: &str) -> broadcast::Receiver<HandshakeMessage> {
        let mut channels = self.channels.write();
        channels
            .entry(client.to_string())
            .or_insert_with(|| broadcast::channel(8).0)
            .subscribe()
    }

    /// Completion-side handle to the opener for a client
    #[must_use]
    pub fn opener_for(&self, client: &str, origin: &str) -> RegistryOpener {
        RegistryOpener {
            sender: self.channels.read().get(client).cloned(),
            origin: origin.to_string(),
        }
    }
}

/// [`OpenerPort`] backed by the in-process registry
#[derive(Debug, Clone)]
pub struct RegistryOpener {
    sender: Option<broadcast::Sender<HandshakeMessage>>,
    origin: String,
}

#[async_trait::async_trait]
impl OpenerPort for RegistryOpener {
    fn is_open(&self) -> bool {
        self.sender
            .as_ref()
            .is_some_and(|sender| sender.receiver_count() > 0)
    }

    async fn post(&self, message: &HandshakeMessage, target_origin: &str) {
        // Mirrors the message API's target-origin filter: a broadcast
        // addressed to any other origin is silently dropped.
        if target_origin != self.origin {
            tracing::warn!(%target_origin, "broadcast target origin mismatch; dropped");
            return;
        }
        if let Some(sender) = &self.sender {
            // Fire-and-forget: a send with no live receiver is not an error.
            let _ = sender.send(message.clone());
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<IdentityResolver>,
    pub sessions: Arc<SessionIdentity>,
    pub store: Arc<dyn ClientStore>,
    pub openers: OpenerRegistry,
    pub opener_origin: String,
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("resolver", &self.resolver)
            .field("opener_origin", &self.opener_origin)
            .finish_non_exhaustive()
    }
}

impl AppState {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let resolver = match &config.introspection_url {
            Some(url) => Arc::new(IdentityResolver::with_default_strategies(Arc::new(
                HttpIntrospector::new(url.clone()),
            ))),
            None => {
                tracing::warn!(
                    "no introspection URL configured; federated bearer tokens will be rejected"
                );
                Arc::new(IdentityResolver::new(vec![Arc::new(
                    DeviceFingerprintVerifier,
                )]))
            }
        };

        let store: Arc<dyn ClientStore> = Arc::new(InMemoryStore::new());
        Self {
            resolver,
            sessions: Arc::new(SessionIdentity::new(store.clone())),
            store,
            openers: OpenerRegistry::new(),
            opener_origin: config.opener_origin.clone(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Build the service router
pub fn build_router(state: AppState) -> Router {
    let auth_state = AuthState::new(state.resolver.clone());
    let cors = build_cors_layer(&state.opener_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/status", get(status_handler))
        .route("/api/auth/session", delete(clear_session_handler))
        .route("/api/auth/wait", get(wait_handler))
        .route("/auth/complete", get(complete_handler))
        .layer(middleware::from_fn_with_state(
            auth_state,
            identity_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(60),
        ))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until the shutdown future resolves
pub async fn run_server(
    config: Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = SocketAddr::new(config.host, config.port);
    emit_security_warnings(&config);

    let state = AppState::new(&config);
    let cancel = state.cancel.clone();
    let app = build_router(state);

    tracing::info!("identity service listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    let teardown = cancel.clone();
    tokio::spawn(async move {
        shutdown.await;
        teardown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("identity service shutdown complete");
    Ok(())
}

fn build_cors_layer(opener_origin: &str) -> CorsLayer {
    let origin = opener_origin.parse::<HeaderValue>().map_or_else(
        |_| {
            "http://localhost:3000"
                .parse::<HeaderValue>()
                .expect("valid header")
        },
        |value| value,
    );
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn emit_security_warnings(config: &Config) {
    let is_all_interfaces = config.host == IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        || config.host == IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED);

    if is_all_interfaces {
        tracing::warn!(
            "HTTP server binding to all interfaces (0.0.0.0). \
             This exposes the server to all network interfaces."
        );
    } else if !config.host.is_loopback() {
        tracing::warn!(
            "HTTP server binding to non-loopback address ({}). \
             Ensure network security policies are in place.",
            config.host
        );
    }

    if config.introspection_url.is_none() {
        tracing::info!(
            "Token introspection not configured (KCAL_INTROSPECTION_URL). \
             Only device-fingerprint identities will verify."
        );
    }
}

/// Client context key scoping the client-local store and the opener
/// registry. Stands in for the browsing context boundary.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("default")
        .to_string()
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status_handler(
    State(state): State<AppState>,
    Extension(outcome): Extension<AuthenticationOutcome>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let client = client_key(&headers);

    if let Some(principal) = outcome.principal() {
        return Json(AuthStatusResponse {
            authenticated: true,
            principal: Some(principal.clone()),
            reason: None,
            session: None,
            recovered_token: None,
        });
    }

    // Session identity is consulted only when no authenticated
    // principal exists.
    let ctx = SessionContext::from_headers(&headers);
    let session = state.sessions.resolve(&ctx, &client);
    let recovered_token = state.store.get(&client, RECOVERED_TOKEN_KEY);

    Json(AuthStatusResponse {
        authenticated: false,
        principal: None,
        reason: outcome.reason(),
        session: Some(session),
        recovered_token,
    })
}

async fn clear_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let client = client_key(&headers);
    let cleared = state.sessions.clear_persisted(&client);
    Json(ClearSessionResponse { cleared })
}

/// Opener side of the handshake: long-poll for the first accepted
/// message. Duplicate broadcasts are absorbed by the receiver.
async fn wait_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let client = client_key(&headers);
    let mut rx = state.openers.subscribe(&client);
    let mut receiver = OpenerReceiver::new(state.opener_origin.clone());

    let accepted = tokio::time::timeout(OPENER_WAIT_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    let Ok(payload) = serde_json::to_value(&message) else {
                        continue;
                    };
                    if let Some(accepted) = receiver.accept(&state.opener_origin, &payload) {
                        return Some(accepted.clone());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten();

    Json(WaitResponse { message: accepted })
}

/// Completion-context entry point: the identity provider redirects
/// here with the result in the query string.
async fn complete_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let params = CompletionParams::from_query(query.as_deref().unwrap_or(""));
    let client = client_key(&headers);
    let opener = state.openers.opener_for(&client, &state.opener_origin);

    match CompletionPlan::from_params(&params) {
        CompletionPlan::Success { email, token } => {
            // Recovery path before any broadcast.
            state
                .store
                .set(&client, RECOVERED_TOKEN_KEY, token.clone());

            if opener.is_open() {
                let message = HandshakeMessage::success(email, token);
                let origin = state.opener_origin.clone();
                let cancel = state.cancel.child_token();
                tokio::spawn(async move {
                    run_success_broadcasts(&opener, &message, &origin, &cancel).await;
                });
                (StatusCode::OK, "completing sign-in").into_response()
            } else {
                tracing::debug!("completion without opener; redirecting home");
                Redirect::to(HOME_ROUTE).into_response()
            }
        }

        CompletionPlan::Error { code } => {
            if opener.is_open() {
                let message = HandshakeMessage::error(code);
                let origin = state.opener_origin.clone();
                let cancel = state.cancel.child_token();
                tokio::spawn(async move {
                    run_error_broadcast(&opener, &message, &origin, &cancel).await;
                });
                (StatusCode::OK, "reporting sign-in error").into_response()
            } else {
                Redirect::to(&home_with_error(code.as_deref().unwrap_or("unknown")))
                    .into_response()
            }
        }

        CompletionPlan::Retry => {
            if params.attempt >= MAX_PARAM_RETRIES {
                tracing::warn!("completion parameters never arrived; surfacing timeout");
                return Redirect::to(&home_with_error(HANDSHAKE_TIMEOUT_ERROR)).into_response();
            }
            // Ask the context to reload itself with the counter bumped.
            let refresh = format!(
                "{}; url=/auth/complete?attempt={}",
                PARAM_RETRY_DELAY.as_secs(),
                params.attempt + 1
            );
            (
                [(HeaderName::from_static("refresh"), refresh)],
                "waiting for sign-in parameters",
            )
                .into_response()
        }
    }
}

fn home_with_error(code: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", code)
        .finish();
    format!("{HOME_ROUTE}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("ok"));
        assert!(json.contains("0.1.0"));
    }

    #[test]
    fn test_client_key_default() {
        assert_eq!(client_key(&HeaderMap::new()), "default");

        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_ID_HEADER, "c42".parse().unwrap());
        assert_eq!(client_key(&headers), "c42");
    }

    #[test]
    fn test_home_with_error_encodes_code() {
        assert_eq!(
            home_with_error("access_denied"),
            "/?error=access_denied"
        );
        assert_eq!(home_with_error("a b"), "/?error=a+b");
    }

    #[test]
    fn test_registry_opener_closed_without_subscriber() {
        let registry = OpenerRegistry::new();
        let opener = registry.opener_for("c1", "https://app.kcaltrack.com");
        assert!(!opener.is_open());
    }

    #[tokio::test]
    async fn test_registry_opener_delivers_to_subscriber() {
        let registry = OpenerRegistry::new();
        let mut rx = registry.subscribe("c1");
        let opener = registry.opener_for("c1", "https://app.kcaltrack.com");
        assert!(opener.is_open());

        let message = HandshakeMessage::success(None, "T1".to_string());
        opener.post(&message, "https://app.kcaltrack.com").await;
        assert_eq!(rx.recv().await.unwrap(), message);
    }

    #[tokio::test]
    async fn test_registry_opener_drops_mismatched_target_origin() {
        let registry = OpenerRegistry::new();
        let mut rx = registry.subscribe("c1");
        let opener = registry.opener_for("c1", "https://app.kcaltrack.com");

        let message = HandshakeMessage::success(None, "T1".to_string());
        opener.post(&message, "https://evil.example.com").await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn test_app_state_without_introspection_rejects_bearer_path() {
        let state = AppState::new(&Config::default());
        let debug_str = format!("{state:?}");
        assert!(debug_str.contains("verifier_count: 1"));
    }

    #[test]
    fn test_build_cors_layer_accepts_configured_origin() {
        let _cors = build_cors_layer("https://app.kcaltrack.com");
        let _cors = build_cors_layer("not a header value\n");
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_authenticated_omits_session() {
        let state = AppState::new(&Config::default());
        let outcome = AuthenticationOutcome::Authenticated(Principal {
            subject_id: "user-42".to_string(),
            email: Some("a@b.com".to_string()),
            display_name: None,
            strategy: crate::auth::AuthStrategy::Federated,
        });

        let response = status_handler(State(state), Extension(outcome), HeaderMap::new())
            .await
            .into_response();
        let json = body_json(response).await;

        assert_eq!(json["authenticated"], true);
        assert_eq!(json["principal"]["subject_id"], "user-42");
        // Session identity is not consulted for authenticated requests.
        assert!(json.get("session").is_none());
        assert!(json.get("recovered_token").is_none());
    }

    #[tokio::test]
    async fn test_status_unauthenticated_reports_session_and_recovered_token() {
        let state = AppState::new(&Config::default());
        state
            .store
            .set("default", RECOVERED_TOKEN_KEY, "T1".to_string());
        let outcome =
            AuthenticationOutcome::Unauthenticated(UnauthenticatedReason::NoCredential);

        let response = status_handler(State(state), Extension(outcome), HeaderMap::new())
            .await
            .into_response();
        let json = body_json(response).await;

        assert_eq!(json["authenticated"], false);
        assert_eq!(json["reason"], "no_credential");
        assert_eq!(json["session"]["origin"], "ephemeral");
        assert!(!json["session"]["session_id"].as_str().unwrap().is_empty());
        assert_eq!(json["recovered_token"], "T1");
    }

    #[tokio::test]
    async fn test_complete_error_without_opener_redirects_home_with_code() {
        let state = AppState::new(&Config::default());
        let response = complete_handler(
            State(state),
            RawQuery(Some("error=access_denied".to_string())),
            HeaderMap::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/?error=access_denied");
    }

    #[tokio::test]
    async fn test_complete_success_without_opener_redirects_home_and_persists_token() {
        let state = AppState::new(&Config::default());
        let response = complete_handler(
            State(state.clone()),
            RawQuery(Some("success=true&token=T1".to_string())),
            HeaderMap::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        // Recovery path persisted even though no broadcast ran.
        assert_eq!(
            state.store.get("default", RECOVERED_TOKEN_KEY),
            Some("T1".to_string())
        );
    }

    #[tokio::test]
    async fn test_complete_retry_bumps_attempt_via_refresh_header() {
        let state = AppState::new(&Config::default());
        let response = complete_handler(State(state), RawQuery(None), HeaderMap::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("refresh").unwrap().to_str().unwrap(),
            "2; url=/auth/complete?attempt=1"
        );
    }

    #[tokio::test]
    async fn test_complete_retry_budget_exhausted_redirects_with_timeout() {
        let state = AppState::new(&Config::default());
        let response = complete_handler(
            State(state),
            RawQuery(Some("attempt=5".to_string())),
            HeaderMap::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/?error=handshake_timeout");
    }
}
