//! Session identifier resolution
//!
//! Resolves the canonical session identifier for a client across
//! three competing sources, independent of whether the request is
//! authenticated. At most one session id is active per client context
//! at any time.

use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;
use uuid::Uuid;

use super::store::ClientStore;
use crate::constants::{ADMIN_OVERRIDE_HEADER, ADMIN_SESSION_HEADER, SESSION_TOKEN_KEY};

/// Where the resolved session id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    AdministrativeOverride,
    Persisted,
    Ephemeral,
}

/// Resolved session identity for one client context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub origin: SessionOrigin,
}

/// Explicit per-request session context, constructed at the request
/// boundary. The override is re-checked on every resolution and never
/// cached past a toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub override_active: bool,
    pub override_session_id: Option<String>,
}

impl SessionContext {
    /// Context with no administrative override
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            override_active: false,
            override_session_id: None,
        }
    }

    /// Build the context from the operator headers on this request
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let override_active = headers
            .get(ADMIN_OVERRIDE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "1" || v == "true");
        let override_session_id = headers
            .get(ADMIN_SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        Self {
            override_active,
            override_session_id,
        }
    }
}

/// Session identity store over a client-local key/value collaborator
pub struct SessionIdentity {
    store: Arc<dyn ClientStore>,
}

impl std::fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentity").finish_non_exhaustive()
    }
}

impl SessionIdentity {
    #[must_use]
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }

    /// Resolve the session id for this client, strictly first-match:
    /// administrative override, then persisted token, then a freshly
    /// minted ephemeral token (persisted for future calls).
    pub fn resolve(&self, ctx: &SessionContext, client: &str) -> SessionRecord {
        if ctx.override_active
            && let Some(id) = &ctx.override_session_id
        {
            tracing::debug!("session resolved from administrative override");
            return SessionRecord {
                session_id: id.clone(),
                origin: SessionOrigin::AdministrativeOverride,
            };
        }

        if let Some(token) = self.store.get(client, SESSION_TOKEN_KEY) {
            return SessionRecord {
                session_id: token,
                origin: SessionOrigin::Persisted,
            };
        }

        let token = Uuid::new_v4().to_string();
        self.store
            .set(client, SESSION_TOKEN_KEY, token.clone());
        tracing::debug!("minted ephemeral session token");
        SessionRecord {
            session_id: token,
            origin: SessionOrigin::Ephemeral,
        }
    }

    /// Clear only the persisted-origin token. An active administrative
    /// override lives in the request context and cannot be cleared
    /// here.
    pub fn clear_persisted(&self, client: &str) -> bool {
        let removed = self.store.remove(client, SESSION_TOKEN_KEY);
        if removed {
            tracing::info!("persisted session token cleared");
        }
        removed
    }
}
