//! Identity middleware for the HTTP surface
//!
//! Resolves an outcome for every inbound request and attaches it to
//! the request's extensions. `Unauthenticated` is a first-class case:
//! the request proceeds and downstream handlers branch on the outcome.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::resolver::IdentityResolver;

/// Shared state for the identity middleware
#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<IdentityResolver>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl AuthState {
    #[must_use]
    pub fn new(resolver: Arc<IdentityResolver>) -> Self {
        Self { resolver }
    }
}

/// Resolve identity and attach the outcome to the request context
pub async fn identity_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = state.resolver.resolve(request.headers()).await;
    request.extensions_mut().insert(outcome);
    next.run(request).await
}
