use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    // Quota errors carry identifiable text so callers can branch on the
    // message without a structured code.
    #[error("Usage limit exceeded: daily analysis quota reached. Upgrade to continue")]
    UsageLimitExceeded,

    #[error("Handshake timed out waiting for completion parameters")]
    HandshakeTimeout,
}

impl Error {
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    #[must_use]
    pub const fn is_usage_limit(&self) -> bool {
        matches!(self, Self::UsageLimitExceeded)
    }

    #[must_use]
    pub const fn is_handshake_timeout(&self) -> bool {
        matches!(self, Self::HandshakeTimeout)
    }
}

/// Map errors onto HTTP statuses for the axum surface
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Config(_) | Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::UsageLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::HandshakeTimeout => StatusCode::GATEWAY_TIMEOUT,
        };
        (status, self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_predicate() {
        let err = Error::Config("missing introspection URL".to_string());
        assert!(err.is_config());
        assert!(!err.is_transport());
        assert!(!err.is_usage_limit());
    }

    #[test]
    fn test_transport_predicate() {
        let err = Error::Transport("bind failed".to_string());
        assert!(err.is_transport());
        assert!(!err.is_config());
    }

    #[test]
    fn test_usage_limit_text_is_identifiable() {
        let err = Error::UsageLimitExceeded;
        assert!(err.is_usage_limit());
        assert!(err.to_string().contains("Usage limit exceeded"));
    }

    #[test]
    fn test_handshake_timeout_predicate() {
        let err = Error::HandshakeTimeout;
        assert!(err.is_handshake_timeout());
        assert!(!err.is_auth());
    }

    #[test]
    fn test_usage_limit_maps_to_429() {
        let response = Error::UsageLimitExceeded.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_auth_error_maps_to_401() {
        let response = Error::Auth(AuthError::Rejected).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_config_error_maps_to_500() {
        let response = Error::Config("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
