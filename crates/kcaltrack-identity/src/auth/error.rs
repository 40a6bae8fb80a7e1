//! Authentication error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential rejected by verifier")]
    Rejected,

    #[error("malformed credential")]
    MalformedCredential,

    #[error("introspection request failed: {0}")]
    IntrospectionFailed(#[from] reqwest::Error),

    #[error("introspection response invalid: {0}")]
    IntrospectionInvalid(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Infrastructure faults (provider unreachable, bad response) as
    /// opposed to an explicit rejection of the presented credential.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::IntrospectionFailed(_) | Self::IntrospectionInvalid(_) | Self::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            AuthError::Rejected.to_string(),
            "credential rejected by verifier"
        );
        assert_eq!(
            AuthError::MalformedCredential.to_string(),
            "malformed credential"
        );
    }

    #[test]
    fn test_infrastructure_predicate() {
        assert!(AuthError::IntrospectionInvalid("no subject".into()).is_infrastructure());
        assert!(AuthError::Config("no endpoint".into()).is_infrastructure());
        assert!(!AuthError::Rejected.is_infrastructure());
        assert!(!AuthError::MalformedCredential.is_infrastructure());
    }
}
