//! Strategy verifiers
//!
//! One verifier per trust mechanism, each independently testable. The
//! resolver composes them in priority order.

use std::sync::Arc;

use async_trait::async_trait;

use super::credential::Credential;
use super::error::{AuthError, Result};
use super::introspect::TokenIntrospector;
use super::principal::{AuthStrategy, Principal};
use crate::constants::DEVICE_DISPLAY_NAME;

/// Pluggable trust mechanism: `verify(candidate) -> Principal | Rejected`
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Strategy this verifier implements
    fn strategy(&self) -> AuthStrategy;

    /// Whether this verifier claims the candidate. The first claiming
    /// verifier in priority order decides the outcome.
    fn supports(&self, credential: &Credential) -> bool;

    async fn verify(&self, credential: &Credential) -> Result<Principal>;
}

/// Federated bearer-token verifier delegating to the introspection
/// collaborator. Expiry, forgery, and transport faults are all
/// surfaced uniformly as rejection.
pub struct FederatedVerifier {
    introspector: Arc<dyn TokenIntrospector>,
}

impl std::fmt::Debug for FederatedVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedVerifier").finish_non_exhaustive()
    }
}

impl FederatedVerifier {
    #[must_use]
    pub fn new(introspector: Arc<dyn TokenIntrospector>) -> Self {
        Self { introspector }
    }
}

#[async_trait]
impl CredentialVerifier for FederatedVerifier {
    fn strategy(&self) -> AuthStrategy {
        AuthStrategy::Federated
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::Bearer { .. })
    }

    async fn verify(&self, credential: &Credential) -> Result<Principal> {
        let Credential::Bearer { token } = credential else {
            return Err(AuthError::Rejected);
        };

        let response = self.introspector.introspect(token).await.map_err(|e| {
            if e.is_infrastructure() {
                tracing::warn!(error = %e, "token introspection unavailable");
            } else {
                tracing::debug!("token introspection rejected token");
            }
            AuthError::Rejected
        })?;

        if !response.active {
            return Err(AuthError::Rejected);
        }

        let Some(subject_id) = response.sub else {
            tracing::warn!("active introspection response without subject");
            return Err(AuthError::Rejected);
        };

        Ok(Principal {
            subject_id,
            email: response.email,
            display_name: response.name,
            strategy: AuthStrategy::Federated,
        })
    }
}

/// Device-fingerprint verifier. Pure and stateless: any syntactically
/// valid tag becomes a principal, with no external call or uniqueness
/// check beyond the tag's own entropy.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceFingerprintVerifier;

#[async_trait]
impl CredentialVerifier for DeviceFingerprintVerifier {
    fn strategy(&self) -> AuthStrategy {
        AuthStrategy::DeviceFingerprint
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::DeviceFingerprint { .. })
    }

    async fn verify(&self, credential: &Credential) -> Result<Principal> {
        let Credential::DeviceFingerprint { tag } = credential else {
            return Err(AuthError::Rejected);
        };

        Ok(Principal {
            subject_id: tag.clone(),
            email: Some(format!("{tag}@device.local")),
            display_name: Some(DEVICE_DISPLAY_NAME.to_string()),
            strategy: AuthStrategy::DeviceFingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::introspect::IntrospectionResponse;

    struct FakeIntrospector {
        response: std::result::Result<IntrospectionResponse, ()>,
    }

    #[async_trait]
    impl TokenIntrospector for FakeIntrospector {
        async fn introspect(&self, _token: &str) -> Result<IntrospectionResponse> {
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(()) => Err(AuthError::IntrospectionInvalid("unreachable".into())),
            }
        }
    }

    fn active_response() -> IntrospectionResponse {
        IntrospectionResponse {
            active: true,
            sub: Some("user-42".to_string()),
            email: Some("a@b.com".to_string()),
            name: Some("Ada".to_string()),
        }
    }

    #[tokio::test]
    async fn test_federated_verify_active_token() {
        let verifier = FederatedVerifier::new(Arc::new(FakeIntrospector {
            response: Ok(active_response()),
        }));
        let credential = Credential::Bearer {
            token: "tok".to_string(),
        };

        assert!(verifier.supports(&credential));
        let principal = verifier.verify(&credential).await.unwrap();
        assert_eq!(principal.subject_id, "user-42");
        assert_eq!(principal.strategy, AuthStrategy::Federated);
    }

    #[tokio::test]
    async fn test_federated_rejects_inactive_token() {
        let verifier = FederatedVerifier::new(Arc::new(FakeIntrospector {
            response: Ok(IntrospectionResponse {
                active: false,
                sub: None,
                email: None,
                name: None,
            }),
        }));
        let credential = Credential::Bearer {
            token: "expired".to_string(),
        };

        let result = verifier.verify(&credential).await;
        assert!(matches!(result, Err(AuthError::Rejected)));
    }

    #[tokio::test]
    async fn test_federated_treats_infrastructure_fault_as_rejection() {
        let verifier = FederatedVerifier::new(Arc::new(FakeIntrospector { response: Err(()) }));
        let credential = Credential::Bearer {
            token: "tok".to_string(),
        };

        let result = verifier.verify(&credential).await;
        assert!(matches!(result, Err(AuthError::Rejected)));
    }

    #[tokio::test]
    async fn test_federated_rejects_active_response_without_subject() {
        let verifier = FederatedVerifier::new(Arc::new(FakeIntrospector {
            response: Ok(IntrospectionResponse {
                active: true,
                sub: None,
                email: None,
                name: None,
            }),
        }));
        let credential = Credential::Bearer {
            token: "tok".to_string(),
        };

        let result = verifier.verify(&credential).await;
        assert!(matches!(result, Err(AuthError::Rejected)));
    }

    #[tokio::test]
    async fn test_device_verifier_mints_principal() {
        let verifier = DeviceFingerprintVerifier;
        let credential = Credential::DeviceFingerprint {
            tag: "device_abc123".to_string(),
        };

        assert!(verifier.supports(&credential));
        let principal = verifier.verify(&credential).await.unwrap();
        assert_eq!(principal.subject_id, "device_abc123");
        assert_eq!(
            principal.email,
            Some("device_abc123@device.local".to_string())
        );
        assert_eq!(principal.display_name, Some("Device User".to_string()));
        assert_eq!(principal.strategy, AuthStrategy::DeviceFingerprint);
    }

    #[tokio::test]
    async fn test_device_verifier_does_not_support_bearer() {
        let verifier = DeviceFingerprintVerifier;
        let credential = Credential::Bearer {
            token: "tok".to_string(),
        };
        assert!(!verifier.supports(&credential));
    }
}
