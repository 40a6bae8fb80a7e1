//! Identity resolver
//!
//! Orchestrates the strategy verifiers in fixed priority order with
//! first-success-wins semantics. Failure of a higher-priority strategy
//! never falls through to a weaker one: a forged or expired federated
//! token must not be quietly accepted as an anonymous device.

use std::sync::Arc;

use axum::http::HeaderMap;

use super::credential::extract_credential;
use super::introspect::TokenIntrospector;
use super::principal::{AuthenticationOutcome, UnauthenticatedReason};
use super::verifier::{CredentialVerifier, DeviceFingerprintVerifier, FederatedVerifier};

/// Identity resolver over an ordered list of verifier capabilities
pub struct IdentityResolver {
    verifiers: Vec<Arc<dyn CredentialVerifier>>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("verifier_count", &self.verifiers.len())
            .finish()
    }
}

impl IdentityResolver {
    /// Compose a resolver from verifiers in priority order
    #[must_use]
    pub fn new(verifiers: Vec<Arc<dyn CredentialVerifier>>) -> Self {
        Self { verifiers }
    }

    /// Standard strategy chain: federated bearer first, device
    /// fingerprint second.
    #[must_use]
    pub fn with_default_strategies(introspector: Arc<dyn TokenIntrospector>) -> Self {
        Self::new(vec![
            Arc::new(FederatedVerifier::new(introspector)),
            Arc::new(DeviceFingerprintVerifier),
        ])
    }

    /// Resolve exactly one outcome for the request.
    pub async fn resolve(&self, headers: &HeaderMap) -> AuthenticationOutcome {
        let credential = match extract_credential(headers) {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                // Normal state for anonymous and first-time clients.
                tracing::debug!("no credential presented");
                return AuthenticationOutcome::Unauthenticated(UnauthenticatedReason::NoCredential);
            }
            Err(_) => {
                tracing::warn!("malformed credential rejected before verification");
                return AuthenticationOutcome::Unauthenticated(
                    UnauthenticatedReason::MalformedCredential,
                );
            }
        };

        for verifier in &self.verifiers {
            if !verifier.supports(&credential) {
                continue;
            }
            // First claiming verifier decides; its rejection is final.
            return match verifier.verify(&credential).await {
                Ok(principal) => {
                    tracing::debug!(
                        subject = %principal.subject_id,
                        strategy = ?principal.strategy,
                        "credential verified"
                    );
                    AuthenticationOutcome::Authenticated(principal)
                }
                Err(_) => {
                    tracing::warn!(
                        strategy = ?verifier.strategy(),
                        "verifier rejected credential"
                    );
                    AuthenticationOutcome::Unauthenticated(UnauthenticatedReason::VerifierRejected)
                }
            };
        }

        tracing::warn!("no verifier claims the presented credential");
        AuthenticationOutcome::Unauthenticated(UnauthenticatedReason::VerifierRejected)
    }
}
