//! Identity resolution module
//!
//! Decides, for every inbound request, who is making it: an anonymous
//! device, a persisted local session, or an authenticated principal.
//!
//! # Strategy composition
//!
//! Verifiers are composed in fixed priority order (federated bearer
//! token, then device fingerprint) with first-success-wins semantics.
//! A rejection by the claiming strategy is final; it is never retried
//! against a weaker mechanism.
//!
//! # Administrative override
//!
//! The administrative override is evaluated only by the session
//! identity store (see [`crate::session`]). It grants a privileged
//! session identifier but is never proof of authenticated identity.

mod credential;
mod error;
mod introspect;
mod middleware;
mod principal;
mod resolver;
mod verifier;

pub use credential::{Credential, extract_credential, is_valid_device_tag};
pub use error::{AuthError, Result};
pub use introspect::{HttpIntrospector, IntrospectionResponse, TokenIntrospector};
pub use middleware::{AuthState, identity_middleware};
pub use principal::{AuthStrategy, AuthenticationOutcome, Principal, UnauthenticatedReason};
pub use resolver::IdentityResolver;
pub use verifier::{CredentialVerifier, DeviceFingerprintVerifier, FederatedVerifier};
