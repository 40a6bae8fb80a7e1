//! Verified identity types

use serde::Serialize;

/// Trust mechanism that produced a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStrategy {
    Federated,
    DeviceFingerprint,
    AdministrativeOverride,
}

/// Verified identity attached to a single request's context.
///
/// Immutable once constructed; never persisted by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Stable subject identifier
    pub subject_id: String,
    /// Email (optional)
    pub email: Option<String>,
    /// Display name (optional)
    pub display_name: Option<String>,
    /// Strategy that verified this principal
    pub strategy: AuthStrategy,
}

/// Why a request resolved as unauthenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthenticatedReason {
    /// No credential presented. Normal for anonymous clients, not an
    /// error condition.
    NoCredential,
    /// A credential was presented but failed the grammar/shape check
    /// before any verifier ran.
    MalformedCredential,
    /// The responsible verifier explicitly rejected the credential.
    /// Never downgraded to a weaker strategy.
    VerifierRejected,
}

/// Exactly one outcome per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    Authenticated(Principal),
    Unauthenticated(UnauthenticatedReason),
}

impl AuthenticationOutcome {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Authenticated(principal) => Some(principal),
            Self::Unauthenticated(_) => None,
        }
    }

    #[must_use]
    pub const fn reason(&self) -> Option<UnauthenticatedReason> {
        match self {
            Self::Authenticated(_) => None,
            Self::Unauthenticated(reason) => Some(*reason),
        }
    }
}
