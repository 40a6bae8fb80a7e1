//! Credential extraction from request headers
//!
//! Credentials are raw, unverified identity claims. They are derived
//! fresh per request and never stored.

use axum::http::{HeaderMap, header};

use super::error::{AuthError, Result};
use crate::constants::{DEVICE_ID_HEADER, DEVICE_TAG_PREFIX};

/// Raw credential candidate parsed from request headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer { token: String },
    DeviceFingerprint { tag: String },
}

/// Check the strict device tag grammar: `device_` followed by one or
/// more ASCII alphanumerics, case-sensitive. Anything else must not be
/// treated as a stable identity.
#[must_use]
pub fn is_valid_device_tag(tag: &str) -> bool {
    tag.strip_prefix(DEVICE_TAG_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric()))
}

/// Parse headers into at most one credential candidate.
///
/// The `Authorization` header claims the request for the bearer
/// strategy: if it is present, the device header is never consulted,
/// even when the bearer value is unusable.
pub fn extract_credential(headers: &HeaderMap) -> Result<Option<Credential>> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let Ok(value) = value.to_str() else {
            return Err(AuthError::MalformedCredential);
        };
        let Some(token) = value.strip_prefix("Bearer ") else {
            return Err(AuthError::MalformedCredential);
        };
        if token.is_empty() {
            return Err(AuthError::MalformedCredential);
        }
        return Ok(Some(Credential::Bearer {
            token: token.to_string(),
        }));
    }

    if let Some(value) = headers.get(DEVICE_ID_HEADER) {
        let Ok(tag) = value.to_str() else {
            return Err(AuthError::MalformedCredential);
        };
        if !is_valid_device_tag(tag) {
            return Err(AuthError::MalformedCredential);
        }
        return Ok(Some(Credential::DeviceFingerprint {
            tag: tag.to_string(),
        }));
    }

    Ok(None)
}
