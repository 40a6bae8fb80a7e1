//! Handshake wire types
//!
//! The message payload is a closed tagged union; anything else on the
//! channel is ignored at the receiving boundary.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Message delivered from a completion context to its opener.
///
/// Transport is fire-and-forget: no acknowledgment, possible
/// duplicate delivery, possible total loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HandshakeMessage {
    #[serde(rename = "GOOGLE_AUTH_SUCCESS")]
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        timestamp: i64,
    },
    #[serde(rename = "GOOGLE_AUTH_ERROR")]
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: i64,
    },
}

impl HandshakeMessage {
    #[must_use]
    pub fn success(email: Option<String>, token: String) -> Self {
        Self::Success {
            email,
            token: Some(token),
            timestamp: now_millis(),
        }
    }

    #[must_use]
    pub fn error(error: Option<String>) -> Self {
        Self::Error {
            error,
            timestamp: now_millis(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Invocation parameters of a completion context, parsed once from its
/// own location at load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionParams {
    /// Success marker (`success=true`)
    pub success: bool,
    pub email: Option<String>,
    pub token: Option<String>,
    pub error: Option<String>,
    /// Reload counter carried across parameter retries
    pub attempt: u32,
}

impl CompletionParams {
    /// Parse from a raw query string (no leading `?`)
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "success" => params.success = value == "true",
                "email" => params.email = Some(value.into_owned()),
                "token" => params.token = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "attempt" => params.attempt = value.parse().unwrap_or(0),
                _ => {}
            }
        }
        params
    }
}
