//! Constants for the identity service

use std::time::Duration;

/// Custom header carrying the device fingerprint tag
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Header toggling the administrative override for session resolution
pub const ADMIN_OVERRIDE_HEADER: &str = "x-admin-override";

/// Header carrying the administrative override session id
pub const ADMIN_SESSION_HEADER: &str = "x-admin-session";

/// Header scoping the client-local store (stand-in for browser storage)
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Required prefix for device fingerprint tags (case-sensitive)
pub const DEVICE_TAG_PREFIX: &str = "device_";

/// Display name minted for device-fingerprint principals
pub const DEVICE_DISPLAY_NAME: &str = "Device User";

/// Client-store key holding the persisted session token
pub const SESSION_TOKEN_KEY: &str = "session_token";

/// Client-store key holding a token recovered from a completion context
pub const RECOVERED_TOKEN_KEY: &str = "recovered_token";

/// Success broadcast schedule, offsets from entry into `ResolvedSuccess`.
/// The message channel has no acknowledgment, so every scheduled
/// broadcast fires regardless of earlier ones.
pub const SUCCESS_BROADCAST_OFFSETS: [Duration; 3] = [
    Duration::from_millis(0),
    Duration::from_millis(100),
    Duration::from_millis(500),
];

/// Context termination delay after entering `ResolvedSuccess`
pub const SUCCESS_CLOSE_DELAY: Duration = Duration::from_millis(1_500);

/// Context termination delay after the single error broadcast
pub const ERROR_CLOSE_DELAY: Duration = Duration::from_millis(1_000);

/// Reload delay while the completion page waits for its parameters
pub const PARAM_RETRY_DELAY: Duration = Duration::from_millis(2_000);

/// Maximum reloads waiting for invocation parameters before giving up
pub const MAX_PARAM_RETRIES: u32 = 5;

/// Error code surfaced when the parameter retry budget is exhausted
pub const HANDSHAKE_TIMEOUT_ERROR: &str = "handshake_timeout";

/// Long-poll window for the opener waiting on a handshake message.
/// Kept well under the HTTP layer's request timeout.
pub const OPENER_WAIT_TIMEOUT: Duration = Duration::from_secs(25);

/// Application home route used by no-opener fallbacks
pub const HOME_ROUTE: &str = "/";
