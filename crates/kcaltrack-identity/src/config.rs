//! Service configuration

use std::net::{IpAddr, Ipv4Addr};

use url::Url;

/// Identity service configuration
///
/// Built by `main` from CLI arguments (which themselves fall back to
/// `KCAL_*` environment variables), or directly via [`Config::from_env`]
/// for embedded use.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind host
    pub host: IpAddr,
    /// HTTP bind port
    pub port: u16,
    /// Exact origin of the opener context. Used both for CORS and as
    /// the target origin of handshake broadcasts (never a wildcard).
    pub opener_origin: String,
    /// Token introspection endpoint of the federated identity provider
    pub introspection_url: Option<Url>,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON-formatted logs
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            opener_origin: "http://localhost:3000".to_string(),
            introspection_url: None,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from `KCAL_*` environment variables,
    /// falling back to defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("KCAL_HTTP_HOST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.host),
            port: std::env::var("KCAL_HTTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            opener_origin: std::env::var("KCAL_OPENER_ORIGIN").unwrap_or(defaults.opener_origin),
            introspection_url: std::env::var("KCAL_INTROSPECTION_URL")
                .ok()
                .and_then(|v| Url::parse(&v).ok()),
            log_level: std::env::var("KCAL_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: std::env::var("KCAL_JSON_LOGS").is_ok_and(|v| v == "1" || v == "true"),
        }
    }

    #[must_use]
    pub fn with_opener_origin(mut self, origin: impl Into<String>) -> Self {
        self.opener_origin = origin.into();
        self
    }

    #[must_use]
    pub fn with_introspection_url(mut self, url: Url) -> Self {
        self.introspection_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}
