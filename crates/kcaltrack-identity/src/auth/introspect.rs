//! Token introspection collaborator
//!
//! The federated identity provider is an opaque verifier capability:
//! we hand it a token and it answers whether the token is active and
//! for whom. Signature and expiry checks are its problem, not ours.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::error::{AuthError, Result};

/// Introspection answer from the identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently valid
    pub active: bool,
    /// Subject identifier (required when active)
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Opaque token verifier capability
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn introspect(&self, token: &str) -> Result<IntrospectionResponse>;
}

/// HTTP-backed introspector
pub struct HttpIntrospector {
    endpoint: Url,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpIntrospector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIntrospector")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpIntrospector {
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("valid client"),
        }
    }
}

#[async_trait]
impl TokenIntrospector for HttpIntrospector {
    async fn introspect(&self, token: &str) -> Result<IntrospectionResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&[("token", token)])
            .send()
            .await?
            .error_for_status()?;

        let body: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::IntrospectionInvalid(e.to_string()))?;

        Ok(body)
    }
}
