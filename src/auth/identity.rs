//! Service identity tokens for upstream calls.

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

/// Failure to mint a service identity token.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("identity provider responded with {0}")]
    Status(StatusCode),

    #[error("identity provider returned an empty token")]
    EmptyToken,

    #[error("identity token is not a valid header value")]
    InvalidToken,
}

/// Mints credentials proving the gateway's own identity to an audience.
#[async_trait]
pub trait IdentityTokenProvider: Send + Sync {
    /// Returns a complete `Authorization` value (e.g. `Bearer <token>`).
    async fn authorization_for(&self, audience: &str) -> Result<String, IdentityError>;
}

const IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Fetches ID tokens from the compute metadata server.
#[derive(Debug, Clone)]
pub struct MetadataServerProvider {
    client: reqwest::Client,
    metadata_url: String,
}

impl MetadataServerProvider {
    pub fn new(client: reqwest::Client, metadata_url: impl Into<String>) -> Self {
        Self {
            client,
            metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl IdentityTokenProvider for MetadataServerProvider {
    async fn authorization_for(&self, audience: &str) -> Result<String, IdentityError> {
        tracing::debug!(audience = %audience, "Fetching service identity token");

        let response = self
            .client
            .get(format!("{}{}", self.metadata_url, IDENTITY_PATH))
            .query(&[("audience", audience), ("format", "full")])
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Status(status));
        }

        let token = response.text().await?;
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::EmptyToken);
        }

        Ok(format!("Bearer {}", token))
    }
}
