//! # Google Secret Manager Source
//!
//! Native REST client for the Secret Manager API v1.
//!
//! The reflector only ever needs `secrets.versions.access`; mapping paths
//! arrive fully qualified (`projects/<p>/secrets/<s>/versions/<v>`), so no
//! name construction or "latest" resolution happens here.
//!
//! References:
//! - [Secret Manager REST API v1](https://cloud.google.com/secret-manager/docs/reference/rest)

pub mod mock;

pub use mock::MockSecretManager;

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{metadata, SourceError};

/// Default API endpoint.
const DEFAULT_ENDPOINT: &str = "https://secretmanager.googleapis.com";

/// Access to single secret-version payloads by fully qualified name.
#[async_trait]
pub trait SecretVersionSource: Send + Sync {
    async fn access(&self, path: &str) -> Result<Vec<u8>, SourceError>;
}

/// Secret Manager REST client.
pub struct SecretManagerClient {
    http_client: Client,
    base_url: String,
    access_token: String,
}

impl fmt::Debug for SecretManagerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretManagerClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Response of `secrets.versions.access`.
#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

/// Secret payload; `data` is base64-encoded on the wire.
#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// OAuth2 token response from the metadata server.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl SecretManagerClient {
    /// Build a client with an already-acquired OAuth2 access token.
    pub fn new(endpoint: Option<&str>, access_token: String) -> Result<Self> {
        let http_client = Client::builder()
            .build()
            .context("failed to create HTTP client")?;
        let base_url = endpoint
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http_client,
            base_url,
            access_token,
        })
    }

    /// Fetch an OAuth2 access token for the Secret Manager API.
    ///
    /// Honors `GOOGLE_OAUTH_ACCESS_TOKEN` for local runs, then falls back to
    /// the metadata server's default service account token.
    pub async fn fetch_access_token() -> Result<String> {
        if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            debug!("using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
            return Ok(token);
        }

        let http_client = Client::builder()
            .build()
            .context("failed to create HTTP client")?;
        let body = metadata::get(
            &http_client,
            "instance/service-accounts/default/token",
            &[],
        )
        .await
        .context("error retrieving access token from metadata service")?;

        let token: TokenResponse = serde_json::from_str(&body)
            .context("error parsing token response from metadata service")?;
        info!("retrieved access token from metadata service");

        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretVersionSource for SecretManagerClient {
    async fn access(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let url = format!("{}/v1/{}:access", self.base_url, path);
        debug!(%path, "accessing secret manager version");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: AccessSecretVersionResponse = response.json().await?;
        general_purpose::STANDARD
            .decode(body.payload.data.as_bytes())
            .map_err(|err| SourceError::Decode(format!("payload is not valid base64: {err}")))
    }
}
