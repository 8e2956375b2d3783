//! # Vault Key/Value Source
//!
//! Native REST client for HashiCorp Vault's key/value secret engines.
//!
//! Driving the HTTP API directly with reqwest keeps the dependency closure
//! small and works with rustls end to end. Only the logical read path and
//! the `gcp` login method are implemented; that is everything a reflection
//! run needs.
//!
//! References:
//! - [KV secrets engine API](https://developer.hashicorp.com/vault/api-docs/secret/kv)
//! - [Google Cloud auth method API](https://developer.hashicorp.com/vault/api-docs/auth/gcp)

mod auth;
pub mod mock;

pub use auth::login_gcp_default;
pub use mock::MockVault;

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SourceError;
use crate::config::{VaultAuthType, VaultConfig};

/// Identifier for a key/value engine version.
///
/// Kept as an open string rather than a closed enum: a mapping may name a
/// version this build does not implement, and that has to surface as a
/// runtime error against the mapping, not as a parse failure with no
/// context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineVersion(String);

impl EngineVersion {
    /// Version 1 of the key/value engine (`kv`): no extra wrapping.
    pub fn kv_v1() -> Self {
        Self("kv".to_string())
    }

    /// Version 2 of the key/value engine (`kv-v2`): field map nested under
    /// [`V2_WRAPPER_KEY`].
    pub fn kv_v2() -> Self {
        Self("kv-v2".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineVersion {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Wrapper key the v2 engine nests the real field map under.
pub const V2_WRAPPER_KEY: &str = "data";

/// Read access to a key/value secret store.
///
/// `Ok(None)` means the path holds no secret; the real Vault API expresses
/// this as a 404 and must not be conflated with an empty field map.
#[async_trait]
pub trait KeyValueSource: Send + Sync {
    async fn read(
        &self,
        path: &str,
    ) -> Result<Option<serde_json::Map<String, serde_json::Value>>, SourceError>;
}

/// Vault REST client.
pub struct VaultClient {
    http_client: Client,
    addr: String,
    token: String,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

/// Response body of a logical read.
///
/// For a v1 mount `data` is the field map itself; for v2 it carries the
/// extra wrapping level that the normalizer unwraps.
#[derive(Debug, Deserialize)]
struct ReadResponse {
    data: serde_json::Map<String, serde_json::Value>,
}

/// Error body Vault attaches to non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

impl VaultClient {
    /// Build an authenticated client from the run configuration.
    ///
    /// For [`VaultAuthType::Token`] the configured token is used as-is; for
    /// [`VaultAuthType::GcpDefault`] the machine's default service account is
    /// exchanged for a Vault token first.
    pub async fn from_config(config: &VaultConfig) -> Result<Self> {
        let http_client = Client::builder()
            .build()
            .context("failed to create HTTP client")?;
        let addr = config.url.trim_end_matches('/').to_string();

        let token = match config.auth_type {
            VaultAuthType::Token => config
                .token
                .clone()
                .context("vault auth type is \"token\" but no token was configured")?,
            VaultAuthType::GcpDefault => {
                let token =
                    login_gcp_default(&http_client, &addr, config.role.as_deref()).await?;
                info!("authenticated to vault via gcp auth method");
                token
            }
        };

        Ok(Self {
            http_client,
            addr,
            token,
        })
    }
}

#[async_trait]
impl KeyValueSource for VaultClient {
    async fn read(
        &self,
        path: &str,
    ) -> Result<Option<serde_json::Map<String, serde_json::Value>>, SourceError> {
        let url = format!("{}/v1/{}", self.addr, path);
        debug!(%path, "reading vault secret");

        let response = self
            .http_client
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body: ReadResponse = response.json().await?;
                Ok(Some(body.data))
            }
            status if status == reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => {
                let message = match response.json::<ErrorResponse>().await {
                    Ok(body) => body.errors.join("; "),
                    Err(_) => String::new(),
                };
                Err(SourceError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
