//! Vault `gcp` auth method login.
//!
//! Exchanges the machine's default service account identity for a Vault
//! client token. This runs once at bootstrap; the reflector itself only ever
//! sees the resulting token.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::provider::metadata;

#[derive(Debug, Serialize)]
struct GcpLoginRequest<'a> {
    role: &'a str,
    jwt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GcpLoginResponse {
    auth: AuthBlock,
}

#[derive(Debug, Deserialize)]
struct AuthBlock {
    client_token: String,
}

/// Log in to Vault with the GCE default service account.
///
/// When `role` is unset it is derived from the local part of the default
/// service account's email address.
pub async fn login_gcp_default(
    http_client: &Client,
    vault_addr: &str,
    role: Option<&str>,
) -> Result<String> {
    let role = match role {
        Some(role) if !role.is_empty() => role.to_string(),
        _ => default_role(http_client).await?,
    };

    // Vault's gcp auth method expects the JWT audience to name the Vault
    // host and the role being claimed.
    let vault_url = reqwest::Url::parse(vault_addr)
        .with_context(|| format!("error parsing vault address {vault_addr:?}"))?;
    let host = vault_url
        .host_str()
        .context("vault address has no host component")?;
    let audience = format!("{host}/vault/{role}");

    let jwt = metadata::get(
        http_client,
        "instance/service-accounts/default/identity",
        &[("audience", audience.as_str()), ("format", "full")],
    )
    .await
    .context("error retrieving identity JWT from metadata service")?;

    let response = http_client
        .post(format!("{vault_addr}/v1/auth/gcp/login"))
        .json(&GcpLoginRequest {
            role: &role,
            jwt: &jwt,
        })
        .send()
        .await
        .context("error authenticating to vault via gcp")?;

    if !response.status().is_success() {
        anyhow::bail!(
            "vault gcp login failed with status {}",
            response.status()
        );
    }

    let body: GcpLoginResponse = response
        .json()
        .await
        .context("error parsing vault login response")?;

    Ok(body.auth.client_token)
}

/// Derive the Vault role from the default service account email.
async fn default_role(http_client: &Client) -> Result<String> {
    let email = metadata::get(
        http_client,
        "instance/service-accounts/default/email",
        &[],
    )
    .await
    .context("error getting default service account email")?;

    let role = email
        .split('@')
        .next()
        .unwrap_or_default()
        .to_string();
    if role.is_empty() {
        anyhow::bail!("default service account email {email:?} has no local part");
    }

    Ok(role)
}
