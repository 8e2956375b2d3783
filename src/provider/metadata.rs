//! # GCE Metadata Server
//!
//! Minimal helpers for the Google Compute Engine metadata service, used by
//! the bootstrap paths that trade machine identity for store credentials.

use anyhow::{Context, Result};
use reqwest::Client;

/// Base URL of the metadata service.
pub const BASE_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

/// Fetch a metadata value as text.
///
/// `path` is relative to [`BASE_URL`]; `query` is appended as-is.
pub async fn get(
    http_client: &Client,
    path: &str,
    query: &[(&str, &str)],
) -> Result<String> {
    let url = format!("{BASE_URL}/{path}");

    let response = http_client
        .get(&url)
        .query(query)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .with_context(|| format!("error reaching metadata server at {path}"))?;

    if !response.status().is_success() {
        anyhow::bail!(
            "metadata server returned {} for {path}",
            response.status()
        );
    }

    response
        .text()
        .await
        .with_context(|| format!("error reading metadata response for {path}"))
}
