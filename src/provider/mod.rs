//! # Source Providers
//!
//! Adapters for the stores that secrets are mirrored *from*.
//!
//! Each source kind implements one narrow trait:
//! - [`vault::KeyValueSource`] for key/value secret engines
//! - [`gsm::SecretVersionSource`] for Secret Manager style services
//!
//! Adding a source kind means adding one adapter implementation and one
//! normalizer branch; the trait signatures stay put.

use thiserror::Error;

pub mod gsm;
pub(crate) mod metadata;
pub mod vault;

/// Errors raised by source adapters.
///
/// "Secret not found" is not an error at this layer: the Vault adapter
/// reports it as `Ok(None)` so the engine can distinguish "no data" from a
/// failed read.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The store answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The store could not be reached, or its response body failed to parse
    /// as the expected JSON.
    #[error("transport error")]
    Transport(#[from] reqwest::Error),

    /// The response parsed but did not have the promised shape.
    #[error("unexpected response shape: {0}")]
    Decode(String),
}
