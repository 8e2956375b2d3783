//! # Destination Sink
//!
//! Abstraction over the store that secrets are mirrored *into*.
//!
//! A sink handle is scoped to one namespace. The reflector drives it through
//! four operations: list the names it owns (by ownership label value),
//! create, update, delete. Updates fully replace the payload; the sink never
//! merges field sets.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubeSecretSink;
pub use memory::MemorySecretStore;

/// A secret as the destination store should hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSecret {
    /// Object name within the sink's namespace.
    pub name: String,
    /// Full label map, ownership label included.
    pub labels: BTreeMap<String, String>,
    /// Declared content type (e.g. `Opaque`).
    pub secret_type: String,
    /// Flat field map; replaces any existing payload wholesale.
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Errors raised by sink implementations.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The named object does not exist.
    ///
    /// Surfaced distinctly so the reflector can treat "already gone" during
    /// reconciliation as success.
    #[error("secret not found")]
    NotFound,

    /// Create was asked to make an object that is already there.
    #[error("secret already exists")]
    AlreadyExists,

    /// Any other store failure.
    #[error("store error")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Write access to one namespace of the destination store.
#[async_trait]
pub trait SecretSink: Send + Sync {
    /// Names of all secrets carrying the ownership label with `label_value`.
    async fn list_owned(&self, label_value: &str) -> Result<Vec<String>, SinkError>;

    /// Create a secret that does not exist yet.
    async fn create(&self, secret: &DestinationSecret) -> Result<(), SinkError>;

    /// Replace an existing secret in place.
    async fn update(&self, secret: &DestinationSecret) -> Result<(), SinkError>;

    /// Delete a secret by name.
    async fn delete(&self, name: &str) -> Result<(), SinkError>;
}
