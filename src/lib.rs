//! Secret Reflector Library
//!
//! Mirrors secrets from HashiCorp Vault key/value engines and Google Secret
//! Manager into Kubernetes secrets in a single namespace. Designed to run as
//! a one-shot job: each invocation performs exactly one synchronization pass
//! and exits, so repeated runs converge on the configured mapping list.
//!
//! The pieces, from the outside in:
//!
//! - [`config`] - YAML configuration, defaulting and validation
//! - [`provider`] - source adapters (Vault REST, Secret Manager REST, mocks)
//! - [`sink`] - destination store abstraction (Kubernetes, in-memory)
//! - [`reflector`] - the synchronization engine itself

pub mod config;
pub mod constants;
pub mod error;
pub mod provider;
pub mod reflector;
pub mod sink;

pub use config::{Config, Mapping, SourceType};
pub use error::ReflectError;
pub use reflector::Reflector;
