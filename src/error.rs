//! # Reflection Errors
//!
//! Error type returned by a reflection pass.
//!
//! Every variant carries enough context (source path, destination name) to
//! diagnose a failed run from the log line alone; the reflector performs no
//! retries, so the first hard failure is the error the caller sees.

use thiserror::Error;

use crate::provider::SourceError;
use crate::sink::SinkError;

/// Errors surfaced by [`crate::reflector::Reflector::reflect`].
#[derive(Debug, Error)]
pub enum ReflectError {
    /// The mapping's source path has no secret behind it.
    #[error("secret {path} not found")]
    SourceNotFound { path: String },

    /// Reaching the source store failed (transport, auth, API error).
    #[error("error reading secret {path}")]
    SourceFetch {
        path: String,
        #[source]
        source: SourceError,
    },

    /// The mapping names a key/value engine version this build does not know.
    #[error("unknown key/value engine version {version:?} for secret {path}")]
    UnsupportedEngineVersion { version: String, path: String },

    /// The source payload violated a shape invariant (wrapping, JSON, value
    /// types).
    #[error("malformed payload for secret {path}: {reason}")]
    MalformedPayload { path: String, reason: String },

    /// The ownership set could not be established; the pass never started.
    #[error("error listing destination secrets")]
    List {
        #[source]
        source: SinkError,
    },

    /// Creating or updating a destination secret failed.
    #[error("error writing destination secret {name}")]
    Write {
        name: String,
        #[source]
        source: SinkError,
    },

    /// Deleting a destination secret failed during reconciliation.
    ///
    /// "Already gone" is absorbed before this variant is ever built.
    #[error("error deleting destination secret {name}")]
    Delete {
        name: String,
        #[source]
        source: SinkError,
    },

    /// The caller cancelled the pass between mapping iterations.
    #[error("reflection pass cancelled")]
    Cancelled,
}
