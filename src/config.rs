//! # Configuration
//!
//! File-level configuration for a reflection run.
//!
//! A run is driven by a single YAML document: connection settings for the
//! source stores, the destination namespace, the ownership label value, and
//! the list of source-to-destination mappings. Defaulting and validation both
//! happen here, before any client is constructed; the reflector itself only
//! ever sees a validated, fully defaulted mapping list.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_LABEL_VALUE, DEFAULT_NAMESPACE, DEFAULT_SECRET_TYPE};
use crate::provider::vault::EngineVersion;

/// Which kind of store a mapping reads from.
///
/// An absent or empty `sourceType` deserializes to [`SourceType::Vault`];
/// early configurations predate the Secret Manager source and never spelled
/// the field out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceType {
    /// A HashiCorp Vault key/value engine.
    #[default]
    #[serde(rename = "vault", alias = "")]
    Vault,
    /// A Google Secret Manager secret version.
    #[serde(rename = "gsm")]
    Gsm,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vault => f.write_str("vault"),
            Self::Gsm => f.write_str("gsm"),
        }
    }
}

/// How a Secret Manager payload maps onto destination secret fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GsmEncoding {
    /// The whole payload becomes the value of a single field.
    #[default]
    #[serde(rename = "raw", alias = "")]
    Raw,
    /// The payload is a JSON object; its top-level keys become fields.
    #[serde(rename = "json")]
    Json,
}

/// One source-to-destination mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    /// Store to read from; defaults to Vault.
    #[serde(default)]
    pub source_type: SourceType,

    /// Source identifier. For Vault this is the full read path (including
    /// the `data/` segment for kv-v2 mounts); for Secret Manager it is the
    /// fully qualified version name
    /// (`projects/<p>/secrets/<s>/versions/<v>`).
    ///
    /// `vaultPath` is accepted as a legacy spelling of this key.
    #[serde(alias = "vaultPath")]
    pub path: String,

    /// Name of the Kubernetes secret to create or update.
    pub secret_name: String,

    /// Kubernetes secret type; defaults to `Opaque`.
    #[serde(default)]
    pub secret_type: String,

    /// Key/value engine version behind `path`. Falls back to the
    /// configuration-wide default during [`Config::set_defaults`].
    #[serde(default)]
    pub vault_engine_version: Option<EngineVersion>,

    /// Payload encoding for Secret Manager sources.
    #[serde(default)]
    pub gsm_encoding: GsmEncoding,

    /// Destination field name for raw Secret Manager payloads; defaults to
    /// `secret_name` when unset.
    #[serde(default)]
    pub gsm_secret_key: Option<String>,

    /// Extra labels to attach to the destination secret. The ownership label
    /// key cannot be overridden through this map.
    #[serde(default)]
    pub additional_labels: BTreeMap<String, String>,
}

/// Vault connection and authentication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Base URL of the Vault server, e.g. `https://vault.example.com:8200`.
    #[serde(default)]
    pub url: String,

    /// How to authenticate to Vault.
    #[serde(default)]
    pub auth_type: VaultAuthType,

    /// Static token for [`VaultAuthType::Token`].
    #[serde(default)]
    pub token: Option<String>,

    /// Vault role for [`VaultAuthType::GcpDefault`]. Derived from the
    /// machine's default service account when unset.
    #[serde(default)]
    pub role: Option<String>,

    /// Engine version assumed for mappings that do not declare one.
    #[serde(default)]
    pub default_engine_version: Option<EngineVersion>,
}

/// Vault authentication methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VaultAuthType {
    /// Use the token from [`VaultConfig::token`] directly.
    #[default]
    #[serde(rename = "token")]
    Token,
    /// Exchange the GCE default service account's identity JWT for a Vault
    /// token via the `gcp` auth method.
    #[serde(rename = "gcp-default")]
    GcpDefault,
}

/// Secret Manager connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GsmConfig {
    /// API endpoint override, mostly for tests; defaults to the public
    /// Secret Manager endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Vault connection settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Secret Manager connection settings.
    #[serde(default)]
    pub gsm: GsmConfig,

    /// Namespace the destination secrets live in.
    #[serde(default)]
    pub namespace: String,

    /// Ownership label value for this run.
    #[serde(default)]
    pub label: String,

    /// Source-to-destination mappings, processed in order.
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

/// Configuration validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no mappings defined")]
    NoMappings,

    #[error("mapping {index}: path must not be empty")]
    EmptyPath { index: usize },

    #[error("mapping {index}: secret name {name:?} is not a valid DNS subdomain")]
    InvalidSecretName { index: usize, name: String },
}

impl Config {
    /// Fill in defaults for everything the file left out.
    ///
    /// Values that were set are never clobbered.
    pub fn set_defaults(&mut self) {
        if self.namespace.is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }

        if self.label.is_empty() {
            self.label = DEFAULT_LABEL_VALUE.to_string();
        }

        if self.vault.default_engine_version.is_none() {
            self.vault.default_engine_version = Some(EngineVersion::kv_v1());
        }

        for mapping in &mut self.mappings {
            if mapping.secret_type.is_empty() {
                mapping.secret_type = DEFAULT_SECRET_TYPE.to_string();
            }
            if mapping.vault_engine_version.is_none() {
                mapping.vault_engine_version = self.vault.default_engine_version.clone();
            }
        }
    }

    /// Check invariants the reflector depends on.
    ///
    /// Call after [`Config::set_defaults`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mappings.is_empty() {
            return Err(ConfigError::NoMappings);
        }

        for (index, mapping) in self.mappings.iter().enumerate() {
            if mapping.path.is_empty() {
                return Err(ConfigError::EmptyPath { index });
            }
            if !is_dns_subdomain(&mapping.secret_name) {
                return Err(ConfigError::InvalidSecretName {
                    index,
                    name: mapping.secret_name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// RFC 1123 subdomain check, the same rule the Kubernetes API server applies
/// to secret names.
fn is_dns_subdomain(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}
