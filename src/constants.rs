//! # Constants
//!
//! Shared constants used throughout the reflector.
//!
//! These values are the conventions every run agrees on; the namespace and
//! ownership label value can be overridden via the configuration file.

/// Label key attached to every Kubernetes secret created by the reflector.
///
/// The label value identifies which run "owns" a secret; reconciliation only
/// ever considers secrets carrying this key with the run's configured value.
pub const LABEL_KEY: &str = "secret-reflector";

/// Default value of the ownership label.
///
/// Reconciliation (deletion of unmapped secrets) is disabled while the label
/// is left at this value: the default is shared by every unconfigured
/// deployment, so pruning by it could delete secrets some other run owns.
pub const DEFAULT_LABEL_VALUE: &str = "default";

/// Default Kubernetes namespace that secrets are written into.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default Kubernetes secret type for mirrored secrets.
pub const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Exit status for incorrect command-line arguments.
pub const EXIT_USAGE: i32 = 10;

/// Exit status when the configuration file cannot be read.
pub const EXIT_CONFIG_READ: i32 = 20;

/// Exit status when the configuration file cannot be parsed.
pub const EXIT_CONFIG_PARSE: i32 = 21;

/// Exit status when the configuration fails validation.
pub const EXIT_CONFIG_INVALID: i32 = 22;

/// Exit status when the Vault client cannot be constructed or authenticated.
pub const EXIT_VAULT_CLIENT: i32 = 30;

/// Exit status when the Kubernetes client cannot be constructed.
pub const EXIT_K8S_CLIENT: i32 = 31;

/// Exit status when the Secret Manager client cannot be constructed.
pub const EXIT_GSM_CLIENT: i32 = 32;

/// Exit status when the reflection pass itself fails.
pub const EXIT_REFLECT: i32 = 40;
