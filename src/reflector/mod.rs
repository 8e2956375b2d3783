//! # Reflector
//!
//! The synchronization engine: one pass over a mapping list, mirroring each
//! source secret into the destination namespace and optionally pruning
//! secrets this label no longer maps.
//!
//! ## Pass Flow
//!
//! 1. List destination secrets carrying the run's ownership label: the
//!    set of names previous runs created ("owned").
//! 2. For each mapping, in order: fetch from the matching source, normalize
//!    the payload, then create the destination secret (or replace it whole
//!    if it is owned). Any failure aborts the pass; a partially applied
//!    mapping list is reported loudly rather than skipped silently.
//! 3. If the label value is not the shared default, delete every owned
//!    secret the pass did not touch.
//!
//! The engine keeps no state across passes; the owned/touched sets live and
//! die inside one [`Reflector::reflect`] call, which makes repeated runs
//! idempotent by construction.

mod normalize;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Mapping, SourceType};
use crate::constants::{DEFAULT_LABEL_VALUE, LABEL_KEY};
use crate::error::ReflectError;
use crate::provider::gsm::SecretVersionSource;
use crate::provider::vault::KeyValueSource;
use crate::sink::{DestinationSecret, SecretSink, SinkError};

/// Moves secrets from Vault/Secret Manager to the destination store.
pub struct Reflector {
    vault: Arc<dyn KeyValueSource>,
    gsm: Arc<dyn SecretVersionSource>,
    sink: Arc<dyn SecretSink>,
    label_value: String,
}

impl fmt::Debug for Reflector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflector")
            .field("label_value", &self.label_value)
            .finish_non_exhaustive()
    }
}

impl Reflector {
    /// Build an engine from already-authenticated handles.
    ///
    /// The sink is expected to be scoped to the destination namespace;
    /// `label_value` is the ownership label value this run writes and
    /// reconciles by.
    pub fn new(
        vault: Arc<dyn KeyValueSource>,
        gsm: Arc<dyn SecretVersionSource>,
        sink: Arc<dyn SecretSink>,
        label_value: impl Into<String>,
    ) -> Self {
        Self {
            vault,
            gsm,
            sink,
            label_value: label_value.into(),
        }
    }

    /// Run one synchronization pass.
    ///
    /// Mappings are processed strictly in list order; the first hard failure
    /// aborts the pass. `cancel` is checked at each mapping boundary and
    /// before reconciliation; already-applied writes are not rolled back.
    pub async fn reflect(
        &self,
        cancel: &CancellationToken,
        mappings: &[Mapping],
    ) -> Result<(), ReflectError> {
        let owned: HashSet<String> = self
            .sink
            .list_owned(&self.label_value)
            .await
            .map_err(|source| ReflectError::List { source })?
            .into_iter()
            .collect();

        let mut touched: HashSet<String> = HashSet::new();

        for mapping in mappings {
            if cancel.is_cancelled() {
                return Err(ReflectError::Cancelled);
            }

            let data = self.fetch_fields(mapping).await?;
            let secret = DestinationSecret {
                name: mapping.secret_name.clone(),
                labels: self.labels_for(mapping),
                secret_type: mapping.secret_type.clone(),
                data,
            };

            let written = if owned.contains(&mapping.secret_name) {
                self.sink.update(&secret).await
            } else {
                self.sink.create(&secret).await
            };
            written.map_err(|source| ReflectError::Write {
                name: mapping.secret_name.clone(),
                source,
            })?;

            info!(
                path = %mapping.path,
                secret = %mapping.secret_name,
                secret_type = %mapping.secret_type,
                "reflected {} secret",
                mapping.source_type
            );
            touched.insert(mapping.secret_name.clone());
        }

        // Reconciliation is skipped entirely for the default label value:
        // that label is shared by every unconfigured run, so pruning by it
        // could destroy secrets some other deployment still maps.
        if self.label_value != DEFAULT_LABEL_VALUE {
            if cancel.is_cancelled() {
                return Err(ReflectError::Cancelled);
            }
            self.reconcile(&owned, &touched).await?;
        }

        Ok(())
    }

    /// Fetch and normalize one mapping's secret material.
    async fn fetch_fields(
        &self,
        mapping: &Mapping,
    ) -> Result<BTreeMap<String, Vec<u8>>, ReflectError> {
        match mapping.source_type {
            SourceType::Vault => {
                let raw = self
                    .vault
                    .read(&mapping.path)
                    .await
                    .map_err(|source| ReflectError::SourceFetch {
                        path: mapping.path.clone(),
                        source,
                    })?
                    .ok_or_else(|| ReflectError::SourceNotFound {
                        path: mapping.path.clone(),
                    })?;
                normalize::vault_fields(mapping, raw)
            }
            SourceType::Gsm => {
                let payload = self.gsm.access(&mapping.path).await.map_err(|source| {
                    ReflectError::SourceFetch {
                        path: mapping.path.clone(),
                        source,
                    }
                })?;
                normalize::gsm_fields(mapping, &payload)
            }
        }
    }

    /// Label map for a destination secret.
    ///
    /// `additional_labels` are merged in first; the ownership label is
    /// written last so a conflicting entry can never displace it.
    fn labels_for(&self, mapping: &Mapping) -> BTreeMap<String, String> {
        let mut labels = mapping.additional_labels.clone();
        labels.insert(LABEL_KEY.to_string(), self.label_value.clone());
        labels
    }

    /// Delete owned secrets the pass did not touch.
    ///
    /// A secret that is already gone counts as deleted; anything else stops
    /// reconciliation, without rolling back deletes that already happened.
    async fn reconcile(
        &self,
        owned: &HashSet<String>,
        touched: &HashSet<String>,
    ) -> Result<(), ReflectError> {
        for name in stale_names(owned, touched) {
            match self.sink.delete(&name).await {
                Ok(()) | Err(SinkError::NotFound) => {
                    info!(secret = %name, "pruned destination secret");
                }
                Err(source) => return Err(ReflectError::Delete { name, source }),
            }
        }

        Ok(())
    }
}

/// Names that were owned coming into the pass but not written during it:
/// the reconciliation work list, in stable order.
fn stale_names(owned: &HashSet<String>, touched: &HashSet<String>) -> Vec<String> {
    let mut stale: Vec<String> = owned.difference(touched).cloned().collect();
    stale.sort();
    stale
}
