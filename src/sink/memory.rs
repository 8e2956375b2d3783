//! In-memory secret sink.
//!
//! Reference implementation of the [`SecretSink`] contract, strict about the
//! same preconditions the API server enforces (create fails on an existing
//! name, update and delete fail on a missing one). The engine tests run
//! against it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{DestinationSecret, SecretSink, SinkError};
use crate::constants::LABEL_KEY;

/// Sink holding secrets in a map.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<BTreeMap<String, DestinationSecret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored secret by name.
    pub fn get(&self, name: &str) -> Option<DestinationSecret> {
        self.secrets
            .lock()
            .expect("memory store lock poisoned")
            .get(name)
            .cloned()
    }

    /// Names of every stored secret, ordered.
    pub fn names(&self) -> Vec<String> {
        self.secrets
            .lock()
            .expect("memory store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Seed a secret directly, bypassing the sink contract.
    pub fn insert(&self, secret: DestinationSecret) {
        self.secrets
            .lock()
            .expect("memory store lock poisoned")
            .insert(secret.name.clone(), secret);
    }
}

#[async_trait]
impl SecretSink for MemorySecretStore {
    async fn list_owned(&self, label_value: &str) -> Result<Vec<String>, SinkError> {
        let secrets = self.secrets.lock().expect("memory store lock poisoned");

        Ok(secrets
            .values()
            .filter(|secret| {
                secret.labels.get(LABEL_KEY).map(String::as_str) == Some(label_value)
            })
            .map(|secret| secret.name.clone())
            .collect())
    }

    async fn create(&self, secret: &DestinationSecret) -> Result<(), SinkError> {
        let mut secrets = self.secrets.lock().expect("memory store lock poisoned");

        if secrets.contains_key(&secret.name) {
            return Err(SinkError::AlreadyExists);
        }
        secrets.insert(secret.name.clone(), secret.clone());
        Ok(())
    }

    async fn update(&self, secret: &DestinationSecret) -> Result<(), SinkError> {
        let mut secrets = self.secrets.lock().expect("memory store lock poisoned");

        if !secrets.contains_key(&secret.name) {
            return Err(SinkError::NotFound);
        }
        secrets.insert(secret.name.clone(), secret.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SinkError> {
        let mut secrets = self.secrets.lock().expect("memory store lock poisoned");

        if secrets.remove(name).is_none() {
            return Err(SinkError::NotFound);
        }
        Ok(())
    }
}
