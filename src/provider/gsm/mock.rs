//! In-memory stand-in for the Secret Manager API.

use std::collections::HashMap;

use async_trait::async_trait;

use super::SecretVersionSource;
use crate::provider::SourceError;

/// Mock secret-version store keyed by fully qualified version name.
#[derive(Debug, Default)]
pub struct MockSecretManager {
    versions: HashMap<String, Vec<u8>>,
}

impl MockSecretManager {
    pub fn new(versions: HashMap<String, Vec<u8>>) -> Self {
        Self { versions }
    }
}

#[async_trait]
impl SecretVersionSource for MockSecretManager {
    async fn access(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        self.versions
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::Api {
                status: 404,
                message: format!("secret version {path} not found"),
            })
    }
}
