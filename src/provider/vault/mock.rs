//! In-memory stand-in for a Vault server.
//!
//! Stores secrets with the same wrapping convention the real engines use on
//! the wire, so the reflector's unwrapping logic is exercised unchanged.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{EngineVersion, KeyValueSource, V2_WRAPPER_KEY};
use crate::provider::SourceError;

/// Mock key/value store.
///
/// `engine_mounts` maps the first path segment to the engine version mounted
/// there, mirroring how a real server wraps responses per mount.
#[derive(Debug, Default)]
pub struct MockVault {
    contents: RwLock<HashMap<String, Map<String, Value>>>,
    engine_mounts: HashMap<String, EngineVersion>,
}

impl MockVault {
    pub fn new(engine_mounts: HashMap<String, EngineVersion>) -> Self {
        Self {
            contents: RwLock::new(HashMap::new()),
            engine_mounts,
        }
    }

    /// Store a secret, applying the mount's wrapping convention.
    ///
    /// # Panics
    ///
    /// Panics when `data` is not a JSON object or no engine is mounted at
    /// the path's first segment; both indicate a broken test setup.
    pub fn write(&self, path: &str, data: Value) {
        let Value::Object(fields) = data else {
            panic!("vault secret data must be a JSON object");
        };

        let mount = path.split('/').next().unwrap_or_default();
        let stored = match self.engine_mounts.get(mount) {
            Some(version) if *version == EngineVersion::kv_v1() => fields,
            Some(version) if *version == EngineVersion::kv_v2() => {
                // the v2 engine responds with an extra level of wrapping
                let mut wrapped = Map::new();
                wrapped.insert(V2_WRAPPER_KEY.to_string(), Value::Object(fields));
                wrapped
            }
            Some(version) => panic!("unknown engine version {version} mounted at {mount:?}"),
            None => panic!("no engine mounted at {mount:?}"),
        };

        self.contents
            .write()
            .expect("mock vault lock poisoned")
            .insert(path.to_string(), stored);
    }
}

#[async_trait]
impl KeyValueSource for MockVault {
    async fn read(
        &self,
        path: &str,
    ) -> Result<Option<Map<String, Value>>, SourceError> {
        // the real client reports a missing secret as no data, not an error
        let contents = self.contents.read().expect("mock vault lock poisoned");
        Ok(contents.get(path).cloned())
    }
}
