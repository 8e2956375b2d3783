//! Kubernetes secret sink.
//!
//! Thin wrapper over `kube::Api<Secret>` scoped to one namespace.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;

use super::{DestinationSecret, SecretSink, SinkError};
use crate::constants::LABEL_KEY;

/// Sink backed by the Kubernetes API server.
pub struct KubeSecretSink {
    api: Api<Secret>,
    namespace: String,
}

impl fmt::Debug for KubeSecretSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeSecretSink")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KubeSecretSink {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }

    fn to_secret(&self, secret: &DestinationSecret) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(secret.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(secret.labels.clone()),
                ..ObjectMeta::default()
            },
            data: Some(
                secret
                    .data
                    .iter()
                    .map(|(key, value)| (key.clone(), ByteString(value.clone())))
                    .collect(),
            ),
            type_: Some(secret.secret_type.clone()),
            ..Secret::default()
        }
    }
}

/// Translate API-server failures into the sink's error surface.
fn store_error(err: kube::Error) -> SinkError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 404 => SinkError::NotFound,
        kube::Error::Api(api_err) if api_err.code == 409 => SinkError::AlreadyExists,
        other => SinkError::Store(Box::new(other)),
    }
}

#[async_trait]
impl SecretSink for KubeSecretSink {
    async fn list_owned(&self, label_value: &str) -> Result<Vec<String>, SinkError> {
        let params = ListParams::default().labels(&format!("{LABEL_KEY}={label_value}"));
        let list = self.api.list(&params).await.map_err(store_error)?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|secret| secret.metadata.name)
            .collect())
    }

    async fn create(&self, secret: &DestinationSecret) -> Result<(), SinkError> {
        self.api
            .create(&PostParams::default(), &self.to_secret(secret))
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update(&self, secret: &DestinationSecret) -> Result<(), SinkError> {
        self.api
            .replace(&secret.name, &PostParams::default(), &self.to_secret(secret))
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SinkError> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(err) => Err(store_error(err)),
        }
    }
}
