//! Narrow interface to the Kubernetes API server
//!
//! Every read, write and delete the controller performs goes through
//! [`ResourceStore`]. Documents travel as [`DynamicObject`]s so the same
//! interface serves Secrets, Pods, StorageClasses, operator bundles and the
//! Percona custom resources, whose API version changes across operator
//! upgrades.

pub mod kubernetes;
pub mod manifest;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Pod, Secret};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{ApiResource, DynamicObject};
use kube::Resource;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use kubernetes::KubeStore;
pub use manifest::{HttpManifestSource, ManifestSource, parse_bundle};

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "dbaas-controller";

/// Errors returned by a [`ResourceStore`]
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name:?} was modified concurrently")]
    Conflict { kind: String, name: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

/// A resource type together with its scope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceKind {
    pub resource: ApiResource,
    /// Namespaced kinds are read and written in the store's namespace
    pub namespaced: bool,
}

impl ResourceKind {
    /// A namespaced built-in kind
    pub fn namespaced<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            resource: ApiResource::erase::<K>(&()),
            namespaced: true,
        }
    }

    /// A cluster-scoped built-in kind
    pub fn cluster<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            resource: ApiResource::erase::<K>(&()),
            namespaced: false,
        }
    }

    /// A namespaced custom resource kind
    pub fn custom(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            resource: ApiResource {
                group: group.to_string(),
                version: version.to_string(),
                api_version: format!("{group}/{version}"),
                kind: kind.to_string(),
                plural: plural.to_string(),
            },
            namespaced: true,
        }
    }

    pub fn secret() -> Self {
        Self::namespaced::<Secret>()
    }

    pub fn pod() -> Self {
        Self::namespaced::<Pod>()
    }

    pub fn storage_class() -> Self {
        Self::cluster::<StorageClass>()
    }

    pub fn kind(&self) -> &str {
        &self.resource.kind
    }
}

/// Workloads that can be restarted through [`StoreCommand::RolloutRestart`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadKind {
    StatefulSet,
    Deployment,
}

impl WorkloadKind {
    pub fn resource_kind(self) -> ResourceKind {
        match self {
            WorkloadKind::StatefulSet => ResourceKind::namespaced::<StatefulSet>(),
            WorkloadKind::Deployment => ResourceKind::namespaced::<Deployment>(),
        }
    }
}

/// Store-native operations that are not plain document reads or writes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCommand {
    /// List every served `group/version`, one per line
    ApiVersions,
    /// Trigger a rolling restart of a workload
    RolloutRestart { kind: WorkloadKind, name: String },
}

/// Declarative resource store
///
/// Every method takes the caller's cancellation token and must return
/// [`StoreError::Cancelled`] promptly once it fires.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a single resource, [`StoreError::NotFound`] when absent
    async fn get(
        &self,
        kind: &ResourceKind,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<DynamicObject, StoreError>;

    /// List every resource of a kind
    async fn list(
        &self,
        kind: &ResourceKind,
        cancel: &CancellationToken,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Create or update a resource.
    ///
    /// A `metadata.resourceVersion` on the object is a precondition: a
    /// mismatch yields [`StoreError::Conflict`].
    async fn apply(
        &self,
        object: &DynamicObject,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    /// Delete a resource; deleting an absent resource succeeds
    async fn delete(
        &self,
        kind: &ResourceKind,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    /// Execute a store-native command and return its raw output
    async fn run(
        &self,
        command: &StoreCommand,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, StoreError>;
}

/// Render a [`DynamicObject`] as one JSON document
pub fn object_to_value(object: &DynamicObject) -> Result<Value, serde_json::Error> {
    let mut document = match &object.data {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(serde::ser::Error::custom(format!(
                "object body is not a map: {other}"
            )));
        }
    };
    if let Some(types) = &object.types {
        document.insert("apiVersion".into(), Value::String(types.api_version.clone()));
        document.insert("kind".into(), Value::String(types.kind.clone()));
    }
    document.insert("metadata".into(), serde_json::to_value(&object.metadata)?);
    Ok(Value::Object(document))
}

/// Parse a JSON document into a [`DynamicObject`]
pub fn value_to_object(value: Value) -> Result<DynamicObject, serde_json::Error> {
    let mut object: DynamicObject = serde_json::from_value(value)?;
    if let Value::Object(map) = &mut object.data {
        map.remove("apiVersion");
        map.remove("kind");
        map.remove("metadata");
    }
    Ok(object)
}

/// Convert a typed resource into a [`DynamicObject`]
pub fn to_object<T: Serialize>(resource: &T) -> Result<DynamicObject, serde_json::Error> {
    value_to_object(serde_json::to_value(resource)?)
}

/// Convert a [`DynamicObject`] into a typed resource
pub fn from_object<T: DeserializeOwned>(object: &DynamicObject) -> Result<T, serde_json::Error> {
    serde_json::from_value(object_to_value(object)?)
}
