//! Detection of development clusters
//!
//! Clusters created on a development Kubernetes (minikube) cannot get a
//! load balancer, so the client-facing tier stays internal there.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::storage::v1::StorageClass;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::controller::error::{Error, Result, StoreResultExt};
use crate::store::{ResourceKind, ResourceStore, from_object};

/// Annotation marking the default storage class
pub const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// Kind of Kubernetes installation the controller runs against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// How the client-facing tier of a new cluster is reachable
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exposure {
    /// Cluster-internal service only
    Internal,
    /// Exposed through a cloud load balancer
    LoadBalancer,
}

impl Exposure {
    /// Only a positive production answer exposes a cluster
    pub fn from_probe(probe: &Result<Environment>) -> Self {
        match probe {
            Ok(Environment::Production) => Exposure::LoadBalancer,
            _ => Exposure::Internal,
        }
    }
}

/// Answers whether the controller runs against a development cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    async fn detect(&self, cancel: &CancellationToken) -> Result<Environment>;
}

/// Classifies the API server by the provisioner of its default storage class
#[derive(Clone)]
pub struct StorageClassProbe {
    store: Arc<dyn ResourceStore>,
}

impl StorageClassProbe {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Classify a list of storage classes.
    ///
    /// The class annotated as default is used, else the first one.
    pub fn classify(classes: &[StorageClass]) -> Result<Environment> {
        let class = classes
            .iter()
            .find(|class| is_default(class))
            .or_else(|| classes.first())
            .ok_or_else(|| Error::Environment("no storage classes".to_string()))?;

        if class.provisioner.contains("minikube") {
            Ok(Environment::Development)
        } else {
            Ok(Environment::Production)
        }
    }

    /// Detect the environment through `store`
    pub async fn detect_with<S>(store: &S, cancel: &CancellationToken) -> Result<Environment>
    where
        S: ResourceStore + ?Sized,
    {
        let objects = store
            .list(&ResourceKind::storage_class(), cancel)
            .await
            .context("cannot get storageClass")?;
        let classes = objects
            .iter()
            .map(from_object::<StorageClass>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let environment = Self::classify(&classes)?;
        debug!(environment = %environment, "detected environment from storage classes");
        Ok(environment)
    }
}

#[async_trait]
impl EnvironmentProbe for StorageClassProbe {
    async fn detect(&self, cancel: &CancellationToken) -> Result<Environment> {
        Self::detect_with(self.store.as_ref(), cancel).await
    }
}

fn is_default(class: &StorageClass) -> bool {
    class
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(DEFAULT_CLASS_ANNOTATION))
        .is_some_and(|value| value == "true")
}

/// Probe that always answers the same
#[derive(Clone, Copy, Debug)]
pub struct StaticEnvironment(pub Environment);

#[async_trait]
impl EnvironmentProbe for StaticEnvironment {
    async fn detect(&self, _cancel: &CancellationToken) -> Result<Environment> {
        Ok(self.0)
    }
}

/// How environment detection is configured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvironmentMode {
    /// Probe storage classes on every create
    #[default]
    Auto,
    Fixed(Environment),
}

impl FromStr for EnvironmentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(EnvironmentMode::Auto),
            "development" | "dev" => Ok(EnvironmentMode::Fixed(Environment::Development)),
            "production" | "prod" => Ok(EnvironmentMode::Fixed(Environment::Production)),
            other => Err(format!(
                "expected auto, development or production, got {other:?}"
            )),
        }
    }
}

/// Resolve the exposure of a new cluster.
///
/// Cancellation propagates; any other probe failure is logged and the
/// cluster stays internal.
pub async fn resolve_exposure<P>(probe: &P, cancel: &CancellationToken) -> Result<Exposure>
where
    P: EnvironmentProbe + ?Sized,
{
    let detected = probe.detect(cancel).await;
    match &detected {
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(e) => warn!(error = %e, "environment detection failed, keeping cluster internal"),
        Ok(environment) => debug!(environment = %environment, "resolved environment"),
    }
    Ok(Exposure::from_probe(&detected))
}
