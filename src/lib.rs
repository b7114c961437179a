pub mod api;
pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod resources;
pub mod store;

pub use api::{ApiState, run_api_server};
pub use config::{ConfigError, ControllerConfig};
pub use controller::{
    ClusterParams, ClusterRecord, ClusterState, Context, Credentials, DatabaseEngine,
    EngineKind, EngineSettings, Error, Operators, Psmdb, Result, Xtradb,
};
pub use health::{HealthState, Metrics};
pub use store::{HttpManifestSource, KubeStore, ManifestSource, ResourceStore};

use std::sync::Arc;

use kube::Client;

use controller::environment::{
    EnvironmentMode, EnvironmentProbe, StaticEnvironment, StorageClassProbe,
};

/// Build the operation context for a Kubernetes cluster
pub fn build_context(client: Client, config: &ControllerConfig) -> Context {
    let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(client, config.namespace.clone()));
    let manifests: Arc<dyn ManifestSource> =
        Arc::new(HttpManifestSource::new(config.manifest_urls.clone()));
    let environment: Arc<dyn EnvironmentProbe> = match config.environment {
        EnvironmentMode::Auto => Arc::new(StorageClassProbe::new(store.clone())),
        EnvironmentMode::Fixed(environment) => Arc::new(StaticEnvironment(environment)),
    };
    tracing::debug!(mode = ?config.environment, "configured environment detection");

    Context::new(
        store,
        manifests,
        environment,
        config.xtradb.clone(),
        config.psmdb.clone(),
    )
}
