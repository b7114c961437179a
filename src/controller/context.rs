use std::sync::Arc;

use crate::controller::engine::EngineKind;
use crate::controller::environment::EnvironmentProbe;
use crate::resources::secret::{PasswordGenerator, TimeSeededGenerator};
use crate::store::{ManifestSource, ResourceKind, ResourceStore};

/// Operator and custom resource versions the controller targets for an engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Operator release whose API the controller speaks, e.g. "1.6.0"
    pub operator_version: String,
    /// `spec.crVersion` written into new clusters
    pub cr_version: String,
}

impl EngineSettings {
    pub fn new(operator_version: impl Into<String>, cr_version: impl Into<String>) -> Self {
        Self {
            operator_version: operator_version.into(),
            cr_version: cr_version.into(),
        }
    }
}

/// Shared context for the cluster operations
#[derive(Clone)]
pub struct Context {
    /// Kubernetes API access
    pub store: Arc<dyn ResourceStore>,
    /// Operator bundle source
    pub manifests: Arc<dyn ManifestSource>,
    pub environment: Arc<dyn EnvironmentProbe>,
    pub passwords: Arc<dyn PasswordGenerator>,
    pub xtradb: EngineSettings,
    pub psmdb: EngineSettings,
}

impl Context {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        manifests: Arc<dyn ManifestSource>,
        environment: Arc<dyn EnvironmentProbe>,
        xtradb: EngineSettings,
        psmdb: EngineSettings,
    ) -> Self {
        Self {
            store,
            manifests,
            environment,
            passwords: Arc::new(TimeSeededGenerator),
            xtradb,
            psmdb,
        }
    }

    /// Replace the password generator
    pub fn with_passwords(mut self, passwords: Arc<dyn PasswordGenerator>) -> Self {
        self.passwords = passwords;
        self
    }

    pub fn settings(&self, engine: EngineKind) -> &EngineSettings {
        match engine {
            EngineKind::Xtradb => &self.xtradb,
            EngineKind::Psmdb => &self.psmdb,
        }
    }

    /// API version of `engine`'s custom resources the controller reads and writes
    pub fn api_version(&self, engine: EngineKind) -> String {
        engine.api_version(&self.settings(engine).operator_version)
    }

    pub fn cluster_kind(&self, engine: EngineKind) -> ResourceKind {
        engine.resource_kind(&self.settings(engine).operator_version)
    }
}
