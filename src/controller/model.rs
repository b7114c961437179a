//! Request and response shapes of the cluster operations
//!
//! Nothing here is persisted: parameters are consumed once per call and
//! records are derived fresh from the store on every read.

use serde::{Deserialize, Serialize};

use crate::controller::engine::EngineKind;
use crate::controller::state::ClusterState;

/// Container compute limits as Kubernetes quantity strings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResources {
    /// CPU quantity (e.g., "500m", "2")
    #[serde(default)]
    pub cpu_m: String,
    /// Memory quantity (e.g., "1G", "512Mi")
    #[serde(default)]
    pub memory_bytes: String,
}

impl ComputeResources {
    pub fn new(cpu_m: impl Into<String>, memory_bytes: impl Into<String>) -> Self {
        Self {
            cpu_m: cpu_m.into(),
            memory_bytes: memory_bytes.into(),
        }
    }
}

/// Compute and disk of one workload tier
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeResources>,
    /// Persistent volume size (e.g., "10Gi"); "0" when the volume has none
    #[serde(default)]
    pub disk_size: String,
}

impl Workload {
    pub fn new(compute: Option<ComputeResources>, disk_size: impl Into<String>) -> Self {
        Self {
            compute,
            disk_size: disk_size.into(),
        }
    }
}

/// XtraDB tiers: the database nodes and the ProxySQL router
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XtraDbWorkloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pxc: Option<Workload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxysql: Option<Workload>,
}

/// PSMDB tiers: the replica set
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsmdbWorkloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicaset: Option<Workload>,
}

/// Parameters of a create or update request
///
/// `resume` and `suspend` may both be set; resume is applied first, so the
/// cluster ends up paused.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterParams<W> {
    pub name: String,
    /// Monitoring server address; monitoring is enabled when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmm_public_address: Option<String>,
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub suspend: bool,
    #[serde(default)]
    pub resume: bool,
    #[serde(flatten)]
    pub workloads: W,
}

impl<W: Default> ClusterParams<W> {
    pub fn new(name: impl Into<String>, size: i32) -> Self {
        Self {
            name: name.into(),
            pmm_public_address: None,
            size,
            suspend: false,
            resume: false,
            workloads: W::default(),
        }
    }
}

impl<W> ClusterParams<W> {
    pub fn with_workloads(mut self, workloads: W) -> Self {
        self.workloads = workloads;
        self
    }

    pub fn with_pmm(mut self, address: impl Into<String>) -> Self {
        self.pmm_public_address = Some(address.into());
        self
    }

    pub fn suspended(mut self) -> Self {
        self.suspend = true;
        self
    }

    pub fn resumed(mut self) -> Self {
        self.resume = true;
        self
    }

    /// The monitoring address, treating an empty string as absent
    pub fn pmm_address(&self) -> Option<&str> {
        self.pmm_public_address
            .as_deref()
            .filter(|address| !address.is_empty())
    }
}

/// One cluster as seen by a list call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord<W> {
    pub name: String,
    pub size: i32,
    pub state: ClusterState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub pause: bool,
    #[serde(flatten)]
    pub workloads: W,
}

impl<W> ClusterRecord<W> {
    /// A cluster whose custom resource is gone but whose pods remain
    pub fn deleting(name: impl Into<String>, workloads: W) -> Self {
        Self {
            name: name.into(),
            size: 0,
            state: ClusterState::Deleting,
            message: String::new(),
            pause: false,
            workloads,
        }
    }
}

/// Connection credentials of a cluster
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    /// Empty unless the cluster is ready or changing
    pub password: String,
    pub host: String,
    pub port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicaset: Option<String>,
}

/// Installation status of an engine's operator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperatorStatus {
    /// Installed with the expected API version
    Ok,
    /// Installed with a different API version
    Unsupported,
    NotInstalled,
}

impl OperatorStatus {
    pub fn is_installed(self) -> bool {
        !matches!(self, OperatorStatus::NotInstalled)
    }
}

/// Operator status of every engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operators {
    pub xtradb: OperatorStatus,
    pub psmdb: OperatorStatus,
}

impl Operators {
    pub fn get(&self, engine: EngineKind) -> OperatorStatus {
        match engine {
            EngineKind::Xtradb => self.xtradb,
            EngineKind::Psmdb => self.psmdb,
        }
    }
}
