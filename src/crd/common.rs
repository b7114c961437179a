//! Types shared by the Percona custom resources

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaimSpec, ResourceRequirements, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};

use crate::controller::model::ComputeResources;

/// Anti-affinity topology key that disables spreading pods across nodes
pub const AFFINITY_OFF: &str = "none";

/// Service type that exposes a tier outside the cluster
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

/// Pod anti-affinity settings
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodAffinity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anti_affinity_topology_key: Option<String>,
}

impl PodAffinity {
    pub fn topology_key(key: impl Into<String>) -> Self {
        Self {
            anti_affinity_topology_key: Some(key.into()),
        }
    }
}

/// Pod disruption budget generated by the operator
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodDisruptionBudgetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_available: Option<IntOrString>,
}

impl PodDisruptionBudgetSpec {
    pub fn max_unavailable(count: i32) -> Self {
        Self {
            max_unavailable: Some(IntOrString::Int(count)),
            min_available: None,
        }
    }
}

/// Persistent storage of a tier
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimSpec>,
}

impl VolumeSpec {
    /// A claim requesting `size` of storage
    pub fn with_storage(size: &str) -> Self {
        Self {
            persistent_volume_claim: Some(PersistentVolumeClaimSpec {
                resources: Some(VolumeResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "storage".to_string(),
                        Quantity(size.to_string()),
                    )])),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    /// The requested storage, if the claim carries one
    pub fn storage_request(&self) -> Option<&str> {
        self.persistent_volume_claim
            .as_ref()?
            .resources
            .as_ref()?
            .requests
            .as_ref()?
            .get("storage")
            .map(|quantity| quantity.0.as_str())
    }
}

/// Disk size reported for a tier; `"0"` when nothing is requested
pub fn disk_size(volume: Option<&VolumeSpec>) -> String {
    volume
        .and_then(VolumeSpec::storage_request)
        .unwrap_or("0")
        .to_string()
}

/// Resource requirements carrying only limits
pub fn limits(compute: &ComputeResources) -> ResourceRequirements {
    ResourceRequirements {
        limits: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(compute.cpu_m.clone())),
            ("memory".to_string(), Quantity(compute.memory_bytes.clone())),
        ])),
        ..Default::default()
    }
}

/// Resource requirements carrying only requests
pub fn requests(cpu: &str, memory: &str) -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])),
        ..Default::default()
    }
}

/// Snapshot of the limits of a tier, `None` when it has no limits
pub fn compute_snapshot(resources: Option<&ResourceRequirements>) -> Option<ComputeResources> {
    let limits = resources?.limits.as_ref()?;
    let quantity = |name: &str| {
        limits
            .get(name)
            .map(|quantity| quantity.0.clone())
            .unwrap_or_default()
    };
    Some(ComputeResources {
        cpu_m: quantity("cpu"),
        memory_bytes: quantity("memory"),
    })
}

/// Monitoring client settings
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PmmSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// One condition reported by an operator
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Status of one application tier
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub ready: i32,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
