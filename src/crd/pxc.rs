//! PerconaXtraDBCluster custom resource
//!
//! Only the fields the controller writes or reads are modelled. Documents
//! read back from the API server may carry many more; they are ignored here
//! and preserved by the update path, which edits raw JSON.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::core::ObjectMeta;
use serde::{Deserialize, Serialize};

use super::common::{
    AppStatus, ClusterCondition, PmmSpec, PodAffinity, PodDisruptionBudgetSpec, VolumeSpec,
};

/// A PerconaXtraDBCluster document at any served API version
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerconaXtraDBCluster {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PerconaXtraDBClusterSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PerconaXtraDBClusterStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerconaXtraDBClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr_version: Option<String>,

    /// Always serialized: omitting it can leave the cluster stuck paused
    #[serde(default)]
    pub pause: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_name: Option<String>,

    #[serde(rename = "allowUnsafeConfigurations", default)]
    pub allow_unsafe_configurations: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pxc: Option<PodSpec>,

    #[serde(rename = "proxysql", default, skip_serializing_if = "Option::is_none")]
    pub proxysql: Option<PodSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmm: Option<PmmSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupSpec>,
}

/// Pod template of one tier
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_spec: Option<VolumeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<PodAffinity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_disruption_budget: Option<PodDisruptionBudgetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
}

/// Scheduled backups
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<BackupSchedule>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storages: BTreeMap<String, BackupStorageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupSchedule {
    pub name: String,
    /// Cron expression
    pub schedule: String,
    /// Number of backups retained
    pub keep: i32,
    pub storage_name: String,
}

/// Backup storage types
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackupStorageType {
    Filesystem,
    S3,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageSpec {
    #[serde(rename = "type")]
    pub type_: BackupStorageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerconaXtraDBClusterStatus {
    #[serde(default)]
    pub pxc: AppStatus,
    #[serde(rename = "proxysql", default)]
    pub proxysql: AppStatus,
    #[serde(default)]
    pub host: String,
    /// Operator messages, one per problem
    #[serde(rename = "message", default)]
    pub messages: Vec<String>,
    /// Overall cluster state
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ClusterCondition>,
}
