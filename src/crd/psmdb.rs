//! PerconaServerMongoDB custom resource

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::core::ObjectMeta;
use serde::{Deserialize, Serialize};

use super::common::{ClusterCondition, PmmSpec, PodAffinity, PodDisruptionBudgetSpec, VolumeSpec};

/// A PerconaServerMongoDB document at any served API version
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerconaServerMongoDB {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PerconaServerMongoDBSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PerconaServerMongoDBStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerconaServerMongoDBSpec {
    #[serde(default)]
    pub pause: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<SecretsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongod: Option<MongodSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharding: Option<ShardingSpec>,
    #[serde(default)]
    pub replsets: Vec<ReplsetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmm: Option<PmmSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretsSpec {
    /// Secret holding the system users' credentials
    pub users: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MongodSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<MongodNet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_profiling: Option<OperationProfiling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<MongodSecurity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<MongodStorage>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MongodNet {
    pub port: i32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfilingMode {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "slowOp")]
    SlowOp,
    #[serde(rename = "all")]
    All,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationProfiling {
    pub mode: ProfilingMode,
}

impl OperationProfiling {
    pub fn slow_op() -> Self {
        Self {
            mode: ProfilingMode::SlowOp,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MongodSecurity {
    #[serde(default)]
    pub redact_client_log_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_encryption: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_cipher_mode: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MongodStorage {
    pub engine: String,
    #[serde(rename = "mmapv1", default, skip_serializing_if = "Option::is_none")]
    pub mmapv1: Option<Mmapv1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wired_tiger: Option<WiredTiger>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mmapv1 {
    pub ns_size: i32,
    #[serde(default)]
    pub smallfiles: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WiredTiger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_config: Option<WiredTigerCollectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_config: Option<WiredTigerEngineConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_config: Option<WiredTigerIndexConfig>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WiredTigerCollectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_compressor: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WiredTigerEngineConfig {
    #[serde(default)]
    pub directory_for_indexes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_compressor: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WiredTigerIndexConfig {
    #[serde(default)]
    pub prefix_compression: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShardingSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configsvr_repl_set: Option<ReplsetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongos: Option<ReplsetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_profiling: Option<OperationProfiling>,
}

/// A replica set, config server set or mongos tier
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplsetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub size: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbiter: Option<Arbiter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_spec: Option<VolumeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_disruption_budget: Option<PodDisruptionBudgetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<PodAffinity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose: Option<Expose>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Arbiter {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub size: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<PodAffinity>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expose {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_type: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerconaServerMongoDBStatus {
    /// Overall cluster state
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ClusterCondition>,
    /// Member status keyed by replica set name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replsets: BTreeMap<String, ReplsetStatus>,
    #[serde(default)]
    pub host: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplsetStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PerconaServerMongoDBStatus {
    /// `message`, or the message of the last condition when it is empty
    pub fn effective_message(&self) -> String {
        if !self.message.is_empty() {
            return self.message.clone();
        }
        self.conditions
            .last()
            .and_then(|condition| condition.message.clone())
            .unwrap_or_default()
    }
}
