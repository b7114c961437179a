//! Database engine abstraction
//!
//! [`EngineKind`] carries the naming facts of each Percona operator.
//! [`DatabaseEngine`] is implemented once per engine and plugs the engine's
//! manifest builder and status reading into the generic cluster operations.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::Secret;
use kube::api::DynamicObject;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::controller::environment::Exposure;
use crate::controller::error::{Error, Result};
use crate::controller::model::{
    ClusterParams, ClusterRecord, Credentials, PsmdbWorkloads, XtraDbWorkloads,
};
use crate::resources::{psmdb, pxc, secret};
use crate::store::ResourceKind;

/// The two supported database engines
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Percona XtraDB Cluster
    Xtradb,
    /// Percona Server for MongoDB
    Psmdb,
}

impl EngineKind {
    pub const ALL: [EngineKind; 2] = [EngineKind::Xtradb, EngineKind::Psmdb];

    /// Lowercase identifier used in routes, metrics and logs
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Xtradb => "xtradb",
            EngineKind::Psmdb => "psmdb",
        }
    }

    pub fn api_group(self) -> &'static str {
        match self {
            EngineKind::Xtradb => "pxc.percona.com",
            EngineKind::Psmdb => "psmdb.percona.com",
        }
    }

    /// Custom resource kind managed by the engine's operator
    pub fn kind(self) -> &'static str {
        match self {
            EngineKind::Xtradb => "PerconaXtraDBCluster",
            EngineKind::Psmdb => "PerconaServerMongoDB",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            EngineKind::Xtradb => "perconaxtradbclusters",
            EngineKind::Psmdb => "perconaservermongodbs",
        }
    }

    /// Operator deployment name, also the `managed-by` label of its pods
    pub fn operator_name(self) -> &'static str {
        match self {
            EngineKind::Xtradb => "percona-xtradb-cluster-operator",
            EngineKind::Psmdb => "percona-server-mongodb-operator",
        }
    }

    /// Template secret copied into every new cluster's secret
    pub fn default_secret(self) -> &'static str {
        match self {
            EngineKind::Xtradb => "my-cluster-secrets",
            EngineKind::Psmdb => "my-cluster-name-secrets",
        }
    }

    /// Secret key holding the generated administrator password
    pub fn password_key(self) -> &'static str {
        match self {
            EngineKind::Xtradb => "root",
            EngineKind::Psmdb => "MONGODB_USER_ADMIN_PASSWORD",
        }
    }

    /// Name of the secret owned by cluster `name`
    pub fn secret_name(self, name: &str) -> String {
        match self {
            EngineKind::Xtradb => format!("dbaas-{name}-pxc-secrets"),
            EngineKind::Psmdb => format!("dbaas-{name}-psmdb-secrets"),
        }
    }

    /// Full API version of the custom resource served by operator `version`
    ///
    /// Operator 1.6.0 serves `pxc.percona.com/v1-6-0`.
    pub fn api_version(self, version: &str) -> String {
        format!("{}/{}", self.api_group(), version_slug(version))
    }

    pub fn resource_kind(self, version: &str) -> ResourceKind {
        ResourceKind::custom(
            self.api_group(),
            &version_slug(version),
            self.kind(),
            self.plural(),
        )
    }
}

fn version_slug(version: &str) -> String {
    format!("v{}", version.replace('.', "-"))
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Xtradb => f.write_str("XtraDB"),
            EngineKind::Psmdb => f.write_str("PSMDB"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xtradb" | "pxc" => Ok(EngineKind::Xtradb),
            "psmdb" | "mongodb" => Ok(EngineKind::Psmdb),
            other => Err(Error::InvalidParams(format!("unknown engine {other:?}"))),
        }
    }
}

/// Inputs of a cluster manifest besides the caller's parameters
#[derive(Clone, Debug)]
pub struct BuildContext {
    pub secret_name: String,
    /// Custom resource API version, e.g. `pxc.percona.com/v1-6-0`
    pub api_version: String,
    pub cr_version: String,
    pub exposure: Exposure,
}

/// A cluster record together with the raw facts it was derived from
#[derive(Clone, Debug, PartialEq)]
pub struct Observed<W> {
    pub record: ClusterRecord<W>,
    /// Operator status string before normalization
    pub raw_state: String,
    /// Connection endpoint reported by the operator
    pub host: String,
}

/// Engine specific behavior of the cluster operations
pub trait DatabaseEngine: Send + Sync + 'static {
    const KIND: EngineKind;

    /// Per-tier parameters and snapshots
    type Workloads: Clone
        + fmt::Debug
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Reject parameters that cannot produce a complete manifest
    fn validate_create(params: &ClusterParams<Self::Workloads>) -> Result<()>;

    /// Build the complete custom resource for a new cluster
    fn build(params: &ClusterParams<Self::Workloads>, ctx: &BuildContext)
    -> Result<DynamicObject>;

    /// Apply an update request to the live document in place
    fn merge_update(document: &mut Value, params: &ClusterParams<Self::Workloads>) -> Result<()>;

    /// Read the canonical record out of a live custom resource
    fn observe(object: &DynamicObject) -> Result<Observed<Self::Workloads>>;

    /// Assemble credentials; `secret` is only present when they may be exposed
    fn credentials(host: String, secret: Option<&Secret>) -> Credentials;

    /// StatefulSets restarted, in order, by a cluster restart
    fn restart_targets(name: &str) -> Vec<String>;

    /// Workload snapshot reported for a cluster that is being deleted
    fn deleting_workloads() -> Self::Workloads;
}

/// Percona XtraDB Cluster
#[derive(Clone, Copy, Debug, Default)]
pub struct Xtradb;

impl DatabaseEngine for Xtradb {
    const KIND: EngineKind = EngineKind::Xtradb;
    type Workloads = XtraDbWorkloads;

    fn validate_create(params: &ClusterParams<XtraDbWorkloads>) -> Result<()> {
        if params.workloads.pxc.is_none() {
            return Err(Error::InvalidParams("pxc workload is required".to_string()));
        }
        if params.workloads.proxysql.is_none() {
            return Err(Error::InvalidParams(
                "proxysql workload is required".to_string(),
            ));
        }
        Ok(())
    }

    fn build(params: &ClusterParams<XtraDbWorkloads>, ctx: &BuildContext) -> Result<DynamicObject> {
        pxc::generate_cluster(params, ctx)
    }

    fn merge_update(document: &mut Value, params: &ClusterParams<XtraDbWorkloads>) -> Result<()> {
        pxc::merge_update(document, params)
    }

    fn observe(object: &DynamicObject) -> Result<Observed<XtraDbWorkloads>> {
        pxc::observe(object)
    }

    fn credentials(host: String, secret: Option<&Secret>) -> Credentials {
        Credentials {
            username: "root".to_string(),
            password: secret
                .map(|s| secret::string_value(s, Self::KIND.password_key()))
                .unwrap_or_default(),
            host,
            port: 3306,
            replicaset: None,
        }
    }

    fn restart_targets(name: &str) -> Vec<String> {
        vec![format!("{name}-pxc"), format!("{name}-proxysql")]
    }

    fn deleting_workloads() -> XtraDbWorkloads {
        XtraDbWorkloads {
            pxc: Some(Default::default()),
            proxysql: Some(Default::default()),
        }
    }
}

/// Percona Server for MongoDB
#[derive(Clone, Copy, Debug, Default)]
pub struct Psmdb;

/// Replica set every PSMDB cluster is created with
pub const PSMDB_REPLSET: &str = "rs0";

/// Secret key holding the PSMDB administrator user name
pub const PSMDB_USER_KEY: &str = "MONGODB_USER_ADMIN_USER";

impl DatabaseEngine for Psmdb {
    const KIND: EngineKind = EngineKind::Psmdb;
    type Workloads = PsmdbWorkloads;

    fn validate_create(params: &ClusterParams<PsmdbWorkloads>) -> Result<()> {
        if params.workloads.replicaset.is_none() {
            return Err(Error::InvalidParams(
                "replicaset workload is required".to_string(),
            ));
        }
        Ok(())
    }

    fn build(params: &ClusterParams<PsmdbWorkloads>, ctx: &BuildContext) -> Result<DynamicObject> {
        psmdb::generate_cluster(params, ctx)
    }

    fn merge_update(document: &mut Value, params: &ClusterParams<PsmdbWorkloads>) -> Result<()> {
        psmdb::merge_update(document, params)
    }

    fn observe(object: &DynamicObject) -> Result<Observed<PsmdbWorkloads>> {
        psmdb::observe(object)
    }

    fn credentials(host: String, secret: Option<&Secret>) -> Credentials {
        let (username, password) = secret
            .map(|s| {
                (
                    secret::string_value(s, PSMDB_USER_KEY),
                    secret::string_value(s, Self::KIND.password_key()),
                )
            })
            .unwrap_or_default();
        Credentials {
            username,
            password,
            host,
            port: 27017,
            replicaset: Some(PSMDB_REPLSET.to_string()),
        }
    }

    fn restart_targets(name: &str) -> Vec<String> {
        vec![format!("{name}-{PSMDB_REPLSET}")]
    }

    fn deleting_workloads() -> PsmdbWorkloads {
        PsmdbWorkloads {
            replicaset: Some(Default::default()),
        }
    }
}
