//! PerconaServerMongoDB manifest generation

use kube::api::DynamicObject;
use kube::core::ObjectMeta;
use serde_json::Value;

use crate::controller::engine::{BuildContext, EngineKind, Observed, PSMDB_REPLSET};
use crate::controller::environment::Exposure;
use crate::controller::error::{Error, Result};
use crate::controller::model::{ClusterParams, ClusterRecord, PsmdbWorkloads, Workload};
use crate::controller::state::{ClusterState, psmdb_state};
use crate::crd::common::{
    AFFINITY_OFF, PmmSpec, PodAffinity, PodDisruptionBudgetSpec, SERVICE_TYPE_LOAD_BALANCER,
    VolumeSpec, compute_snapshot, disk_size, limits, requests,
};
use crate::crd::psmdb::{
    Arbiter, BackupSpec, Expose, Mmapv1, MongodNet, MongodSecurity, MongodSpec, MongodStorage,
    OperationProfiling, PerconaServerMongoDB, PerconaServerMongoDBSpec, ReplsetSpec, SecretsSpec,
    ShardingSpec, WiredTiger, WiredTigerCollectionConfig, WiredTigerEngineConfig,
    WiredTigerIndexConfig,
};
use crate::resources::common::{
    DELETING_STATE, PMM_CLIENT_IMAGE, PMM_CPU_REQUEST, PMM_MEMORY_REQUEST, is_terminating,
    merge_limits, merge_pause, object_at, standard_labels,
};
use crate::store::{from_object, to_object};

pub const PSMDB_IMAGE: &str = "percona/percona-server-mongodb:4.2.8-8";
pub const BACKUP_IMAGE: &str = "percona/percona-server-mongodb-operator:1.5.0-backup";

pub const MONGOD_PORT: i32 = 27017;

/// Size of the config server replica set
pub const CONFIG_SERVER_SIZE: i32 = 3;

const ENCRYPTION_CIPHER_MODE: &str = "AES256-CBC";
const STORAGE_ENGINE: &str = "wiredTiger";
const COMPRESSOR: &str = "snappy";

/// Arbiter topology key when pods may be spread across nodes
const ARBITER_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

/// Secret holding the data-at-rest encryption key of cluster `name`
pub fn encryption_key_secret(name: &str) -> String {
    format!("{name}-mongodb-encryption-key")
}

/// Generate the PerconaServerMongoDB for a new cluster
pub fn generate_cluster(
    params: &ClusterParams<PsmdbWorkloads>,
    ctx: &BuildContext,
) -> Result<DynamicObject> {
    let replicaset = params.workloads.replicaset.clone().unwrap_or_default();
    let replicaset_limits = replicaset.compute.as_ref().map(limits);

    let (mongos_expose, arbiter_topology_key) = match ctx.exposure {
        Exposure::LoadBalancer => (
            Some(Expose {
                enabled: true,
                expose_type: Some(SERVICE_TYPE_LOAD_BALANCER.to_string()),
            }),
            ARBITER_TOPOLOGY_KEY,
        ),
        Exposure::Internal => (None, AFFINITY_OFF),
    };

    let cluster = PerconaServerMongoDB {
        api_version: ctx.api_version.clone(),
        kind: EngineKind::Psmdb.kind().to_string(),
        metadata: ObjectMeta {
            name: Some(params.name.clone()),
            labels: Some(standard_labels(&params.name)),
            ..Default::default()
        },
        spec: PerconaServerMongoDBSpec {
            pause: false,
            cr_version: Some(ctx.cr_version.clone()),
            image: Some(PSMDB_IMAGE.to_string()),
            secrets: Some(SecretsSpec {
                users: ctx.secret_name.clone(),
            }),
            mongod: Some(mongod_spec(&params.name)),
            sharding: Some(ShardingSpec {
                enabled: true,
                configsvr_repl_set: Some(ReplsetSpec {
                    size: CONFIG_SERVER_SIZE,
                    volume_spec: Some(VolumeSpec::with_storage(&replicaset.disk_size)),
                    ..Default::default()
                }),
                mongos: Some(ReplsetSpec {
                    size: params.size,
                    resources: replicaset_limits.clone(),
                    expose: mongos_expose,
                    ..Default::default()
                }),
                operation_profiling: Some(OperationProfiling::slow_op()),
            }),
            replsets: vec![ReplsetSpec {
                name: Some(PSMDB_REPLSET.to_string()),
                size: params.size,
                resources: replicaset_limits,
                arbiter: Some(Arbiter {
                    enabled: false,
                    size: 1,
                    affinity: Some(PodAffinity::topology_key(arbiter_topology_key)),
                }),
                volume_spec: Some(VolumeSpec::with_storage(&replicaset.disk_size)),
                pod_disruption_budget: Some(PodDisruptionBudgetSpec::max_unavailable(1)),
                affinity: Some(PodAffinity::topology_key(AFFINITY_OFF)),
                expose: None,
            }],
            pmm: Some(PmmSpec {
                enabled: params.pmm_address().is_some(),
                server_host: params.pmm_address().map(str::to_string),
                server_user: None,
                image: Some(PMM_CLIENT_IMAGE.to_string()),
                resources: Some(requests(PMM_CPU_REQUEST, PMM_MEMORY_REQUEST)),
            }),
            backup: Some(BackupSpec {
                enabled: true,
                image: Some(BACKUP_IMAGE.to_string()),
                service_account_name: Some(EngineKind::Psmdb.operator_name().to_string()),
            }),
        },
        status: None,
    };

    Ok(to_object(&cluster)?)
}

fn mongod_spec(name: &str) -> MongodSpec {
    MongodSpec {
        net: Some(MongodNet { port: MONGOD_PORT }),
        operation_profiling: Some(OperationProfiling::slow_op()),
        security: Some(MongodSecurity {
            redact_client_log_data: false,
            enable_encryption: Some(true),
            encryption_key_secret: Some(encryption_key_secret(name)),
            encryption_cipher_mode: Some(ENCRYPTION_CIPHER_MODE.to_string()),
        }),
        storage: Some(MongodStorage {
            engine: STORAGE_ENGINE.to_string(),
            mmapv1: Some(Mmapv1 {
                ns_size: 16,
                smallfiles: false,
            }),
            wired_tiger: Some(WiredTiger {
                collection_config: Some(WiredTigerCollectionConfig {
                    block_compressor: Some(COMPRESSOR.to_string()),
                }),
                engine_config: Some(WiredTigerEngineConfig {
                    directory_for_indexes: false,
                    journal_compressor: Some(COMPRESSOR.to_string()),
                }),
                index_config: Some(WiredTigerIndexConfig {
                    prefix_compression: true,
                }),
            }),
        }),
    }
}

/// First replica set of a live document
fn first_replset(document: &mut Value) -> Result<&mut Value> {
    object_at(document, &["spec"])?
        .get_mut("replsets")
        .and_then(Value::as_array_mut)
        .and_then(|replsets| replsets.first_mut())
        .ok_or_else(|| Error::InvalidManifest("cluster has no replica sets".to_string()))
}

/// Apply an update request to a live PerconaServerMongoDB document
pub fn merge_update(document: &mut Value, params: &ClusterParams<PsmdbWorkloads>) -> Result<()> {
    if params.size > 0 {
        object_at(first_replset(document)?, &[])?
            .insert("size".to_string(), Value::from(params.size));
    }

    merge_pause(document, params.resume, params.suspend)?;

    if let Some(compute) = params
        .workloads
        .replicaset
        .as_ref()
        .and_then(|w| w.compute.as_ref())
    {
        merge_limits(first_replset(document)?, compute)?;
    }
    Ok(())
}

/// Read the canonical record of a live PerconaServerMongoDB.
///
/// A cluster whose deletion has begun is `Deleting` whatever the operator
/// still reports.
pub fn observe(object: &DynamicObject) -> Result<Observed<PsmdbWorkloads>> {
    let cluster: PerconaServerMongoDB = from_object(object)?;
    let mut status = cluster.status.unwrap_or_default();
    let replset = cluster.spec.replsets.first();

    let state = if is_terminating(&cluster.metadata) {
        status.state = DELETING_STATE.to_string();
        ClusterState::Deleting
    } else {
        psmdb_state(
            &status.state,
            status.replsets.values().map(|member| member.status.as_str()),
        )
    };

    let record = ClusterRecord {
        name: cluster.metadata.name.unwrap_or_default(),
        size: replset.map(|r| r.size).unwrap_or_default(),
        state,
        message: status.effective_message(),
        pause: cluster.spec.pause,
        workloads: PsmdbWorkloads {
            replicaset: Some(Workload {
                compute: compute_snapshot(replset.and_then(|r| r.resources.as_ref())),
                disk_size: disk_size(replset.and_then(|r| r.volume_spec.as_ref())),
            }),
        },
    };

    Ok(Observed {
        record,
        raw_state: status.state,
        host: status.host,
    })
}
