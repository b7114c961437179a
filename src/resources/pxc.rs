//! PerconaXtraDBCluster manifest generation
//!
//! New clusters get a complete document built from typed structs. Updates
//! never regenerate: they edit the live JSON so fields set by the operator or
//! by other clients survive.

use std::collections::BTreeMap;

use kube::api::DynamicObject;
use kube::core::ObjectMeta;
use serde_json::Value;

use crate::controller::engine::{BuildContext, EngineKind, Observed};
use crate::controller::environment::Exposure;
use crate::controller::error::Result;
use crate::controller::model::{ClusterParams, ClusterRecord, Workload, XtraDbWorkloads};
use crate::controller::state::{ClusterState, xtradb_state};
use crate::crd::common::{
    AFFINITY_OFF, PmmSpec, PodAffinity, PodDisruptionBudgetSpec, SERVICE_TYPE_LOAD_BALANCER,
    VolumeSpec, compute_snapshot, disk_size, limits, requests,
};
use crate::crd::pxc::{
    BackupSchedule, BackupSpec, BackupStorageSpec, BackupStorageType, PerconaXtraDBCluster,
    PerconaXtraDBClusterSpec, PodSpec,
};
use crate::resources::common::{
    DELETING_STATE, PMM_CLIENT_IMAGE, PMM_CPU_REQUEST, PMM_MEMORY_REQUEST, is_terminating,
    merge_limits, merge_pause, object_at, standard_labels,
};
use crate::store::{from_object, to_object};

pub const PXC_IMAGE: &str = "percona/percona-xtradb-cluster:8.0.20-11.1";
pub const PROXYSQL_IMAGE: &str = "percona/percona-xtradb-cluster-operator:1.6.0-proxysql";
pub const BACKUP_IMAGE: &str = "percona/percona-xtradb-cluster-operator:1.6.0-pxc8.0-backup";

/// Scheduled backup cadence and retention
pub const BACKUP_SCHEDULE: &str = "*/30 * * * *";
pub const BACKUP_KEEP: i32 = 3;

/// User the monitoring client registers with
const PMM_SERVER_USER: &str = "admin";

/// Name of the filesystem backup storage of cluster `name`
pub fn backup_storage_name(name: &str) -> String {
    format!("pxc-backup-storage-{name}")
}

/// Generate the PerconaXtraDBCluster for a new cluster
pub fn generate_cluster(
    params: &ClusterParams<XtraDbWorkloads>,
    ctx: &BuildContext,
) -> Result<DynamicObject> {
    let pxc = params.workloads.pxc.clone().unwrap_or_default();
    let proxysql = params.workloads.proxysql.clone().unwrap_or_default();
    let storage_name = backup_storage_name(&params.name);

    let cluster = PerconaXtraDBCluster {
        api_version: ctx.api_version.clone(),
        kind: EngineKind::Xtradb.kind().to_string(),
        metadata: ObjectMeta {
            name: Some(params.name.clone()),
            labels: Some(standard_labels(&params.name)),
            ..Default::default()
        },
        spec: PerconaXtraDBClusterSpec {
            cr_version: Some(ctx.cr_version.clone()),
            pause: false,
            secrets_name: Some(ctx.secret_name.clone()),
            allow_unsafe_configurations: true,
            pxc: Some(PodSpec {
                size: Some(params.size),
                image: Some(PXC_IMAGE.to_string()),
                resources: pxc.compute.as_ref().map(limits),
                volume_spec: Some(VolumeSpec::with_storage(&pxc.disk_size)),
                affinity: Some(PodAffinity::topology_key(AFFINITY_OFF)),
                pod_disruption_budget: Some(PodDisruptionBudgetSpec::max_unavailable(1)),
                ..Default::default()
            }),
            proxysql: Some(PodSpec {
                enabled: true,
                size: Some(params.size),
                image: Some(PROXYSQL_IMAGE.to_string()),
                resources: proxysql.compute.as_ref().map(limits),
                volume_spec: Some(VolumeSpec::with_storage(&proxysql.disk_size)),
                affinity: Some(PodAffinity::topology_key(AFFINITY_OFF)),
                service_type: match ctx.exposure {
                    Exposure::LoadBalancer => Some(SERVICE_TYPE_LOAD_BALANCER.to_string()),
                    Exposure::Internal => None,
                },
                ..Default::default()
            }),
            pmm: Some(PmmSpec {
                enabled: params.pmm_address().is_some(),
                server_host: params.pmm_address().map(str::to_string),
                server_user: Some(PMM_SERVER_USER.to_string()),
                image: Some(PMM_CLIENT_IMAGE.to_string()),
                resources: Some(requests(PMM_CPU_REQUEST, PMM_MEMORY_REQUEST)),
            }),
            backup: Some(BackupSpec {
                image: Some(BACKUP_IMAGE.to_string()),
                schedule: vec![BackupSchedule {
                    name: "test".to_string(),
                    schedule: BACKUP_SCHEDULE.to_string(),
                    keep: BACKUP_KEEP,
                    storage_name: storage_name.clone(),
                }],
                storages: BTreeMap::from([(
                    storage_name,
                    BackupStorageSpec {
                        type_: BackupStorageType::Filesystem,
                        volume: Some(VolumeSpec::with_storage(&pxc.disk_size)),
                    },
                )]),
                service_account_name: Some(EngineKind::Xtradb.operator_name().to_string()),
            }),
        },
        status: None,
    };

    Ok(to_object(&cluster)?)
}

/// Apply an update request to a live PerconaXtraDBCluster document
pub fn merge_update(document: &mut Value, params: &ClusterParams<XtraDbWorkloads>) -> Result<()> {
    merge_pause(document, params.resume, params.suspend)?;

    if params.size > 0 {
        for tier in ["pxc", "proxysql"] {
            object_at(document, &["spec", tier])?
                .insert("size".to_string(), Value::from(params.size));
        }
    }

    let tiers = [
        ("pxc", params.workloads.pxc.as_ref()),
        ("proxysql", params.workloads.proxysql.as_ref()),
    ];
    for (tier, workload) in tiers {
        if let Some(compute) = workload.and_then(|w| w.compute.as_ref()) {
            let spec = object_at(document, &["spec"])?;
            merge_limits(spec.entry(tier).or_insert(Value::Null), compute)?;
        }
    }
    Ok(())
}

/// Read the canonical record of a live PerconaXtraDBCluster.
///
/// A cluster whose deletion has begun is `Deleting` whatever the operator
/// still reports.
pub fn observe(object: &DynamicObject) -> Result<Observed<XtraDbWorkloads>> {
    let cluster: PerconaXtraDBCluster = from_object(object)?;
    let terminating = is_terminating(&cluster.metadata);
    let mut status = cluster.status.unwrap_or_default();
    let spec = cluster.spec;
    let state = if terminating {
        status.state = DELETING_STATE.to_string();
        ClusterState::Deleting
    } else {
        xtradb_state(&status.state)
    };

    let size = spec
        .proxysql
        .as_ref()
        .and_then(|tier| tier.size)
        .or_else(|| spec.pxc.as_ref().and_then(|tier| tier.size))
        .unwrap_or_default();

    let record = ClusterRecord {
        name: cluster.metadata.name.unwrap_or_default(),
        size,
        state,
        message: status.messages.join(";"),
        pause: spec.pause,
        workloads: XtraDbWorkloads {
            pxc: Some(workload_snapshot(spec.pxc.as_ref())),
            proxysql: Some(workload_snapshot(spec.proxysql.as_ref())),
        },
    };

    Ok(Observed {
        record,
        raw_state: status.state,
        host: status.host,
    })
}

fn workload_snapshot(tier: Option<&PodSpec>) -> Workload {
    Workload {
        compute: compute_snapshot(tier.and_then(|t| t.resources.as_ref())),
        disk_size: disk_size(tier.and_then(|t| t.volume_spec.as_ref())),
    }
}
