//! Test fixtures for clusters, secrets, pods and contexts
//!
//! Cluster documents are produced by the real manifest builders and then
//! given the status an operator would report, so tests exercise the same
//! shapes the controller writes.
//!
//! ```rust,ignore
//! let store = Arc::new(FakeStore::new());
//! store.insert(xtradb_cluster("orders", "ready"));
//! let ctx = test_context(store.clone());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use dbaas_controller::controller::engine::{BuildContext, PSMDB_USER_KEY};
use dbaas_controller::controller::environment::{Environment, Exposure, StaticEnvironment};
use dbaas_controller::controller::{
    ClusterParams, ComputeResources, Context, EngineKind, EngineSettings, PsmdbWorkloads, Workload,
    XtraDbWorkloads,
};
use dbaas_controller::resources::{INSTANCE_LABEL, MANAGED_BY_LABEL, psmdb, pxc};
use dbaas_controller::store::{ResourceStore, object_to_value, to_object, value_to_object};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::DynamicObject;
use kube::core::ObjectMeta;
use serde_json::json;

pub const TEST_PASSWORD: &str = "Fixed-Test-Password-0123";
pub const PXC_OPERATOR_VERSION: &str = "1.6.0";
pub const PXC_CR_VERSION: &str = "1.7.0";
pub const PSMDB_OPERATOR_VERSION: &str = "1.6.0";
pub const PSMDB_CR_VERSION: &str = "1.6.0";

pub const PXC_KIND: &str = "PerconaXtraDBCluster";
pub const PSMDB_KIND: &str = "PerconaServerMongoDB";

/// Context over `store` with a fixed password and a development environment
pub fn test_context(store: Arc<dyn ResourceStore>) -> Context {
    test_context_with(store, Arc::new(super::FakeManifests::new()))
}

pub fn test_context_with(
    store: Arc<dyn ResourceStore>,
    manifests: Arc<super::FakeManifests>,
) -> Context {
    Context::new(
        store,
        manifests,
        Arc::new(StaticEnvironment(Environment::Development)),
        EngineSettings::new(PXC_OPERATOR_VERSION, PXC_CR_VERSION),
        EngineSettings::new(PSMDB_OPERATOR_VERSION, PSMDB_CR_VERSION),
    )
    .with_passwords(Arc::new(super::FixedPassword(TEST_PASSWORD)))
}

pub fn xtradb_params(name: &str, size: i32) -> ClusterParams<XtraDbWorkloads> {
    ClusterParams::new(name, size).with_workloads(XtraDbWorkloads {
        pxc: Some(Workload::new(
            Some(ComputeResources::new("1", "2G")),
            "10Gi",
        )),
        proxysql: Some(Workload::new(
            Some(ComputeResources::new("500m", "1G")),
            "1Gi",
        )),
    })
}

pub fn psmdb_params(name: &str, size: i32) -> ClusterParams<PsmdbWorkloads> {
    ClusterParams::new(name, size).with_workloads(PsmdbWorkloads {
        replicaset: Some(Workload::new(
            Some(ComputeResources::new("1", "2G")),
            "20Gi",
        )),
    })
}

fn build_context(engine: EngineKind, name: &str) -> BuildContext {
    let (operator_version, cr_version) = match engine {
        EngineKind::Xtradb => (PXC_OPERATOR_VERSION, PXC_CR_VERSION),
        EngineKind::Psmdb => (PSMDB_OPERATOR_VERSION, PSMDB_CR_VERSION),
    };
    BuildContext {
        secret_name: engine.secret_name(name),
        api_version: engine.api_version(operator_version),
        cr_version: cr_version.to_string(),
        exposure: Exposure::Internal,
    }
}

/// A PerconaXtraDBCluster the operator reports in `state`
pub fn xtradb_cluster(name: &str, state: &str) -> DynamicObject {
    let mut object = pxc::generate_cluster(
        &xtradb_params(name, 3),
        &build_context(EngineKind::Xtradb, name),
    )
    .unwrap();
    object.data["status"] = json!({
        "state": state,
        "host": format!("{name}-proxysql"),
        "message": [],
    });
    object
}

/// A PerconaServerMongoDB with overall `state` and replica set member statuses
pub fn psmdb_cluster(name: &str, state: &str, members: &[(&str, &str)]) -> DynamicObject {
    let mut object = psmdb::generate_cluster(
        &psmdb_params(name, 3),
        &build_context(EngineKind::Psmdb, name),
    )
    .unwrap();
    let replsets: serde_json::Map<String, serde_json::Value> = members
        .iter()
        .map(|(replset, status)| (replset.to_string(), json!({ "status": status })))
        .collect();
    object.data["status"] = json!({
        "state": state,
        "host": format!("{name}-mongos.default.svc.cluster.local"),
        "replsets": replsets,
    });
    object
}

/// `object` after its deletion was requested while finalizers still hold it
pub fn terminating(object: DynamicObject) -> DynamicObject {
    let mut doc = object_to_value(&object).unwrap();
    doc["metadata"]["deletionTimestamp"] = json!("2026-10-16T10:00:00Z");
    doc["metadata"]["finalizers"] = json!(["delete-pods-in-order"]);
    value_to_object(doc).unwrap()
}

fn secret(name: &str, data: &[(&str, &str)]) -> DynamicObject {
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    };
    to_object(&secret).unwrap()
}

/// The operator's default secret new cluster secrets are copied from
pub fn template_secret(engine: EngineKind) -> DynamicObject {
    match engine {
        EngineKind::Xtradb => secret(
            engine.default_secret(),
            &[
                ("root", "root_password"),
                ("xtrabackup", "backup_password"),
                ("monitor", "monitory"),
            ],
        ),
        EngineKind::Psmdb => secret(
            engine.default_secret(),
            &[
                (PSMDB_USER_KEY, "userAdmin"),
                ("MONGODB_USER_ADMIN_PASSWORD", "userAdmin123456"),
                ("MONGODB_CLUSTER_ADMIN_USER", "clusterAdmin"),
            ],
        ),
    }
}

/// The secret a created cluster owns, with the test password
pub fn cluster_secret(engine: EngineKind, name: &str) -> DynamicObject {
    match engine {
        EngineKind::Xtradb => secret(&engine.secret_name(name), &[("root", TEST_PASSWORD)]),
        EngineKind::Psmdb => secret(
            &engine.secret_name(name),
            &[
                (PSMDB_USER_KEY, "userAdmin"),
                ("MONGODB_USER_ADMIN_PASSWORD", TEST_PASSWORD),
            ],
        ),
    }
}

/// A pod labelled as belonging to cluster `instance` of `operator`
pub fn operator_pod(name: &str, operator: &str, instance: Option<&str>) -> DynamicObject {
    let mut labels = BTreeMap::from([(MANAGED_BY_LABEL.to_string(), operator.to_string())]);
    if let Some(instance) = instance {
        labels.insert(INSTANCE_LABEL.to_string(), instance.to_string());
    }
    let pod = Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    };
    to_object(&pod).unwrap()
}

/// A minimal operator bundle: the custom resource definition and the operator
pub fn operator_bundle(engine: EngineKind, version: &str) -> String {
    format!(
        r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: {plural}.{group}
spec:
  group: {group}
  names:
    kind: {kind}
    plural: {plural}
  scope: Namespaced
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {operator}
spec:
  replicas: 1
  template:
    spec:
      containers:
        - name: {operator}
          image: percona/{operator}:{version}
"#,
        plural = engine.plural(),
        group = engine.api_group(),
        kind = engine.kind(),
        operator = engine.operator_name(),
    )
}
