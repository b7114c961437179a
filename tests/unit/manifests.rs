//! Tests for generated manifests as they reach the store

use std::sync::Arc;

use async_trait::async_trait;
use dbaas_controller::controller::environment::{
    Environment, EnvironmentProbe, StaticEnvironment, StorageClassProbe,
};
use dbaas_controller::controller::{
    Context, EngineKind, EngineSettings, Error, Psmdb, Result, Xtradb, create_cluster,
};
use dbaas_controller::store::{ResourceStore, object_to_value, to_object};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::core::ObjectMeta;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::common::*;

/// Probe whose answer is fixed by the test
struct ProbeResult(fn() -> Result<Environment>);

#[async_trait]
impl EnvironmentProbe for ProbeResult {
    async fn detect(&self, _cancel: &CancellationToken) -> Result<Environment> {
        (self.0)()
    }
}

fn context(store: Arc<FakeStore>, probe: Arc<dyn EnvironmentProbe>) -> Context {
    Context::new(
        store,
        Arc::new(FakeManifests::new()),
        probe,
        EngineSettings::new(PXC_OPERATOR_VERSION, PXC_CR_VERSION),
        EngineSettings::new(PSMDB_OPERATOR_VERSION, PSMDB_CR_VERSION),
    )
    .with_passwords(Arc::new(FixedPassword(TEST_PASSWORD)))
}

async fn created_xtradb(probe: Arc<dyn EnvironmentProbe>) -> Value {
    let store = Arc::new(FakeStore::new());
    store.insert(template_secret(EngineKind::Xtradb));
    let ctx = context(store.clone(), probe);

    create_cluster::<Xtradb>(&ctx, &xtradb_params("orders", 3), &CancellationToken::new())
        .await
        .unwrap();
    object_to_value(&store.object(PXC_KIND, "orders").unwrap()).unwrap()
}

async fn created_psmdb(probe: Arc<dyn EnvironmentProbe>) -> Value {
    let store = Arc::new(FakeStore::new());
    store.insert(template_secret(EngineKind::Psmdb));
    let ctx = context(store.clone(), probe);

    create_cluster::<Psmdb>(&ctx, &psmdb_params("inventory", 3), &CancellationToken::new())
        .await
        .unwrap();
    object_to_value(&store.object(PSMDB_KIND, "inventory").unwrap()).unwrap()
}

#[tokio::test]
async fn test_xtradb_production_uses_load_balancer() {
    let doc = created_xtradb(Arc::new(StaticEnvironment(Environment::Production))).await;

    assert_eq!(doc["spec"]["proxysql"]["serviceType"], "LoadBalancer");
}

#[tokio::test]
async fn test_xtradb_development_stays_internal() {
    let doc = created_xtradb(Arc::new(StaticEnvironment(Environment::Development))).await;

    assert!(doc["spec"]["proxysql"].get("serviceType").is_none());
}

#[tokio::test]
async fn test_psmdb_production_exposes_mongos() {
    let doc = created_psmdb(Arc::new(StaticEnvironment(Environment::Production))).await;
    let spec = &doc["spec"];

    assert_eq!(spec["sharding"]["mongos"]["expose"]["enabled"], true);
    assert_eq!(spec["sharding"]["mongos"]["expose"]["exposeType"], "LoadBalancer");
    assert_eq!(
        spec["replsets"][0]["arbiter"]["affinity"]["antiAffinityTopologyKey"],
        "kubernetes.io/hostname"
    );
}

#[tokio::test]
async fn test_psmdb_development_disables_anti_affinity() {
    let doc = created_psmdb(Arc::new(StaticEnvironment(Environment::Development))).await;
    let spec = &doc["spec"];

    assert!(spec["sharding"]["mongos"].get("expose").is_none());
    assert_eq!(
        spec["replsets"][0]["arbiter"]["affinity"]["antiAffinityTopologyKey"],
        "none"
    );
    assert_eq!(
        spec["mongod"]["security"]["encryptionKeySecret"],
        "inventory-mongodb-encryption-key"
    );
}

#[tokio::test]
async fn test_failed_detection_keeps_cluster_internal() {
    let probe = ProbeResult(|| Err(Error::Environment("no storage classes".to_string())));
    let doc = created_xtradb(Arc::new(probe)).await;

    assert!(doc["spec"]["proxysql"].get("serviceType").is_none());
}

#[tokio::test]
async fn test_cancelled_detection_aborts_create() {
    let store = Arc::new(FakeStore::new());
    store.insert(template_secret(EngineKind::Xtradb));
    let ctx = context(store.clone(), Arc::new(ProbeResult(|| Err(Error::Cancelled))));

    let err = create_cluster::<Xtradb>(&ctx, &xtradb_params("orders", 3), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(!store.contains("Secret", "dbaas-orders-pxc-secrets"));
    assert!(!store.contains(PXC_KIND, "orders"));
}

#[tokio::test]
async fn test_storage_class_probe_through_store() {
    let store = Arc::new(FakeStore::new());
    let class = StorageClass {
        metadata: ObjectMeta {
            name: Some("gp2".to_string()),
            ..Default::default()
        },
        provisioner: "kubernetes.io/aws-ebs".to_string(),
        ..Default::default()
    };
    store.insert(to_object(&class).unwrap());
    let probe = StorageClassProbe::new(store.clone() as Arc<dyn ResourceStore>);

    let environment = probe.detect(&CancellationToken::new()).await.unwrap();

    assert_eq!(environment, Environment::Production);
}

#[tokio::test]
async fn test_storage_class_probe_without_classes() {
    let store = Arc::new(FakeStore::new());
    let probe = StorageClassProbe::new(store as Arc<dyn ResourceStore>);

    let err = probe.detect(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::Environment(_)));
}
