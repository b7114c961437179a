//! Tests for credential retrieval

use std::sync::Arc;

use dbaas_controller::controller::{
    ClusterState, EngineKind, Error, Psmdb, Xtradb, get_credentials, list_clusters,
};
use tokio_util::sync::CancellationToken;

use crate::common::*;

fn read_secret_calls(store: &FakeStore) -> usize {
    store
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Get { kind, .. } if kind == "Secret"))
        .count()
}

#[tokio::test]
async fn test_xtradb_credentials_of_ready_cluster() {
    let store = Arc::new(FakeStore::new());
    store.insert(xtradb_cluster("orders", "ready"));
    store.insert(cluster_secret(EngineKind::Xtradb, "orders"));
    let ctx = test_context(store.clone());

    let credentials = get_credentials::<Xtradb>(&ctx, "orders", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credentials.username, "root");
    assert_eq!(credentials.password, TEST_PASSWORD);
    assert_eq!(credentials.host, "orders-proxysql");
    assert_eq!(credentials.port, 3306);
    assert_eq!(credentials.replicaset, None);
}

#[tokio::test]
async fn test_psmdb_credentials_while_changing() {
    let store = Arc::new(FakeStore::new());
    store.insert(psmdb_cluster("inventory", "initializing", &[]));
    store.insert(cluster_secret(EngineKind::Psmdb, "inventory"));
    let ctx = test_context(store.clone());

    let credentials = get_credentials::<Psmdb>(&ctx, "inventory", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credentials.username, "userAdmin");
    assert_eq!(credentials.password, TEST_PASSWORD);
    assert_eq!(credentials.host, "inventory-mongos.default.svc.cluster.local");
    assert_eq!(credentials.port, 27017);
    assert_eq!(credentials.replicaset.as_deref(), Some("rs0"));
}

#[tokio::test]
async fn test_failed_cluster_hides_credentials() {
    let store = Arc::new(FakeStore::new());
    store.insert(xtradb_cluster("orders", "error"));
    store.insert(cluster_secret(EngineKind::Xtradb, "orders"));
    let ctx = test_context(store.clone());

    let credentials = get_credentials::<Xtradb>(&ctx, "orders", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credentials.password, "");
    assert_eq!(credentials.username, "root");
    assert_eq!(credentials.host, "orders-proxysql");
    assert_eq!(read_secret_calls(&store), 0);
}

#[tokio::test]
async fn test_deleting_cluster_has_empty_credentials() {
    let store = Arc::new(FakeStore::new());
    store.insert(operator_pod(
        "gone-pxc-0",
        EngineKind::Xtradb.operator_name(),
        Some("gone"),
    ));
    store.insert(cluster_secret(EngineKind::Xtradb, "gone"));
    let ctx = test_context(store.clone());
    let cancel = CancellationToken::new();

    let clusters = list_clusters::<Xtradb>(&ctx, &cancel).await.unwrap();
    assert_eq!(clusters[0].state, ClusterState::Deleting);

    let credentials = get_credentials::<Xtradb>(&ctx, "gone", &cancel)
        .await
        .unwrap();

    assert_eq!(credentials.password, "");
    assert_eq!(read_secret_calls(&store), 0);
}

#[tokio::test]
async fn test_terminating_cluster_hides_credentials() {
    let store = Arc::new(FakeStore::new());
    store.insert(terminating(xtradb_cluster("orders", "ready")));
    store.insert(cluster_secret(EngineKind::Xtradb, "orders"));
    let ctx = test_context(store.clone());

    let credentials = get_credentials::<Xtradb>(&ctx, "orders", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credentials.password, "");
    assert_eq!(read_secret_calls(&store), 0);
}

#[tokio::test]
async fn test_psmdb_credentials_hidden_when_paused() {
    let store = Arc::new(FakeStore::new());
    store.insert(psmdb_cluster("inventory", "paused", &[]));
    store.insert(cluster_secret(EngineKind::Psmdb, "inventory"));
    let ctx = test_context(store.clone());

    let credentials = get_credentials::<Psmdb>(&ctx, "inventory", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credentials.username, "");
    assert_eq!(credentials.password, "");
    assert_eq!(read_secret_calls(&store), 0);
}

#[tokio::test]
async fn test_psmdb_error_with_initializing_members_exposes_credentials() {
    let store = Arc::new(FakeStore::new());
    store.insert(psmdb_cluster("inventory", "error", &[("rs0", "initializing")]));
    store.insert(cluster_secret(EngineKind::Psmdb, "inventory"));
    let ctx = test_context(store.clone());

    let credentials = get_credentials::<Psmdb>(&ctx, "inventory", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(credentials.password, TEST_PASSWORD);
}

#[tokio::test]
async fn test_missing_secret_of_ready_cluster_is_an_error() {
    let store = Arc::new(FakeStore::new());
    store.insert(xtradb_cluster("orders", "ready"));
    let ctx = test_context(store.clone());

    let err = get_credentials::<Xtradb>(&ctx, "orders", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound { ref kind, .. } if kind == "Secret"), "{err}");
}

#[tokio::test]
async fn test_credentials_of_missing_cluster() {
    let store = Arc::new(FakeStore::new());
    let ctx = test_context(store.clone());

    let err = get_credentials::<Psmdb>(&ctx, "ghost", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
}
