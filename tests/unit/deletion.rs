//! Tests for tracking clusters whose pods outlive their custom resource

use std::collections::HashSet;
use std::sync::Arc;

use dbaas_controller::controller::deletion::find_deleting;
use dbaas_controller::controller::{ClusterState, EngineKind, Psmdb, list_clusters};
use tokio_util::sync::CancellationToken;

use crate::common::*;

#[tokio::test]
async fn test_find_deleting_filters_by_operator_and_live_names() {
    let store = FakeStore::new();
    let pxc_operator = EngineKind::Xtradb.operator_name();
    let psmdb_operator = EngineKind::Psmdb.operator_name();
    store.insert(operator_pod("a-pxc-0", pxc_operator, Some("a")));
    store.insert(operator_pod("b-pxc-0", pxc_operator, Some("b")));
    store.insert(operator_pod("b-pxc-1", pxc_operator, Some("b")));
    store.insert(operator_pod("c-rs0-0", psmdb_operator, Some("c")));
    store.insert(operator_pod("unlabelled", pxc_operator, None));
    store.insert(operator_pod("live-pxc-0", pxc_operator, Some("live")));

    let live = HashSet::from(["live"]);
    let names = find_deleting(&store, EngineKind::Xtradb, &live, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_only_pod_owners_without_live_clusters_are_deleting() {
    let store = FakeStore::new();
    let operator = EngineKind::Xtradb.operator_name();
    store.insert(operator_pod("a-pxc-0", operator, Some("a")));
    store.insert(operator_pod("c-pxc-0", operator, Some("c")));
    store.insert(operator_pod("c-pxc-1", operator, Some("c")));
    store.insert(operator_pod("d-pxc-0", operator, Some("d")));

    let live = HashSet::from(["a", "b"]);
    let names = find_deleting(&store, EngineKind::Xtradb, &live, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(names, vec!["c".to_string(), "d".to_string()]);
}

#[tokio::test]
async fn test_psmdb_deleting_records() {
    let store = Arc::new(FakeStore::new());
    let operator = EngineKind::Psmdb.operator_name();
    store.insert(operator_pod("gone-rs0-0", operator, Some("gone")));
    store.insert(operator_pod("gone-cfg-0", operator, Some("gone")));
    let ctx = test_context(store.clone());

    let clusters = list_clusters::<Psmdb>(&ctx, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(clusters.len(), 1);
    let gone = &clusters[0];
    assert_eq!(gone.name, "gone");
    assert_eq!(gone.state, ClusterState::Deleting);
    assert_eq!(gone.size, 0);
    let replicaset = gone.workloads.replicaset.as_ref().unwrap();
    assert_eq!(replicaset.disk_size, "");
    assert!(replicaset.compute.is_none());
}

#[tokio::test]
async fn test_no_pods_no_deleting_clusters() {
    let store = FakeStore::new();

    let names = find_deleting(
        &store,
        EngineKind::Psmdb,
        &HashSet::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(names.is_empty());
}
