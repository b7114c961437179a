// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for state mapping, validation and manifest generation
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. Operator states always map onto a canonical state, never panic
//! 2. PSMDB error reduction always yields the worst member state
//! 3. Validation is deterministic and agrees with the naming rules
//! 4. Generated passwords and deleting-cluster lists keep their invariants
//! 5. Updates only touch what the request asks for

use std::collections::{BTreeMap, HashSet};

use k8s_openapi::api::core::v1::Pod;
use kube::core::ObjectMeta;
use proptest::prelude::*;

use dbaas_controller::controller::deletion::deleting_clusters;
use dbaas_controller::controller::engine::BuildContext;
use dbaas_controller::controller::environment::Exposure;
use dbaas_controller::controller::state::{psmdb_state, xtradb_state};
use dbaas_controller::controller::validation::{validate_name, validate_version};
use dbaas_controller::controller::{
    ClusterParams, ClusterState, ComputeResources, EngineKind, Workload, XtraDbWorkloads,
};
use dbaas_controller::resources::secret::PASSWORD_ALPHABET;
use dbaas_controller::resources::{
    INSTANCE_LABEL, MANAGED_BY_LABEL, PasswordGenerator, TimeSeededGenerator, pxc,
};
use dbaas_controller::store::object_to_value;

// =============================================================================
// Strategies
// =============================================================================

const PSMDB_RAW_STATES: &[&str] = &[
    "unknown",
    "pending",
    "initializing",
    "ready",
    "error",
    "paused",
    "stopping",
];

fn psmdb_member_state() -> impl Strategy<Value = &'static str> {
    prop::sample::select(PSMDB_RAW_STATES)
}

/// Canonical state of a known PSMDB member status
fn expected_member_state(raw: &str) -> ClusterState {
    match raw {
        "unknown" => ClusterState::Invalid,
        "ready" => ClusterState::Ready,
        "error" => ClusterState::Failed,
        "paused" => ClusterState::Paused,
        _ => ClusterState::Changing,
    }
}

/// Strings no operator reports
fn unknown_state() -> impl Strategy<Value = String> {
    "[a-z]{1,12}".prop_filter("must not be a known state", |s| {
        !PSMDB_RAW_STATES.contains(&s.as_str())
    })
}

/// DNS-1123 labels
fn valid_name() -> impl Strategy<Value = String> {
    "[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?"
}

fn valid_version() -> impl Strategy<Value = String> {
    (0u32..100, 0u32..100, 0u32..100).prop_map(|(major, minor, patch)| {
        format!("{major}.{minor}.{patch}")
    })
}

/// Pods as `(managed_by, instance)` label pairs
fn pods() -> impl Strategy<Value = Vec<(Option<String>, Option<String>)>> {
    prop::collection::vec(
        (
            prop::option::of(prop::sample::select(vec![
                EngineKind::Xtradb.operator_name().to_string(),
                EngineKind::Psmdb.operator_name().to_string(),
            ])),
            prop::option::of("[a-e]"),
        ),
        0..30,
    )
}

fn pod(managed_by: Option<&str>, instance: Option<&str>) -> Pod {
    let mut labels = BTreeMap::new();
    if let Some(operator) = managed_by {
        labels.insert(MANAGED_BY_LABEL.to_string(), operator.to_string());
    }
    if let Some(instance) = instance {
        labels.insert(INSTANCE_LABEL.to_string(), instance.to_string());
    }
    Pod {
        metadata: ObjectMeta {
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn xtradb_document(size: i32) -> serde_json::Value {
    let params = ClusterParams::new("orders", size).with_workloads(XtraDbWorkloads {
        pxc: Some(Workload::new(Some(ComputeResources::new("1", "2G")), "10Gi")),
        proxysql: Some(Workload::new(Some(ComputeResources::new("1", "1G")), "1Gi")),
    });
    let ctx = BuildContext {
        secret_name: EngineKind::Xtradb.secret_name("orders"),
        api_version: EngineKind::Xtradb.api_version("1.6.0"),
        cr_version: "1.7.0".to_string(),
        exposure: Exposure::Internal,
    };
    object_to_value(&pxc::generate_cluster(&params, &ctx).unwrap()).unwrap()
}

// =============================================================================
// State mapping
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: a top-level error reduces to the worst member state
    #[test]
    fn prop_psmdb_error_reduces_to_worst_member(
        members in prop::collection::vec(psmdb_member_state(), 1..8)
    ) {
        let state = psmdb_state("error", members.iter().copied());
        let worst = members
            .iter()
            .map(|m| expected_member_state(m))
            .fold(ClusterState::Failed, std::cmp::min);

        prop_assert_eq!(state, worst);
        prop_assert!(state <= ClusterState::Failed);
    }

    /// Property: members are ignored unless the top-level state is error
    #[test]
    fn prop_psmdb_members_ignored_without_error(
        raw in psmdb_member_state().prop_filter("not error", |s| *s != "error"),
        members in prop::collection::vec(psmdb_member_state(), 0..8),
    ) {
        prop_assert_eq!(
            psmdb_state(raw, members.iter().copied()),
            expected_member_state(raw)
        );
    }

    /// Property: unrecognised states are treated as a transition in progress
    #[test]
    fn prop_unknown_states_are_changing(raw in unknown_state()) {
        prop_assert_eq!(xtradb_state(&raw), ClusterState::Changing);
        prop_assert_eq!(psmdb_state(&raw, Vec::<&str>::new()), ClusterState::Changing);
    }

    /// Property: state mapping never panics on arbitrary input
    #[test]
    fn prop_state_mapping_never_panics(raw in ".*", members in prop::collection::vec(".*", 0..4)) {
        let state = xtradb_state(&raw);
        prop_assert!(ClusterState::ALL.contains(&state));
        let state = psmdb_state(&raw, members.iter().map(String::as_str));
        prop_assert!(ClusterState::ALL.contains(&state));
    }
}

// =============================================================================
// Validation
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: DNS-1123 labels are accepted
    #[test]
    fn prop_valid_names_pass(name in valid_name()) {
        prop_assert!(validate_name(&name).is_ok(), "{:?} should be valid", name);
    }

    /// Property: names with an uppercase letter are rejected
    #[test]
    fn prop_uppercase_names_rejected(
        prefix in "[a-z]{0,10}",
        upper in "[A-Z]",
        suffix in "[a-z]{0,10}",
    ) {
        let name = format!("{prefix}{upper}{suffix}");
        prop_assert!(validate_name(&name).is_err());
    }

    /// Property: validation is deterministic
    #[test]
    fn prop_validation_deterministic(name in ".{0,70}", version in ".{0,12}") {
        prop_assert_eq!(validate_name(&name).is_ok(), validate_name(&name).is_ok());
        prop_assert_eq!(validate_version(&version).is_ok(), validate_version(&version).is_ok());
    }

    /// Property: three numeric components are a valid version
    #[test]
    fn prop_semver_versions_pass(version in valid_version()) {
        prop_assert!(validate_version(&version).is_ok());
    }

    /// Property: a non-digit anywhere makes the version invalid
    #[test]
    fn prop_versions_with_letters_rejected(
        version in valid_version(),
        letter in "[a-zA-Z]",
        at in 0usize..8,
    ) {
        let mut chars: Vec<char> = version.chars().collect();
        let at = at.min(chars.len());
        chars.insert(at, letter.chars().next().unwrap());
        let version: String = chars.into_iter().collect();
        prop_assert!(validate_version(&version).is_err(), "{:?} should be invalid", version);
    }
}

// =============================================================================
// Passwords and deletion tracking
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: generated passwords have the requested length and alphabet
    #[test]
    fn prop_password_length_and_alphabet(len in 0usize..64) {
        let password = TimeSeededGenerator.generate(len);
        prop_assert_eq!(password.len(), len);
        prop_assert!(password.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));
    }

    /// Property: deleting clusters are unique, not live, and owned by the operator
    #[test]
    fn prop_deleting_clusters_invariants(
        pods in pods(),
        live in prop::collection::hash_set("[a-e]", 0..3),
    ) {
        let operator = EngineKind::Xtradb.operator_name();
        let objects: Vec<Pod> = pods
            .iter()
            .map(|(managed_by, instance)| pod(managed_by.as_deref(), instance.as_deref()))
            .collect();
        let live: HashSet<&str> = live.iter().map(String::as_str).collect();

        let names = deleting_clusters(&objects, operator, &live);

        let unique: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(unique.len(), names.len());
        for name in &names {
            prop_assert!(!live.contains(name.as_str()));
            let owned = pods.iter().any(|(managed_by, instance)| {
                managed_by.as_deref() == Some(operator)
                    && instance.as_deref() == Some(name.as_str())
            });
            prop_assert!(owned, "{:?} has no pod of {}", name, operator);
        }
    }
}

// =============================================================================
// Updates
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: a zero size leaves both tiers untouched, any other size sets both
    #[test]
    fn prop_update_size(initial in 1i32..10, requested in 0i32..10) {
        let mut document = xtradb_document(initial);
        let params: ClusterParams<XtraDbWorkloads> = ClusterParams::new("orders", requested);

        pxc::merge_update(&mut document, &params).unwrap();

        let expected = if requested == 0 { initial } else { requested };
        prop_assert_eq!(document["spec"]["pxc"]["size"].as_i64(), Some(i64::from(expected)));
        prop_assert_eq!(document["spec"]["proxysql"]["size"].as_i64(), Some(i64::from(expected)));
    }

    /// Property: an update without workloads keeps existing limits
    #[test]
    fn prop_update_without_workloads_keeps_limits(size in 0i32..10) {
        let mut document = xtradb_document(3);
        let before = document["spec"]["pxc"]["resources"].clone();

        pxc::merge_update(&mut document, &ClusterParams::new("orders", size)).unwrap();

        prop_assert_eq!(&document["spec"]["pxc"]["resources"], &before);
    }
}
