//! Common utilities for cluster manifest generation
//!
//! Shared constants and helpers used by both engine manifest builders and by
//! the update path, which edits live documents as JSON.

use std::collections::BTreeMap;

use kube::core::ObjectMeta;
use serde_json::{Map, Value};

use crate::controller::error::{Error, Result};
use crate::controller::model::ComputeResources;
use crate::store::FIELD_MANAGER;

/// Monitoring client image shared by both engines
pub const PMM_CLIENT_IMAGE: &str = "perconalab/pmm-client:dev-latest";

/// Fixed monitoring client requests
pub const PMM_CPU_REQUEST: &str = "500m";
pub const PMM_MEMORY_REQUEST: &str = "500M";

/// Label naming the cluster an operator-managed pod belongs to
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Label naming the operator that manages a pod
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Labels put on every resource the controller creates for a cluster
pub fn standard_labels(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (INSTANCE_LABEL.to_string(), cluster_name.to_string()),
        (MANAGED_BY_LABEL.to_string(), FIELD_MANAGER.to_string()),
    ])
}

/// Raw state reported for a custom resource that is being torn down
pub const DELETING_STATE: &str = "deleting";

/// Whether deletion of a resource has begun; finalizers may keep it around
pub fn is_terminating(metadata: &ObjectMeta) -> bool {
    metadata.deletion_timestamp.is_some()
}

/// Walk `path` from `value`, creating empty objects where keys are missing.
///
/// Fails when a step lands on something other than an object or null.
pub fn object_at<'a>(value: &'a mut Value, path: &[&str]) -> Result<&'a mut Map<String, Value>> {
    let mut current = value;
    for (depth, key) in path.iter().enumerate() {
        current = as_object(current, &path[..depth])?
            .entry(key.to_string())
            .or_insert(Value::Null);
    }
    as_object(current, path)
}

fn as_object<'a>(value: &'a mut Value, path: &[&str]) -> Result<&'a mut Map<String, Value>> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidManifest(format!(
            "expected an object at {:?}, found {other}",
            path.join(".")
        ))),
    }
}

/// Overwrite the non-empty limits of a tier, leaving everything else alone
pub fn merge_limits(tier: &mut Value, compute: &ComputeResources) -> Result<()> {
    let limits = object_at(tier, &["resources", "limits"])?;
    if !compute.cpu_m.is_empty() {
        limits.insert("cpu".to_string(), Value::String(compute.cpu_m.clone()));
    }
    if !compute.memory_bytes.is_empty() {
        limits.insert(
            "memory".to_string(),
            Value::String(compute.memory_bytes.clone()),
        );
    }
    Ok(())
}

/// Set `spec.pause` from an update request; resume applies before suspend
pub fn merge_pause(document: &mut Value, resume: bool, suspend: bool) -> Result<()> {
    let spec = object_at(document, &["spec"])?;
    if resume {
        spec.insert("pause".to_string(), Value::Bool(false));
    }
    if suspend {
        spec.insert("pause".to_string(), Value::Bool(true));
    }
    Ok(())
}
