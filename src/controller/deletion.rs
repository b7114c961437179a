//! Tracking of clusters that are being deleted
//!
//! Once a cluster's custom resource is deleted the operator tears its pods
//! down asynchronously. Until the last pod is gone the cluster is still
//! reported, in the `Deleting` state, so callers do not reuse the name early.

use std::collections::HashSet;

use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::controller::engine::EngineKind;
use crate::controller::error::{Result, StoreResultExt};
use crate::resources::{INSTANCE_LABEL, MANAGED_BY_LABEL};
use crate::store::{ResourceKind, ResourceStore, from_object};

/// Names of clusters that still have pods but no live custom resource.
///
/// Only pods labelled as managed by `operator` are considered; pods without
/// an instance label are skipped. Each name appears once, in the order its
/// first pod was seen.
pub fn deleting_clusters<'a, I>(pods: I, operator: &str, live: &HashSet<&str>) -> Vec<String>
where
    I: IntoIterator<Item = &'a Pod>,
{
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for pod in pods {
        let Some(labels) = pod.metadata.labels.as_ref() else {
            continue;
        };
        if labels.get(MANAGED_BY_LABEL).map(String::as_str) != Some(operator) {
            continue;
        }
        let Some(instance) = labels.get(INSTANCE_LABEL) else {
            continue;
        };
        if live.contains(instance.as_str()) || !seen.insert(instance.as_str()) {
            continue;
        }
        names.push(instance.clone());
    }
    names
}

/// List pods and return the clusters of `engine` that are still being torn down
pub async fn find_deleting<S>(
    store: &S,
    engine: EngineKind,
    live: &HashSet<&str>,
    cancel: &CancellationToken,
) -> Result<Vec<String>>
where
    S: ResourceStore + ?Sized,
{
    let objects = store
        .list(&ResourceKind::pod(), cancel)
        .await
        .context("couldn't get kubernetes pods")?;

    let pods: Vec<Pod> = objects.iter().filter_map(decode_pod).collect();
    let names = deleting_clusters(&pods, engine.operator_name(), live);
    if !names.is_empty() {
        debug!(engine = %engine, clusters = ?names, "found clusters being deleted");
    }
    Ok(names)
}

fn decode_pod(object: &DynamicObject) -> Option<Pod> {
    match from_object::<Pod>(object) {
        Ok(pod) => Some(pod),
        Err(e) => {
            warn!(
                pod = object.metadata.name.as_deref().unwrap_or_default(),
                error = %e,
                "skipping undecodable pod"
            );
            None
        }
    }
}
