//! [`ResourceStore`] backed by a kube-rs client

use std::future::Future;

use async_trait::async_trait;
use chrono::Utc;
use kube::Client;
use kube::api::{
    Api, DeleteParams, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams,
};
use kube::core::TypeMeta;
use kube::discovery::{self, Scope};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{FIELD_MANAGER, ResourceKind, ResourceStore, StoreCommand, StoreError};

/// Annotation `kubectl rollout restart` bumps to roll a pod template
const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Kubernetes API server as a resource store.
///
/// Namespaced kinds are read and written in `namespace` unless an applied
/// object names its own namespace.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    namespace: String,
}

impl KubeStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn api(&self, kind: &ResourceKind) -> Api<DynamicObject> {
        if kind.namespaced {
            Api::namespaced_with(self.client.clone(), &self.namespace, &kind.resource)
        } else {
            Api::all_with(self.client.clone(), &kind.resource)
        }
    }

    async fn api_versions(&self) -> Result<Vec<String>, kube::Error> {
        let core = self.client.list_core_api_versions().await?;
        let groups = self.client.list_api_groups().await?;

        let mut versions = core.versions;
        versions.extend(
            groups
                .groups
                .into_iter()
                .flat_map(|group| group.versions.into_iter().map(|v| v.group_version)),
        );
        Ok(versions)
    }
}

/// Race a kube request against the caller's cancellation token
async fn cancellable<T, F>(cancel: &CancellationToken, request: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, kube::Error>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StoreError::Cancelled),
        result = request => result.map_err(StoreError::from),
    }
}

/// List items come back without `apiVersion`/`kind`; fill them from the request
fn with_types(mut object: DynamicObject, kind: &ResourceKind) -> DynamicObject {
    if object.types.is_none() {
        object.types = Some(TypeMeta {
            api_version: kind.resource.api_version.clone(),
            kind: kind.resource.kind.clone(),
        });
    }
    object
}

fn is_status(err: &StoreError, code: u16) -> bool {
    matches!(err, StoreError::KubeError(kube::Error::Api(resp)) if resp.code == code)
}

fn group_version_kind(object: &DynamicObject) -> Result<GroupVersionKind, StoreError> {
    let types = object
        .types
        .as_ref()
        .ok_or_else(|| StoreError::InvalidObject("missing apiVersion/kind".to_string()))?;
    let (group, version) = match types.api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), types.api_version.clone()),
    };
    Ok(GroupVersionKind {
        group,
        version,
        kind: types.kind.clone(),
    })
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get(
        &self,
        kind: &ResourceKind,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<DynamicObject, StoreError> {
        let api = self.api(kind);
        let object = cancellable(cancel, api.get(name)).await.map_err(|e| {
            if is_status(&e, 404) {
                StoreError::NotFound {
                    kind: kind.kind().to_string(),
                    name: name.to_string(),
                }
            } else {
                e
            }
        })?;
        Ok(with_types(object, kind))
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        cancel: &CancellationToken,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let api = self.api(kind);
        let list = cancellable(cancel, api.list(&ListParams::default())).await?;
        Ok(list
            .items
            .into_iter()
            .map(|object| with_types(object, kind))
            .collect())
    }

    async fn apply(
        &self,
        object: &DynamicObject,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let gvk = group_version_kind(object)?;
        let name = object
            .metadata
            .name
            .clone()
            .ok_or_else(|| StoreError::InvalidObject(format!("{} without a name", gvk.kind)))?;

        let (resource, capabilities) =
            cancellable(cancel, discovery::pinned_kind(&self.client, &gvk)).await?;
        let api: Api<DynamicObject> = match capabilities.scope {
            Scope::Namespaced => {
                let ns = object
                    .metadata
                    .namespace
                    .as_deref()
                    .unwrap_or(&self.namespace);
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            Scope::Cluster => Api::all_with(self.client.clone(), &resource),
        };

        // Server-side apply rejects documents that carry managed fields
        let mut object = object.clone();
        object.metadata.managed_fields = None;

        let params = PatchParams::apply(FIELD_MANAGER).force();
        cancellable(cancel, api.patch(&name, &params, &Patch::Apply(&object)))
            .await
            .map_err(|e| {
                if is_status(&e, 409) {
                    StoreError::Conflict {
                        kind: gvk.kind.clone(),
                        name: name.clone(),
                    }
                } else {
                    e
                }
            })?;

        debug!(kind = %gvk.kind, name = %name, "applied resource");
        Ok(())
    }

    async fn delete(
        &self,
        kind: &ResourceKind,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let api = self.api(kind);
        match cancellable(cancel, api.delete(name, &DeleteParams::default())).await {
            Ok(_) => {
                debug!(kind = %kind.kind(), name = %name, "deleted resource");
                Ok(())
            }
            Err(e) if is_status(&e, 404) => {
                debug!(kind = %kind.kind(), name = %name, "resource already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn run(
        &self,
        command: &StoreCommand,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, StoreError> {
        match command {
            StoreCommand::ApiVersions => {
                let versions = cancellable(cancel, self.api_versions()).await?;
                Ok(versions.join("\n").into_bytes())
            }
            StoreCommand::RolloutRestart { kind, name } => {
                let resource_kind = kind.resource_kind();
                let api = self.api(&resource_kind);
                let patch = json!({
                    "spec": {
                        "template": {
                            "metadata": {
                                "annotations": {
                                    RESTARTED_AT_ANNOTATION: Utc::now().to_rfc3339()
                                }
                            }
                        }
                    }
                });
                cancellable(
                    cancel,
                    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)),
                )
                .await
                .map_err(|e| {
                    if is_status(&e, 404) {
                        StoreError::NotFound {
                            kind: resource_kind.kind().to_string(),
                            name: name.clone(),
                        }
                    } else {
                        e
                    }
                })?;
                info!(kind = ?kind, name = %name, "triggered rolling restart");
                Ok(Vec::new())
            }
        }
    }
}
