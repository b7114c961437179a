//! Cluster lifecycle operations
//!
//! Every operation is generic over the [`DatabaseEngine`] and runs to
//! completion within one call: there is no background reconciliation, so
//! each function leaves the store in a state the next call can read back.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::controller::context::Context;
use crate::controller::credentials::{provision_secret, template_secret};
use crate::controller::deletion::find_deleting;
use crate::controller::engine::{BuildContext, DatabaseEngine, Observed};
use crate::controller::environment::resolve_exposure;
use crate::controller::error::{Error, Result, StoreResultExt};
use crate::controller::model::{ClusterParams, ClusterRecord};
use crate::controller::state::ClusterState;
use crate::controller::validation::{validate_create_size, validate_name, validate_update_size};
use crate::store::{ResourceKind, StoreCommand, WorkloadKind, object_to_value, value_to_object};

/// Reject mutation of a cluster that is not exactly `Ready`.
///
/// The error carries the operator's raw status so callers see what the
/// cluster is doing.
pub fn ensure_ready<E: DatabaseEngine>(observed: &Observed<E::Workloads>) -> Result<()> {
    if observed.record.state == ClusterState::Ready {
        return Ok(());
    }
    Err(Error::NotReady {
        engine: E::KIND,
        state: observed.raw_state.clone(),
    })
}

/// Every cluster of the engine, followed by the clusters still being deleted
#[instrument(skip(ctx, cancel), fields(engine = %E::KIND))]
pub async fn list_clusters<E: DatabaseEngine>(
    ctx: &Context,
    cancel: &CancellationToken,
) -> Result<Vec<ClusterRecord<E::Workloads>>> {
    let objects = ctx
        .store
        .list(&ctx.cluster_kind(E::KIND), cancel)
        .await
        .with_context(|| format!("cannot get {} clusters", E::KIND))?;

    let mut records = objects
        .iter()
        .map(|object| E::observe(object).map(|observed| observed.record))
        .collect::<Result<Vec<_>>>()?;

    let live: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
    let deleting = find_deleting(ctx.store.as_ref(), E::KIND, &live, cancel).await?;

    records.extend(
        deleting
            .into_iter()
            .map(|name| ClusterRecord::deleting(name, E::deleting_workloads())),
    );
    debug!(count = records.len(), "listed clusters");
    Ok(records)
}

/// Create a cluster and its secret.
///
/// The secret is written first. If the cluster itself cannot be applied the
/// secret is deleted again.
#[instrument(skip(ctx, params, cancel), fields(engine = %E::KIND, name = %params.name))]
pub async fn create_cluster<E: DatabaseEngine>(
    ctx: &Context,
    params: &ClusterParams<E::Workloads>,
    cancel: &CancellationToken,
) -> Result<()> {
    validate_name(&params.name)?;
    validate_create_size(params.size)?;
    E::validate_create(params)?;

    let template = template_secret::<E>(ctx, cancel).await?;
    let secret_name = provision_secret::<E>(ctx, &params.name, &template, cancel).await?;

    match apply_new_cluster::<E>(ctx, params, secret_name.clone(), cancel).await {
        Ok(()) => {
            info!("created cluster");
            Ok(())
        }
        Err(e) => {
            rollback_secret(ctx, &secret_name).await;
            Err(e)
        }
    }
}

async fn apply_new_cluster<E: DatabaseEngine>(
    ctx: &Context,
    params: &ClusterParams<E::Workloads>,
    secret_name: String,
    cancel: &CancellationToken,
) -> Result<()> {
    let exposure = resolve_exposure(ctx.environment.as_ref(), cancel).await?;
    let build = BuildContext {
        secret_name,
        api_version: ctx.api_version(E::KIND),
        cr_version: ctx.settings(E::KIND).cr_version.clone(),
        exposure,
    };
    let object = E::build(params, &build)?;
    ctx.store
        .apply(&object, cancel)
        .await
        .with_context(|| format!("cannot create {} cluster", E::KIND))
}

/// Delete a secret whose cluster never came into existence
async fn rollback_secret(ctx: &Context, secret_name: &str) {
    // The caller's token may be what failed the create
    let cancel = CancellationToken::new();
    match ctx
        .store
        .delete(&ResourceKind::secret(), secret_name, &cancel)
        .await
    {
        Ok(()) => warn!(secret = %secret_name, "removed secret of failed cluster create"),
        Err(e) => error!(
            secret = %secret_name,
            error = %e,
            "cannot remove secret of failed cluster create"
        ),
    }
}

/// Update pause state, size and compute limits of a ready cluster.
///
/// Only the fields the request addresses are changed. The write is
/// conditional on the version that was checked, so a concurrent update
/// fails with [`Error::Conflict`].
#[instrument(skip(ctx, params, cancel), fields(engine = %E::KIND, name = %params.name))]
pub async fn update_cluster<E: DatabaseEngine>(
    ctx: &Context,
    params: &ClusterParams<E::Workloads>,
    cancel: &CancellationToken,
) -> Result<()> {
    validate_name(&params.name)?;
    validate_update_size(params.size)?;

    let live = ctx
        .store
        .get(&ctx.cluster_kind(E::KIND), &params.name, cancel)
        .await
        .with_context(|| format!("cannot get {} cluster", E::KIND))?;
    ensure_ready::<E>(&E::observe(&live)?)?;

    let mut document = object_to_value(&live)?;
    E::merge_update(&mut document, params)?;
    let mut updated = value_to_object(document)?;
    // Status belongs to the operator
    if let Some(data) = updated.data.as_object_mut() {
        data.remove("status");
    }
    updated.metadata.managed_fields = None;

    ctx.store
        .apply(&updated, cancel)
        .await
        .with_context(|| format!("cannot update {} cluster", E::KIND))?;
    info!(size = params.size, suspend = params.suspend, resume = params.resume, "updated cluster");
    Ok(())
}

/// Delete a cluster, then its secret.
///
/// Failing to delete the secret is logged and does not fail the call.
#[instrument(skip(ctx, cancel), fields(engine = %E::KIND))]
pub async fn delete_cluster<E: DatabaseEngine>(
    ctx: &Context,
    name: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    validate_name(name)?;

    ctx.store
        .delete(&ctx.cluster_kind(E::KIND), name, cancel)
        .await
        .with_context(|| format!("cannot delete {}", E::KIND))?;

    let secret_name = E::KIND.secret_name(name);
    if let Err(e) = ctx
        .store
        .delete(&ResourceKind::secret(), &secret_name, cancel)
        .await
    {
        error!(cluster = %name, secret = %secret_name, error = %e, "cannot delete secret");
    }
    info!(cluster = %name, "deleted cluster");
    Ok(())
}

/// Trigger a rolling restart of every StatefulSet of a cluster, in order
#[instrument(skip(ctx, cancel), fields(engine = %E::KIND))]
pub async fn restart_cluster<E: DatabaseEngine>(
    ctx: &Context,
    name: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    validate_name(name)?;

    for target in E::restart_targets(name) {
        let command = StoreCommand::RolloutRestart {
            kind: WorkloadKind::StatefulSet,
            name: target.clone(),
        };
        ctx.store
            .run(&command, cancel)
            .await
            .with_context(|| format!("cannot restart {target}"))?;
    }
    info!(cluster = %name, "restarted cluster");
    Ok(())
}
