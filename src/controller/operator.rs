//! Operator installation and upgrade
//!
//! An operator release ships as one YAML bundle (CRDs, RBAC, deployment).
//! Installing applies the bundle. Upgrading additionally restarts the
//! operator and migrates every existing custom resource of the engine to the
//! new API version, one at a time, stopping at the first failure.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::controller::context::Context;
use crate::controller::engine::EngineKind;
use crate::controller::error::{Error, Result, StoreResultExt};
use crate::controller::model::{OperatorStatus, Operators};
use crate::controller::validation::validate_version;
use crate::store::{ResourceKind, StoreCommand, WorkloadKind, parse_bundle};

/// Served `group/version` strings of the API server
pub async fn api_versions(ctx: &Context, cancel: &CancellationToken) -> Result<Vec<String>> {
    let output = ctx
        .store
        .run(&StoreCommand::ApiVersions, cancel)
        .await
        .context("can't get api versions list")?;
    Ok(String::from_utf8_lossy(&output)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Status of an operator given the served API versions.
///
/// The exact expected version means supported; any version of the
/// operator's group means installed but unsupported.
pub fn operator_status(installed: &[String], expected_api_version: &str) -> OperatorStatus {
    let group = expected_api_version
        .split_once('/')
        .map(|(group, _)| group)
        .unwrap_or(expected_api_version);

    let mut found_group = false;
    for version in installed {
        if version == expected_api_version {
            return OperatorStatus::Ok;
        }
        if version_in_group(version, group).is_some() {
            found_group = true;
        }
    }
    if found_group {
        OperatorStatus::Unsupported
    } else {
        OperatorStatus::NotInstalled
    }
}

/// Version slug of `api_version` when it belongs to `group` exactly
fn version_in_group<'a>(api_version: &'a str, group: &str) -> Option<&'a str> {
    api_version.strip_prefix(group)?.strip_prefix('/')
}

/// Newest served API version of an engine's group, if any
fn installed_api_version(installed: &[String], engine: EngineKind) -> Option<String> {
    installed
        .iter()
        .filter_map(|version| {
            version_in_group(version, engine.api_group()).map(|slug| (version, version_key(slug)))
        })
        .max_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(version, _)| version.clone())
}

/// Sort key of an API version slug such as `v1-6-0`
fn version_key(slug: &str) -> Vec<u64> {
    slug.trim_start_matches('v')
        .split('-')
        .map(|part| part.parse().unwrap_or_default())
        .collect()
}

/// Check which operators are installed and whether their API is supported
#[instrument(skip(ctx, cancel))]
pub async fn check_operators(ctx: &Context, cancel: &CancellationToken) -> Result<Operators> {
    let installed = api_versions(ctx, cancel).await?;
    let operators = Operators {
        xtradb: operator_status(&installed, &ctx.api_version(EngineKind::Xtradb)),
        psmdb: operator_status(&installed, &ctx.api_version(EngineKind::Psmdb)),
    };
    debug!(xtradb = ?operators.xtradb, psmdb = ?operators.psmdb, "checked operators");
    Ok(operators)
}

/// Install `engine`'s operator at `version`, or upgrade it when present.
///
/// On upgrade every existing cluster is rewritten to the new API version
/// and `crVersion`. Clusters are patched sequentially; the first failure
/// aborts and leaves later clusters on their old version.
#[instrument(skip(ctx, cancel), fields(engine = %engine))]
pub async fn install_or_upgrade_operator(
    ctx: &Context,
    engine: EngineKind,
    version: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    validate_version(version)?;

    let installed = api_versions(ctx, cancel).await?;
    let status = operator_status(&installed, &ctx.api_version(engine));
    let current = installed_api_version(&installed, engine);

    apply_bundle(ctx, engine, version, cancel).await?;

    if !status.is_installed() {
        info!(version, "installed operator");
        return Ok(());
    }

    ctx.store
        .run(
            &StoreCommand::RolloutRestart {
                kind: WorkloadKind::Deployment,
                name: engine.operator_name().to_string(),
            },
            cancel,
        )
        .await
        .with_context(|| format!("cannot restart {} operator", engine))?;

    if let Some(current) = current {
        patch_all_clusters(ctx, engine, &current, version, cancel).await?;
    }
    info!(version, "upgraded operator");
    Ok(())
}

/// Fetch the operator bundle for `version` and apply every document in it
pub async fn apply_bundle(
    ctx: &Context,
    engine: EngineKind,
    version: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let bundle = ctx.manifests.fetch(engine, version, cancel).await?;
    let objects = parse_bundle(&bundle)?;
    if objects.is_empty() {
        return Err(Error::InvalidManifest(format!(
            "{engine} operator {version} bundle has no resources"
        )));
    }

    for object in &objects {
        let kind = object
            .types
            .as_ref()
            .map(|types| types.kind.as_str())
            .unwrap_or_default();
        let name = object.metadata.name.as_deref().unwrap_or_default();
        ctx.store
            .apply(object, cancel)
            .await
            .with_context(|| format!("cannot apply {kind} {name}"))?;
    }
    debug!(resources = objects.len(), version, "applied operator bundle");
    Ok(())
}

/// Rewrite every cluster of `engine` to the API version of `version`.
///
/// Clusters are listed through `current_api_version`, the version they
/// were stored with.
pub async fn patch_all_clusters(
    ctx: &Context,
    engine: EngineKind,
    current_api_version: &str,
    version: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let current_slug = current_api_version
        .split_once('/')
        .map(|(_, slug)| slug)
        .unwrap_or(current_api_version);
    let current_kind = ResourceKind::custom(
        engine.api_group(),
        current_slug,
        engine.kind(),
        engine.plural(),
    );
    let objects = ctx
        .store
        .list(&current_kind, cancel)
        .await
        .with_context(|| format!("cannot list {engine} clusters"))?;

    let target_api_version = engine.api_version(version);
    for mut object in objects {
        let name = object.metadata.name.clone().unwrap_or_default();
        if let Some(types) = object.types.as_mut() {
            types.api_version = target_api_version.clone();
        }
        if let Some(data) = object.data.as_object_mut() {
            data.remove("status");
        }
        if let Some(spec) = object.data.get_mut("spec").and_then(|s| s.as_object_mut()) {
            spec.insert("crVersion".to_string(), version.into());
        }
        object.metadata.managed_fields = None;
        object.metadata.resource_version = None;

        ctx.store
            .apply(&object, cancel)
            .await
            .with_context(|| format!("cannot patch {engine} cluster {name}"))?;
        info!(cluster = %name, api_version = %target_api_version, "migrated cluster");
    }
    Ok(())
}
