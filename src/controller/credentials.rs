//! Cluster credentials
//!
//! Every cluster owns a secret copied from its engine's template secret,
//! with a freshly generated administrator password. Credentials are read
//! back only while the cluster is usable.

use std::collections::{BTreeMap, HashSet};

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::controller::context::Context;
use crate::controller::deletion::find_deleting;
use crate::controller::engine::DatabaseEngine;
use crate::controller::error::{Error, Result, StoreResultExt};
use crate::controller::model::Credentials;
use crate::controller::validation::validate_name;
use crate::resources::secret::{PASSWORD_LENGTH, credentials_data, generate_secret};
use crate::store::{ResourceKind, ResourceStore, from_object, to_object};

/// Create or replace an `Opaque` secret
pub async fn create_secret<S>(
    store: &S,
    name: &str,
    cluster_name: &str,
    data: BTreeMap<String, ByteString>,
    cancel: &CancellationToken,
) -> Result<()>
where
    S: ResourceStore + ?Sized,
{
    let secret = generate_secret(name, cluster_name, data);
    store
        .apply(&to_object(&secret)?, cancel)
        .await
        .with_context(|| format!("cannot create secret {name}"))?;
    debug!(secret = %name, "created secret");
    Ok(())
}

/// Read the engine's template secret.
///
/// Fails when the operator's default secret is missing; nothing is written
/// before this succeeds.
pub async fn template_secret<E: DatabaseEngine>(
    ctx: &Context,
    cancel: &CancellationToken,
) -> Result<Secret> {
    let name = E::KIND.default_secret();
    let object = ctx
        .store
        .get(&ResourceKind::secret(), name, cancel)
        .await
        .with_context(|| format!("cannot get default {} secrets", E::KIND))?;
    Ok(from_object(&object)?)
}

/// Write the secret of a new cluster from its template and return its name
#[instrument(skip(ctx, template, cancel), fields(engine = %E::KIND))]
pub async fn provision_secret<E: DatabaseEngine>(
    ctx: &Context,
    cluster_name: &str,
    template: &Secret,
    cancel: &CancellationToken,
) -> Result<String> {
    let secret_name = E::KIND.secret_name(cluster_name);
    let password = ctx.passwords.generate(PASSWORD_LENGTH);
    let data = credentials_data(template, E::KIND.password_key(), &password);

    create_secret(ctx.store.as_ref(), &secret_name, cluster_name, data, cancel).await?;
    info!(secret = %secret_name, "provisioned cluster secret");
    Ok(secret_name)
}

/// Connection credentials of cluster `name`.
///
/// The password is only read while the cluster is ready or changing;
/// otherwise it is returned empty without an error. A cluster whose custom
/// resource is gone but whose pods remain is being deleted and gets empty
/// credentials too.
#[instrument(skip(ctx, cancel), fields(engine = %E::KIND))]
pub async fn get_credentials<E: DatabaseEngine>(
    ctx: &Context,
    name: &str,
    cancel: &CancellationToken,
) -> Result<Credentials> {
    validate_name(name)?;

    let result = ctx
        .store
        .get(&ctx.cluster_kind(E::KIND), name, cancel)
        .await
        .with_context(|| format!("cannot get {} cluster", E::KIND));
    let object = match result {
        Ok(object) => object,
        Err(err @ Error::NotFound { .. }) => {
            let deleting =
                find_deleting(ctx.store.as_ref(), E::KIND, &HashSet::new(), cancel).await?;
            if deleting.iter().any(|deleting| deleting == name) {
                debug!(cluster = %name, "cluster is being deleted, no credentials");
                return Ok(E::credentials(String::new(), None));
            }
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    let observed = E::observe(&object)?;

    if !observed.record.state.exposes_credentials() {
        debug!(cluster = %name, state = %observed.record.state, "credentials not available yet");
        return Ok(E::credentials(observed.host, None));
    }

    let secret_object = ctx
        .store
        .get(&ResourceKind::secret(), &E::KIND.secret_name(name), cancel)
        .await
        .with_context(|| format!("cannot get {} cluster secrets", E::KIND))?;
    let secret: Secret = from_object(&secret_object)?;
    Ok(E::credentials(observed.host, Some(&secret)))
}
