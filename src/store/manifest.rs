//! Operator manifest bundles
//!
//! Operators are installed and upgraded by applying the multi-document YAML
//! bundle each Percona operator release publishes. [`ManifestSource`] hides
//! where the bundle comes from; [`parse_bundle`] turns it into objects the
//! [`ResourceStore`](super::ResourceStore) can apply.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::DynamicObject;
#[cfg(test)]
use mockall::automock;
use serde_json::{Map, Number, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use yaml_rust2::{Yaml, YamlLoader};

use super::value_to_object;
use crate::controller::engine::EngineKind;
use crate::controller::error::{Error, Result};

/// Placeholder substituted with the operator version in URL templates
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Source of operator bundles
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the bundle for `engine`'s operator at `version`
    async fn fetch(
        &self,
        engine: EngineKind,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

/// Downloads bundles over HTTP from per-engine URL templates
#[derive(Clone, Debug)]
pub struct HttpManifestSource {
    client: reqwest::Client,
    templates: BTreeMap<EngineKind, String>,
}

impl HttpManifestSource {
    pub fn new(templates: BTreeMap<EngineKind, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            templates,
        }
    }

    /// Render the bundle URL for an engine and version
    pub fn url(&self, engine: EngineKind, version: &str) -> Option<String> {
        self.templates
            .get(&engine)
            .map(|template| template.replace(VERSION_PLACEHOLDER, version))
    }

    async fn download(&self, url: &str) -> std::result::Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch(
        &self,
        engine: EngineKind,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let url = self.url(engine, version).ok_or_else(|| Error::ManifestFetch {
            engine,
            version: version.to_string(),
            reason: "no manifest URL configured".to_string(),
        })?;
        debug!(engine = %engine, version, url = %url, "downloading operator bundle");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.download(&url) => result.map_err(|e| Error::ManifestFetch {
                engine,
                version: version.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Split a multi-document YAML bundle into objects.
///
/// Empty documents and documents without a `kind` are skipped.
pub fn parse_bundle(bundle: &str) -> Result<Vec<DynamicObject>> {
    let documents = YamlLoader::load_from_str(bundle)
        .map_err(|e| Error::InvalidManifest(format!("invalid YAML: {e}")))?;

    let mut objects = Vec::with_capacity(documents.len());
    for document in documents {
        let value = yaml_to_json(document)?;
        if value.get("kind").and_then(Value::as_str).is_none() {
            trace!("skipping bundle document without kind");
            continue;
        }
        objects.push(value_to_object(value)?);
    }
    Ok(objects)
}

fn yaml_to_json(yaml: Yaml) -> Result<Value> {
    match yaml {
        Yaml::Null | Yaml::BadValue => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|e| Error::InvalidManifest(format!("invalid number {s:?}: {e}")))?;
            Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(items) => items
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Yaml::Hash(hash) => {
            let mut map = Map::with_capacity(hash.len());
            for (key, value) in hash {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Boolean(b) => b.to_string(),
                    Yaml::Real(s) => s,
                    other => {
                        return Err(Error::InvalidManifest(format!(
                            "unsupported mapping key: {other:?}"
                        )));
                    }
                };
                map.insert(key, yaml_to_json(value)?);
            }
            Ok(Value::Object(map))
        }
        Yaml::Alias(_) => Err(Error::InvalidManifest(
            "YAML aliases are not supported".to_string(),
        )),
    }
}
