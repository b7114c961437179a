//! Controller configuration
//!
//! Everything is read from environment variables once at startup:
//!
//! - `DBAAS_NAMESPACE`: namespace clusters live in (falls back to
//!   `POD_NAMESPACE`, then `default`)
//! - `DBAAS_API_ADDR`: API listen address, default `0.0.0.0:20201`
//! - `DBAAS_HEALTH_ADDR`: probe and metrics listen address, default `0.0.0.0:8080`
//! - `DBAAS_REQUEST_TIMEOUT_SECS`: deadline of one API request, default 60
//! - `DBAAS_PXC_OPERATOR_VERSION` / `DBAAS_PXC_CR_VERSION`
//! - `DBAAS_PSMDB_OPERATOR_VERSION` / `DBAAS_PSMDB_CR_VERSION`
//! - `DBAAS_PXC_MANIFESTS_URL` / `DBAAS_PSMDB_MANIFESTS_URL`: bundle URL
//!   templates with a `{version}` placeholder
//! - `DBAAS_ENVIRONMENT`: `auto`, `development` or `production`

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::controller::engine::EngineKind;
use crate::controller::environment::EnvironmentMode;
use crate::controller::validation::validate_version;
use crate::controller::EngineSettings;
use crate::store::manifest::VERSION_PLACEHOLDER;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:20201";
pub const DEFAULT_HEALTH_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_PXC_OPERATOR_VERSION: &str = "1.6.0";
pub const DEFAULT_PXC_CR_VERSION: &str = "1.7.0";
pub const DEFAULT_PSMDB_OPERATOR_VERSION: &str = "1.6.0";
pub const DEFAULT_PSMDB_CR_VERSION: &str = "1.6.0";

pub const DEFAULT_PXC_MANIFESTS_URL: &str =
    "https://raw.githubusercontent.com/percona/percona-xtradb-cluster-operator/v{version}/deploy/bundle.yaml";
pub const DEFAULT_PSMDB_MANIFESTS_URL: &str =
    "https://raw.githubusercontent.com/percona/percona-server-mongodb-operator/v{version}/deploy/bundle.yaml";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid address {value:?}")]
    InvalidAddress { var: &'static str, value: String },

    #[error("{var}: expected a positive number of seconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("{var}: invalid version {value:?}, expected MAJOR.MINOR.PATCH")]
    InvalidVersion { var: &'static str, value: String },

    #[error("{var}: URL template {value:?} has no {{version}} placeholder")]
    InvalidManifestUrl { var: &'static str, value: String },

    #[error("{var}: {reason}")]
    InvalidEnvironment { var: &'static str, reason: String },
}

/// Runtime configuration of the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    pub namespace: String,
    pub api_addr: SocketAddr,
    pub health_addr: SocketAddr,
    pub request_timeout: Duration,
    pub xtradb: EngineSettings,
    pub psmdb: EngineSettings,
    pub manifest_urls: BTreeMap<EngineKind, String>,
    pub environment: EnvironmentMode,
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let namespace = get("DBAAS_NAMESPACE")
            .or_else(|| get("POD_NAMESPACE"))
            .unwrap_or_else(|| {
                warn!("neither DBAAS_NAMESPACE nor POD_NAMESPACE set, using '{DEFAULT_NAMESPACE}'");
                DEFAULT_NAMESPACE.to_string()
            });

        let api_addr = parse_addr("DBAAS_API_ADDR", get("DBAAS_API_ADDR"), DEFAULT_API_ADDR)?;
        let health_addr =
            parse_addr("DBAAS_HEALTH_ADDR", get("DBAAS_HEALTH_ADDR"), DEFAULT_HEALTH_ADDR)?;

        let request_timeout = match get("DBAAS_REQUEST_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        var: "DBAAS_REQUEST_TIMEOUT_SECS",
                        value,
                    });
                }
            },
        };

        let xtradb = EngineSettings::new(
            parse_version(
                "DBAAS_PXC_OPERATOR_VERSION",
                get("DBAAS_PXC_OPERATOR_VERSION"),
                DEFAULT_PXC_OPERATOR_VERSION,
            )?,
            parse_version(
                "DBAAS_PXC_CR_VERSION",
                get("DBAAS_PXC_CR_VERSION"),
                DEFAULT_PXC_CR_VERSION,
            )?,
        );
        let psmdb = EngineSettings::new(
            parse_version(
                "DBAAS_PSMDB_OPERATOR_VERSION",
                get("DBAAS_PSMDB_OPERATOR_VERSION"),
                DEFAULT_PSMDB_OPERATOR_VERSION,
            )?,
            parse_version(
                "DBAAS_PSMDB_CR_VERSION",
                get("DBAAS_PSMDB_CR_VERSION"),
                DEFAULT_PSMDB_CR_VERSION,
            )?,
        );

        let manifest_urls = BTreeMap::from([
            (
                EngineKind::Xtradb,
                parse_manifest_url(
                    "DBAAS_PXC_MANIFESTS_URL",
                    get("DBAAS_PXC_MANIFESTS_URL"),
                    DEFAULT_PXC_MANIFESTS_URL,
                )?,
            ),
            (
                EngineKind::Psmdb,
                parse_manifest_url(
                    "DBAAS_PSMDB_MANIFESTS_URL",
                    get("DBAAS_PSMDB_MANIFESTS_URL"),
                    DEFAULT_PSMDB_MANIFESTS_URL,
                )?,
            ),
        ]);

        let environment = match get("DBAAS_ENVIRONMENT") {
            None => EnvironmentMode::Auto,
            Some(value) => value
                .trim()
                .parse()
                .map_err(|reason| ConfigError::InvalidEnvironment {
                    var: "DBAAS_ENVIRONMENT",
                    reason,
                })?,
        };

        Ok(Self {
            namespace,
            api_addr,
            health_addr,
            request_timeout,
            xtradb,
            psmdb,
            manifest_urls,
            environment,
        })
    }
}

fn parse_addr(
    var: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<SocketAddr, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddress { var, value })
}

fn parse_version(
    var: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<String, ConfigError> {
    let value = value.map_or_else(|| default.to_string(), |v| v.trim().to_string());
    validate_version(&value).map_err(|_| ConfigError::InvalidVersion {
        var,
        value: value.clone(),
    })?;
    Ok(value)
}

fn parse_manifest_url(
    var: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<String, ConfigError> {
    let value = value.map_or_else(|| default.to_string(), |v| v.trim().to_string());
    if !value.contains(VERSION_PLACEHOLDER) {
        return Err(ConfigError::InvalidManifestUrl { var, value });
    }
    Ok(value)
}
