//! Error types for the cluster lifecycle operations

use thiserror::Error;

use crate::controller::engine::EngineKind;
use crate::store::StoreError;

/// Error variants are named with the `Error` suffix where they wrap another
/// error type (e.g., `SerializationError`), matching the store's errors.
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("{engine} cluster is not ready: state is {state:?}")]
    NotReady { engine: EngineKind, state: String },

    #[error("{context}: {source}")]
    StoreUnavailable {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("{context}: resource was modified concurrently, retry the request")]
    Conflict { context: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("Invalid operator version {0:?}: expected MAJOR.MINOR.PATCH")]
    InvalidVersion(String),

    #[error("Invalid cluster parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("cannot detect environment: {0}")]
    Environment(String),

    #[error("cannot fetch {engine} operator {version} manifests: {reason}")]
    ManifestFetch {
        engine: EngineKind,
        version: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a store failure with a description of the attempted operation
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        let context = context.into();
        match source {
            StoreError::NotFound { kind, name } => Error::NotFound { kind, name },
            StoreError::Conflict { .. } => Error::Conflict { context },
            StoreError::Cancelled => Error::Cancelled,
            source => Error::StoreUnavailable { context, source },
        }
    }

    /// Check if the caller may retry the same request unchanged.
    ///
    /// The core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            // Another writer won the race, re-read and try again
            Error::Conflict { .. } => true,
            // The cluster may reach Ready later
            Error::NotReady { .. } => true,
            Error::StoreUnavailable { source, .. } => match source {
                StoreError::KubeError(kube::Error::Api(api_err)) => {
                    // 4xx errors (except 429 TooManyRequests) are not retryable
                    let code = api_err.code;
                    !(400..500).contains(&code) || code == 429
                }
                StoreError::KubeError(_) => true,
                _ => false,
            },
            Error::ManifestFetch { .. } => true,
            Error::NotFound { .. }
            | Error::Cancelled
            | Error::InvalidVersion(_)
            | Error::InvalidParams(_)
            | Error::InvalidManifest(_)
            | Error::Environment(_)
            | Error::SerializationError(_) => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Attach operation context to store results
pub trait StoreResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T>;
}

impl<T> StoreResultExt<T> for std::result::Result<T, StoreError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::store(context, e))
    }

    fn with_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|e| Error::store(context(), e))
    }
}
