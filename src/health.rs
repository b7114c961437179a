//! Health server for Kubernetes probes and Prometheus metrics
//!
//! Provides HTTP endpoints for:
//! - `/healthz` - Liveness probe (is the process alive?)
//! - `/readyz` - Readiness probe (is the controller ready to serve?)
//! - `/metrics` - Prometheus metrics

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::controller::engine::EngineKind;
use crate::controller::state::ClusterState;

/// Labels for per-operation metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct OperationLabels {
    pub operation: String,
    pub engine: String,
}

impl prometheus_client::encoding::EncodeLabelSet for OperationLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("operation", self.operation.as_str()).encode(encoder.encode_label())?;
        ("engine", self.engine.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for cluster state metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct StateLabels {
    pub engine: String,
    pub state: String,
}

impl prometheus_client::encoding::EncodeLabelSet for StateLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("engine", self.engine.as_str()).encode(encoder.encode_label())?;
        ("state", self.state.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics state
pub struct Metrics {
    /// Total operations counter
    pub operations_total: Family<OperationLabels, Counter>,
    /// Failed operations counter
    pub operation_errors_total: Family<OperationLabels, Counter>,
    /// Operation duration histogram
    pub operation_duration_seconds: Family<OperationLabels, Histogram>,
    /// Clusters by engine and state, as of the last list
    pub clusters: Family<StateLabels, Gauge>,

    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let operations_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "dbaas_controller_operations",
            "Total number of cluster and operator operations",
            operations_total.clone(),
        );

        let operation_errors_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "dbaas_controller_operation_errors",
            "Total number of failed operations",
            operation_errors_total.clone(),
        );

        let operation_duration_seconds =
            Family::<OperationLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.005, 2.0, 14))
            });
        registry.register(
            "dbaas_controller_operation_duration_seconds",
            "Duration of operations in seconds",
            operation_duration_seconds.clone(),
        );

        let clusters = Family::<StateLabels, Gauge>::default();
        registry.register(
            "dbaas_controller_clusters",
            "Number of database clusters by engine and state",
            clusters.clone(),
        );

        Self {
            operations_total,
            operation_errors_total,
            operation_duration_seconds,
            clusters,
            registry,
        }
    }

    /// Record a finished operation
    pub fn record_operation(&self, operation: &str, engine: &str, duration_secs: f64, ok: bool) {
        let labels = OperationLabels {
            operation: operation.to_string(),
            engine: engine.to_string(),
        };
        self.operations_total.get_or_create(&labels).inc();
        self.operation_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
        if !ok {
            self.operation_errors_total.get_or_create(&labels).inc();
        }
    }

    /// Replace the cluster counts of an engine.
    ///
    /// States absent from `states` are reset to zero so a cluster that
    /// changed state is not counted twice.
    pub fn set_clusters<I>(&self, engine: EngineKind, states: I)
    where
        I: IntoIterator<Item = ClusterState>,
    {
        let mut counts: BTreeMap<ClusterState, i64> =
            ClusterState::ALL.iter().map(|state| (*state, 0)).collect();
        for state in states {
            *counts.entry(state).or_default() += 1;
        }
        for (state, count) in counts {
            let labels = StateLabels {
                engine: engine.as_str().to_string(),
                state: state.as_str().to_string(),
            };
            self.clusters.get_or_create(&labels).set(count);
        }
    }

    /// Encode metrics to Prometheus text format
    ///
    /// Returns an empty string if encoding fails (should never happen with valid metrics).
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the controller is ready (connected to K8s API)
    pub ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the controller as ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the controller is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until startup completes and after
/// shutdown begins.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
///
/// Returns Prometheus-formatted metrics.
async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server until `shutdown` is cancelled
pub async fn run_health_server(
    state: Arc<HealthState>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Health server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
