//! HTTP handlers of the cluster API
//!
//! Handlers only decode requests, pick the engine and encode results; the
//! work happens in [`crate::controller`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::controller::{
    self, ClusterParams, ClusterRecord, Context, Credentials, DatabaseEngine, EngineKind, Error,
    Operators, Psmdb, Result, Xtradb,
};
use crate::health::HealthState;

/// Shared state of the API handlers
pub struct ApiState {
    pub ctx: Context,
    pub health: Option<Arc<HealthState>>,
    /// Process shutdown token; every request runs under a child of it
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

impl ApiState {
    pub fn new(ctx: Context, shutdown: CancellationToken, request_timeout: Duration) -> Self {
        Self {
            ctx,
            health: None,
            shutdown,
            request_timeout,
        }
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    /// Start the cancellation scope of one request
    fn request_scope(&self) -> RequestScope {
        let token = self.shutdown.child_token();
        let deadline = token.clone();
        let timeout = self.request_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    if !deadline.is_cancelled() {
                        warn!(timeout_secs = timeout.as_secs(), "request deadline exceeded");
                    }
                    deadline.cancel();
                }
                _ = deadline.cancelled() => {}
            }
        });
        RequestScope {
            token: token.clone(),
            _guard: token.drop_guard(),
        }
    }

    /// Run an operation and record its outcome
    async fn timed<T, F>(
        &self,
        operation: &'static str,
        engine: Option<EngineKind>,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        if let Some(health) = &self.health {
            health.metrics.record_operation(
                operation,
                engine.map_or("all", EngineKind::as_str),
                start.elapsed().as_secs_f64(),
                result.is_ok(),
            );
        }
        result
    }
}

/// Cancellation token of one request, cancelled when the request ends
struct RequestScope {
    token: CancellationToken,
    _guard: DropGuard,
}

/// Body of `PATCH /v1/{engine}/clusters/{name}`
#[derive(Debug, Deserialize)]
struct UpdateRequest<W> {
    #[serde(default)]
    size: i32,
    #[serde(default)]
    suspend: bool,
    #[serde(default)]
    resume: bool,
    #[serde(flatten)]
    workloads: W,
}

/// Body of `POST /v1/operators/{engine}`
#[derive(Debug, Deserialize, Serialize)]
pub struct InstallOperatorRequest {
    pub version: String,
}

#[derive(Debug, Serialize)]
struct ClusterList<W> {
    clusters: Vec<ClusterRecord<W>>,
}

/// Create the API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(
            "/v1/{engine}/clusters",
            get(list_clusters).post(create_cluster),
        )
        .route(
            "/v1/{engine}/clusters/{name}",
            axum::routing::patch(update_cluster).delete(delete_cluster),
        )
        .route(
            "/v1/{engine}/clusters/{name}/credentials",
            get(get_credentials),
        )
        .route("/v1/{engine}/clusters/{name}/restart", post(restart_cluster))
        .route("/v1/operators", get(check_operators))
        .route("/v1/operators/{engine}", post(install_operator))
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// HTTP status of an error
pub fn status_code(error: &Error) -> StatusCode {
    match error {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::NotReady { .. } | Error::Conflict { .. } => StatusCode::CONFLICT,
        Error::InvalidVersion(_) | Error::InvalidParams(_) => StatusCode::BAD_REQUEST,
        Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::InvalidParams(e.to_string()))
}

async fn list_clusters(
    State(state): State<Arc<ApiState>>,
    Path(engine): Path<String>,
) -> Result<Response> {
    let engine: EngineKind = engine.parse()?;
    let scope = state.request_scope();
    let body = state
        .timed("list_clusters", Some(engine), async {
            match engine {
                EngineKind::Xtradb => list_json::<Xtradb>(&state, &scope.token).await,
                EngineKind::Psmdb => list_json::<Psmdb>(&state, &scope.token).await,
            }
        })
        .await?;
    Ok(Json(body).into_response())
}

async fn list_json<E: DatabaseEngine>(
    state: &ApiState,
    cancel: &CancellationToken,
) -> Result<Value> {
    let clusters = controller::list_clusters::<E>(&state.ctx, cancel).await?;
    if let Some(health) = &state.health {
        health
            .metrics
            .set_clusters(E::KIND, clusters.iter().map(|c| c.state));
    }
    Ok(serde_json::to_value(ClusterList { clusters })?)
}

async fn create_cluster(
    State(state): State<Arc<ApiState>>,
    Path(engine): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response> {
    let engine: EngineKind = engine.parse()?;
    let scope = state.request_scope();
    state
        .timed("create_cluster", Some(engine), async {
            match engine {
                EngineKind::Xtradb => create::<Xtradb>(&state.ctx, body, &scope.token).await,
                EngineKind::Psmdb => create::<Psmdb>(&state.ctx, body, &scope.token).await,
            }
        })
        .await?;
    Ok(StatusCode::CREATED.into_response())
}

async fn create<E: DatabaseEngine>(
    ctx: &Context,
    body: Value,
    cancel: &CancellationToken,
) -> Result<()> {
    let params: ClusterParams<E::Workloads> = decode(body)?;
    controller::create_cluster::<E>(ctx, &params, cancel).await
}

async fn update_cluster(
    State(state): State<Arc<ApiState>>,
    Path((engine, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response> {
    let engine: EngineKind = engine.parse()?;
    let scope = state.request_scope();
    state
        .timed("update_cluster", Some(engine), async {
            match engine {
                EngineKind::Xtradb => update::<Xtradb>(&state.ctx, name, body, &scope.token).await,
                EngineKind::Psmdb => update::<Psmdb>(&state.ctx, name, body, &scope.token).await,
            }
        })
        .await?;
    Ok(StatusCode::OK.into_response())
}

async fn update<E: DatabaseEngine>(
    ctx: &Context,
    name: String,
    body: Value,
    cancel: &CancellationToken,
) -> Result<()> {
    let request: UpdateRequest<E::Workloads> = decode(body)?;
    let params = ClusterParams {
        name,
        pmm_public_address: None,
        size: request.size,
        suspend: request.suspend,
        resume: request.resume,
        workloads: request.workloads,
    };
    controller::update_cluster::<E>(ctx, &params, cancel).await
}

async fn delete_cluster(
    State(state): State<Arc<ApiState>>,
    Path((engine, name)): Path<(String, String)>,
) -> Result<Response> {
    let engine: EngineKind = engine.parse()?;
    let scope = state.request_scope();
    state
        .timed("delete_cluster", Some(engine), async {
            match engine {
                EngineKind::Xtradb => {
                    controller::delete_cluster::<Xtradb>(&state.ctx, &name, &scope.token).await
                }
                EngineKind::Psmdb => {
                    controller::delete_cluster::<Psmdb>(&state.ctx, &name, &scope.token).await
                }
            }
        })
        .await?;
    Ok(StatusCode::OK.into_response())
}

async fn get_credentials(
    State(state): State<Arc<ApiState>>,
    Path((engine, name)): Path<(String, String)>,
) -> Result<Json<Credentials>> {
    let engine: EngineKind = engine.parse()?;
    let scope = state.request_scope();
    let credentials = state
        .timed("get_credentials", Some(engine), async {
            match engine {
                EngineKind::Xtradb => {
                    controller::get_credentials::<Xtradb>(&state.ctx, &name, &scope.token).await
                }
                EngineKind::Psmdb => {
                    controller::get_credentials::<Psmdb>(&state.ctx, &name, &scope.token).await
                }
            }
        })
        .await?;
    Ok(Json(credentials))
}

async fn restart_cluster(
    State(state): State<Arc<ApiState>>,
    Path((engine, name)): Path<(String, String)>,
) -> Result<Response> {
    let engine: EngineKind = engine.parse()?;
    let scope = state.request_scope();
    state
        .timed("restart_cluster", Some(engine), async {
            match engine {
                EngineKind::Xtradb => {
                    controller::restart_cluster::<Xtradb>(&state.ctx, &name, &scope.token).await
                }
                EngineKind::Psmdb => {
                    controller::restart_cluster::<Psmdb>(&state.ctx, &name, &scope.token).await
                }
            }
        })
        .await?;
    Ok(StatusCode::ACCEPTED.into_response())
}

async fn check_operators(State(state): State<Arc<ApiState>>) -> Result<Json<Operators>> {
    let scope = state.request_scope();
    let operators = state
        .timed(
            "check_operators",
            None,
            controller::check_operators(&state.ctx, &scope.token),
        )
        .await?;
    Ok(Json(operators))
}

async fn install_operator(
    State(state): State<Arc<ApiState>>,
    Path(engine): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response> {
    let engine: EngineKind = engine.parse()?;
    let request: InstallOperatorRequest = decode(body)?;
    let scope = state.request_scope();
    state
        .timed(
            "install_operator",
            Some(engine),
            controller::install_or_upgrade_operator(
                &state.ctx,
                engine,
                &request.version,
                &scope.token,
            ),
        )
        .await?;
    Ok(StatusCode::OK.into_response())
}

/// Run the API server until `shutdown` is cancelled
pub async fn run_api_server(state: Arc<ApiState>, addr: SocketAddr) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
