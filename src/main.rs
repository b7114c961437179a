use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use dbaas_controller::health::{HealthState, run_health_server};
use dbaas_controller::{ApiState, ControllerConfig, build_context, run_api_server};

/// Grace period for in-flight requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        // Check if a provider is already installed (common in test scenarios)
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            return Err(
                "Failed to install rustls crypto provider and no provider is available".into(),
            );
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dbaas_controller=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    info!("Starting dbaas-controller");

    let config = ControllerConfig::from_env()?;
    info!(
        namespace = %config.namespace,
        pxc_operator = %config.xtradb.operator_version,
        psmdb_operator = %config.psmdb.operator_version,
        "Loaded configuration"
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let shutdown = CancellationToken::new();
    let health_state = Arc::new(HealthState::new());

    let health_handle = {
        let health_state = health_state.clone();
        let shutdown = shutdown.clone();
        let addr = config.health_addr;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, addr, shutdown).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let ctx = build_context(client, &config);
    let api_state = Arc::new(
        ApiState::new(ctx, shutdown.clone(), config.request_timeout)
            .with_health(health_state.clone()),
    );
    let api_handle = {
        let addr = config.api_addr;
        tokio::spawn(async move {
            if let Err(e) = run_api_server(api_state, addr).await {
                error!("API server error: {}", e);
            }
        })
    };

    health_state.set_ready(true).await;
    info!("Controller ready");

    // Wait for any server to exit, or shutdown signal
    tokio::select! {
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = api_handle => {
            if let Err(e) = result {
                error!("API server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new work
            health_state.set_ready(false).await;
            info!("Marked controller as not ready");

            // Cancels every in-flight request and stops both servers
            shutdown.cancel();
            info!(
                "Waiting {}s for in-flight requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    shutdown.cancel();
    info!("Controller stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
