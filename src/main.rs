mod api;
mod artifacts;
mod config;
mod enhancer;
mod lifecycle;
mod metadata_store;
mod presets;

use anyhow::{Context, Result};
use api::AppState;
use artifacts::ArtifactStore;
use config::Config;
use lifecycle::SubmissionLifecycle;
use metadata_store::MetadataStore;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting CipherMix backend"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Initialize components
    let artifacts = Arc::new(ArtifactStore::new(&config.storage));
    artifacts
        .ensure_dirs()
        .await
        .context("Failed to create artifact directories")?;

    // A corrupted metadata mirror is fatal: refuse to start rather than
    // silently discard submission history
    let metadata_store = Arc::new(
        MetadataStore::load(&config.storage.metadata_file)
            .context("Failed to load metadata store")?,
    );

    let lifecycle = Arc::new(SubmissionLifecycle::new(
        metadata_store.clone(),
        artifacts.clone(),
        config.processing.concurrency,
    ));

    // Create API state
    let api_state = AppState {
        lifecycle,
        metadata_store,
        artifacts,
        max_upload_bytes: config.storage.max_upload_bytes,
    };

    // Spawn API server task
    let api_config = config.api.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::start_api_server(api_state, &api_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("CipherMix backend started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down CipherMix backend");

    api_handle.abort();

    info!("CipherMix backend stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
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
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
