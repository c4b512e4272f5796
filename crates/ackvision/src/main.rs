//! AckVision - student performance prediction service
//!
//! Loads the training artifacts once, then serves predictions, batch
//! uploads, advisory and evaluation metrics over HTTP.

use ackvision::{api, config::ServiceConfig};
use ackvision_lib::{
    health::{components, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    ArtifactConfig, Pipeline,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting ackvision");

    let config = ServiceConfig::load()?;
    info!(
        port = config.port,
        models_dir = %config.models_dir.display(),
        data_path = %config.data_path.display(),
        "Service configured"
    );

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(&config.service_name);
    let health_registry = HealthRegistry::new();

    // Partial artifacts are fatal: nothing is served until all of them load
    let pipeline = Pipeline::initialize(&ArtifactConfig::new(&config.models_dir))
        .with_context(|| {
            format!(
                "Failed to load training artifacts from {}",
                config.models_dir.display()
            )
        })?
        .with_metrics(metrics.clone());

    health_registry.register(components::ENCODERS).await;
    health_registry.register(components::MODELS).await;
    metrics.set_artifact_info(&config.models_dir.display().to_string());
    logger.log_artifacts_loaded(
        &config.models_dir.display().to_string(),
        pipeline.engine().labels().risk.labels(),
    );

    let app_state = Arc::new(api::AppState::new(
        Arc::new(pipeline),
        health_registry.clone(),
        metrics,
        logger.clone(),
        config.data_path.clone(),
        config.max_upload_bytes,
    ));
    app_state.check_reference_data().await;

    health_registry.set_ready(true).await;
    logger.log_startup(SERVICE_VERSION, config.port);

    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        result = api_handle => {
            result.context("API server task panicked")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
        }
    }

    Ok(())
}
