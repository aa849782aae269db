//! Diet Similarity Service - Main Entry Point
//!
//! Loads the configured classifiers once, then serves the questionnaire and
//! scores each submission against every loaded model.

use anyhow::{Context, Result};
use diet_similarity::{
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::{ModelLoader, ModelRegistry, Scorer},
    predictor::Predictor,
    web::{self, AppState},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("diet_similarity={},tower_http=info", logging.level))
    })?;

    if logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Diet Similarity Service");
    info!(
        variant = ?config.variant,
        default_upper_bound = config.default_upper_bound(),
        timeout_ms = config.models.timeout_ms,
        "Configuration loaded successfully"
    );

    // Load models once; failures leave the service in degraded mode
    let loader = ModelLoader::with_threads(config.models.onnx_threads);
    let table = config.domain_table();
    let registry = Arc::new(ModelRegistry::load(&config.model_entries(), &table, &loader));

    if registry.is_degraded() {
        for failure in registry.failures() {
            warn!(error = %failure, "Model unavailable");
        }
    }
    info!(
        "Registry initialized with {} models: {:?}",
        registry.model_count(),
        registry.model_labels()
    );

    let metrics = Arc::new(ServiceMetrics::new());
    let reporter_metrics = metrics.clone();
    tokio::spawn(async move {
        MetricsReporter::new(reporter_metrics, 300).start().await;
    });

    let predictor = Predictor::new(
        registry,
        Scorer::with_timeout(config.estimation_timeout()),
        metrics.clone(),
    );
    let state = Arc::new(AppState {
        predictor,
        page: config.page.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Listening on http://{}", config.server.bind);

    axum::serve(listener, web::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    metrics.log_summary();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
