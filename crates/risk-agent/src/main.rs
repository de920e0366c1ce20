//! Risk Agent - vehicle accident risk prediction service
//!
//! Loads or trains the scoring model, scores pushed telemetry on a fixed
//! cadence and serves risk, health and metrics endpoints.

use anyhow::Result;
use risk_agent::{api, config::AgentConfig};
use risk_lib::{
    health::{components, HealthRegistry},
    observability::RiskMetrics,
    predictor::{RiskMonitor, RiskPredictor, ScoringModel, SystemClock},
    store::{FileStore, ModelStore},
    RiskLevel, RiskResult,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting risk-agent");

    let config = AgentConfig::load()?;
    info!(
        vehicle_id = %config.vehicle_id,
        model_dir = %config.model_dir.display(),
        dataset = ?config.dataset_path,
        delimiter = %config.dataset_delimiter,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::PREDICTOR).await;
    health_registry.register(components::MODEL).await;
    health_registry.register(components::STORE).await;
    health_registry.register(components::TELEMETRY_FEED).await;
    health_registry
        .set_degraded(components::PREDICTOR, "Initializing")
        .await;
    health_registry
        .set_degraded(components::TELEMETRY_FEED, "No telemetry received yet")
        .await;

    if let Err(e) = tokio::fs::create_dir_all(&config.model_dir).await {
        warn!(error = %e, "Model directory unavailable, models will not persist");
        health_registry
            .set_degraded(components::STORE, e.to_string())
            .await;
    }
    let store: Arc<dyn ModelStore> = Arc::new(FileStore::new(&config.model_dir));

    let model = ScoringModel::new(config.training_config(), config.training_provider(), store);
    let predictor = Arc::new(RiskPredictor::new(
        config.predictor_config(),
        model,
        Arc::new(SystemClock),
    ));
    let logger = predictor.logger().clone();

    let (monitor, results) = RiskMonitor::new(predictor.clone(), config.monitor_config());
    let monitor = Arc::new(monitor);

    let metrics = RiskMetrics::new();
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        predictor.clone(),
        monitor.clone(),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);

    // Load or train off the request path; endpoints answer with rules meanwhile
    let init_handle = tokio::spawn({
        let predictor = predictor.clone();
        let registry = health_registry.clone();
        let logger = logger.clone();
        async move {
            predictor.initialize().await;
            let stats = predictor.model_stats();
            registry.report_model(&stats).await;
            registry.set_healthy(components::PREDICTOR).await;
            registry.set_ready(true).await;
            logger.log_startup(AGENT_VERSION, stats.model_ready);
        }
    });

    let monitor_handle = tokio::spawn(monitor.clone().run(None, shutdown_tx.subscribe()));
    let results_handle = tokio::spawn(consume_results(
        results,
        app_state.clone(),
        shutdown_tx.subscribe(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state.clone()));

    let reason = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            "SIGINT received"
        }
        served = api_handle => {
            match served {
                Ok(Ok(())) => "API server stopped",
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    "API server failed"
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    "API server panicked"
                }
            }
        }
    };

    logger.log_shutdown(reason);
    health_registry.set_ready(false).await;
    // Receivers may already be gone
    let _ = shutdown_tx.send(());

    init_handle.abort();
    let _ = monitor_handle.await;
    let _ = results_handle.await;
    predictor.dispose().await;
    info!("Shutting down");

    Ok(())
}

async fn consume_results(
    mut results: mpsc::Receiver<RiskResult>,
    state: Arc<api::AppState>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = results.recv() => match result {
                Some(result) => {
                    state.refresh_model_health().await;
                    log_result(&result);
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

fn log_result(result: &RiskResult) {
    match result.level {
        RiskLevel::High | RiskLevel::VeryHigh => warn!(
            probability = result.probability,
            level = %result.level,
            fallback = result.is_fallback,
            "Elevated accident risk"
        ),
        _ => debug!(
            probability = result.probability,
            level = %result.level,
            "Risk updated"
        ),
    }
}
