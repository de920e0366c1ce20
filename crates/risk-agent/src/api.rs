//! HTTP API for risk scoring, health checks and Prometheus metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use risk_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    observability::RiskMetrics,
    predictor::{RiskMonitor, RiskPredictor},
    TelemetrySnapshot,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: RiskMetrics,
    pub predictor: Arc<RiskPredictor>,
    pub monitor: Arc<RiskMonitor>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: RiskMetrics,
        predictor: Arc<RiskPredictor>,
        monitor: Arc<RiskMonitor>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            predictor,
            monitor,
        }
    }

    /// Re-derive the model component from the predictor's current stats
    pub async fn refresh_model_health(&self) {
        self.health_registry
            .report_model(&self.predictor.model_stats())
            .await;
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub success: bool,
}

/// Health check response - returns 200 while operational, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // rules still score
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Score a snapshot immediately
async fn calculate_risk(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<TelemetrySnapshot>,
) -> impl IntoResponse {
    let result = state.predictor.calculate_risk(&snapshot).await;
    state.refresh_model_health().await;
    Json(result)
}

/// Hand a snapshot to the monitor for the next scoring tick
async fn ingest_telemetry(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<TelemetrySnapshot>,
) -> impl IntoResponse {
    state.monitor.ingest(snapshot).await;
    state
        .health_registry
        .set_healthy(components::TELEMETRY_FEED)
        .await;
    StatusCode::ACCEPTED
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    Json(state.predictor.history_with_limit(query.limit).await)
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.predictor.status().await)
}

async fn monitor_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.stats().await)
}

async fn retrain(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let success = state.predictor.retrain_model().await;
    state.refresh_model_health().await;
    Json(RetrainResponse { success })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/risk", post(calculate_risk))
        .route("/api/v1/telemetry", post(ingest_telemetry))
        .route("/api/v1/history", get(history))
        .route("/api/v1/status", get(status))
        .route("/api/v1/monitor", get(monitor_stats))
        .route("/api/v1/model/retrain", post(retrain))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
