//! Observability infrastructure for the risk predictor
//!
//! Provides:
//! - Prometheus metrics (scoring latency, training runs, model accuracy, current risk)
//! - Structured JSON logging with tracing

use crate::models::RiskResult;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Gauge,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for per-call scoring latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Histogram buckets for a full training pass (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RiskMetricsInner> = OnceLock::new();

struct RiskMetricsInner {
    risk_calculations: IntCounter,
    fallback_results: IntCounter,
    prediction_latency_seconds: Histogram,
    training_duration_seconds: Histogram,
    training_runs: IntCounter,
    training_failures: IntCounter,
    model_accuracy: Gauge,
    model_trained: IntGauge,
    current_risk: Gauge,
    history_size: IntGauge,
    nan_predictions: IntCounter,
    nan_alerts: IntCounter,
}

impl RiskMetricsInner {
    fn new() -> Self {
        Self {
            risk_calculations: register_int_counter!(
                "vehicle_risk_calculations_total",
                "Total number of risk calculations"
            )
            .expect("Failed to register risk_calculations"),

            fallback_results: register_int_counter!(
                "vehicle_risk_fallback_results_total",
                "Risk results produced by the rule-based scorer"
            )
            .expect("Failed to register fallback_results"),

            prediction_latency_seconds: register_histogram!(
                "vehicle_risk_prediction_latency_seconds",
                "Time spent scoring one telemetry snapshot",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            training_duration_seconds: register_histogram!(
                "vehicle_risk_training_duration_seconds",
                "Wall time of a full training pass",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            training_runs: register_int_counter!(
                "vehicle_risk_training_runs_total",
                "Training passes started"
            )
            .expect("Failed to register training_runs"),

            training_failures: register_int_counter!(
                "vehicle_risk_training_failures_total",
                "Training passes that fell back to the degraded state"
            )
            .expect("Failed to register training_failures"),

            model_accuracy: register_gauge!(
                "vehicle_risk_model_accuracy",
                "Accuracy of the committed model"
            )
            .expect("Failed to register model_accuracy"),

            model_trained: register_int_gauge!(
                "vehicle_risk_model_trained",
                "1 when a trained model is committed"
            )
            .expect("Failed to register model_trained"),

            current_risk: register_gauge!(
                "vehicle_risk_current_probability",
                "Most recent accident risk probability"
            )
            .expect("Failed to register current_risk"),

            history_size: register_int_gauge!(
                "vehicle_risk_history_size",
                "Entries in the risk history buffer"
            )
            .expect("Failed to register history_size"),

            nan_predictions: register_int_counter!(
                "vehicle_risk_nan_predictions_total",
                "Network outputs that were not a number"
            )
            .expect("Failed to register nan_predictions"),

            nan_alerts: register_int_counter!(
                "vehicle_risk_nan_alerts_total",
                "Times consecutive NaN outputs crossed the alert threshold"
            )
            .expect("Failed to register nan_alerts"),
        }
    }
}

/// Risk metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct RiskMetrics {
    _private: (),
}

impl Default for RiskMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RiskMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RiskMetricsInner {
        GLOBAL_METRICS.get_or_init(RiskMetricsInner::new)
    }

    /// Record one scoring call
    pub fn record_risk(&self, result: &RiskResult, latency: Duration) {
        let inner = self.inner();
        inner.risk_calculations.inc();
        if result.is_fallback {
            inner.fallback_results.inc();
        }
        inner.prediction_latency_seconds.observe(latency.as_secs_f64());
        inner.current_risk.set(result.probability);
    }

    pub fn inc_training_runs(&self) {
        self.inner().training_runs.inc();
    }

    pub fn inc_training_failures(&self) {
        self.inner().training_failures.inc();
    }

    pub fn observe_training_duration(&self, duration: Duration) {
        self.inner()
            .training_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn set_model_state(&self, trained: bool, accuracy: f64) {
        self.inner().model_trained.set(i64::from(trained));
        self.inner().model_accuracy.set(accuracy);
    }

    pub fn set_history_size(&self, size: usize) {
        self.inner().history_size.set(size as i64);
    }

    pub fn inc_nan_predictions(&self) {
        self.inner().nan_predictions.inc();
    }

    pub fn inc_nan_alerts(&self) {
        self.inner().nan_alerts.inc();
    }
}

/// Structured logger for predictor events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    vehicle_id: String,
}

impl StructuredLogger {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
        }
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    /// Log a risk calculation
    pub fn log_risk(&self, result: &RiskResult) {
        info!(
            event = "risk_calculated",
            vehicle = %self.vehicle_id,
            probability = result.probability,
            level = %result.level,
            is_fallback = result.is_fallback,
            "Calculated accident risk"
        );
    }

    /// Log a completed training pass
    pub fn log_training(&self, source: &str, samples: usize, accuracy: f64, duration: Duration) {
        info!(
            event = "model_trained",
            vehicle = %self.vehicle_id,
            source = %source,
            samples = samples,
            accuracy = accuracy,
            duration_ms = duration.as_millis() as u64,
            "Risk model trained"
        );
    }

    /// Log a training pass that ended in the degraded state
    pub fn log_training_failure(&self, reason: &str, fallback_accuracy: f64) {
        warn!(
            event = "training_failed",
            vehicle = %self.vehicle_id,
            reason = %reason,
            fallback_accuracy = fallback_accuracy,
            "Risk model training failed, using rule-based scoring"
        );
    }

    pub fn log_model_loaded(&self, accuracy: f64, source: &str) {
        info!(
            event = "model_loaded",
            vehicle = %self.vehicle_id,
            accuracy = accuracy,
            source = %source,
            "Loaded stored risk model"
        );
    }

    pub fn log_model_saved(&self, success: bool) {
        if success {
            info!(
                event = "model_saved",
                vehicle = %self.vehicle_id,
                "Risk model persisted"
            );
        } else {
            warn!(
                event = "model_save_failed",
                vehicle = %self.vehicle_id,
                "Risk model could not be persisted"
            );
        }
    }

    pub fn log_nan_alert(&self, consecutive: u64, threshold: u64) {
        warn!(
            event = "nan_predictions",
            vehicle = %self.vehicle_id,
            consecutive = consecutive,
            threshold = threshold,
            "Network keeps producing NaN, scoring with rules until retrained"
        );
    }

    pub fn log_startup(&self, version: &str, model_ready: bool) {
        info!(
            event = "agent_started",
            vehicle = %self.vehicle_id,
            agent_version = %version,
            model_ready = model_ready,
            "Risk agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            vehicle = %self.vehicle_id,
            reason = %reason,
            "Risk agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureVector, RiskLevel};
    use chrono::Utc;

    #[test]
    fn test_metrics_record() {
        let metrics = RiskMetrics::new();
        let result = RiskResult {
            probability: 0.4,
            level: RiskLevel::Medium,
            features: FeatureVector::from([20.0, 50.0, 0.0, 10.0, 12.0]),
            timestamp: Utc::now(),
            is_fallback: true,
        };

        let before = metrics.inner().fallback_results.get();
        metrics.record_risk(&result, Duration::from_micros(40));
        assert!(metrics.inner().fallback_results.get() > before);

        metrics.set_model_state(true, 0.82);
        metrics.set_history_size(3);
        metrics.observe_training_duration(Duration::from_secs(2));
        metrics.inc_nan_predictions();
    }

    #[test]
    fn test_metrics_exposed_in_registry() {
        RiskMetrics::new().inc_training_runs();
        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "vehicle_risk_training_runs_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("truck-17");
        assert_eq!(logger.vehicle_id(), "truck-17");
    }
}
