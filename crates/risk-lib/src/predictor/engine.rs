//! Risk predictor orchestration
//!
//! Wires feature extraction, the scoring model and classification together
//! and keeps the rolling risk history. None of the public operations fail:
//! every error path ends in a rule-based result or a `false`.

use super::classifier::{RiskClassifier, RiskThresholds};
use super::features::{Clock, FeatureExtractor};
use super::fallback::FallbackScorer;
use super::history::{HistoryReport, RiskEntry, RiskHistory, DEFAULT_HISTORY_CAPACITY};
use super::model::{ModelStats, ScoringModel, TrainOutcome};
use crate::models::{RiskResult, TelemetrySnapshot};
use crate::observability::{RiskMetrics, StructuredLogger};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Predictor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictorConfig {
    /// Entries kept in the risk history
    pub max_history: usize,
    pub risk_thresholds: RiskThresholds,
    /// Identifier attached to log events
    pub vehicle_id: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_HISTORY_CAPACITY,
            risk_thresholds: RiskThresholds::default(),
            vehicle_id: "vehicle".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub is_initialized: bool,
    pub model: ModelStats,
    pub current_risk: f64,
    pub history_size: usize,
    pub config: PredictorConfig,
}

struct PredictorState {
    history: RiskHistory,
    current_risk: f64,
}

/// Scores telemetry snapshots and tracks risk over time
pub struct RiskPredictor {
    config: PredictorConfig,
    model: ScoringModel,
    extractor: FeatureExtractor,
    classifier: RiskClassifier,
    state: RwLock<PredictorState>,
    initialized: AtomicBool,
    metrics: RiskMetrics,
    logger: StructuredLogger,
}

impl RiskPredictor {
    pub fn new(config: PredictorConfig, model: ScoringModel, clock: Arc<dyn Clock>) -> Self {
        let logger = StructuredLogger::new(config.vehicle_id.clone());
        Self {
            model: model.with_logger(logger.clone()),
            extractor: FeatureExtractor::new(clock),
            classifier: RiskClassifier::with_thresholds(config.risk_thresholds),
            state: RwLock::new(PredictorState {
                history: RiskHistory::new(config.max_history),
                current_risk: 0.0,
            }),
            initialized: AtomicBool::new(false),
            metrics: RiskMetrics::new(),
            logger,
            config,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Load a stored model, training one if none is usable
    ///
    /// Always ends initialized; scoring degrades to rules if training fails.
    pub async fn initialize(&self) -> bool {
        info!(vehicle = %self.config.vehicle_id, "Initializing risk predictor");

        if !self.model.load().await {
            match self.model.train().await {
                TrainOutcome::Trained(report) => {
                    info!(accuracy = report.accuracy, samples = report.samples, "Initial model trained");
                }
                TrainOutcome::Degraded { reason } => {
                    warn!(reason = %reason, "Initial training failed, scoring with rules");
                }
                TrainOutcome::AlreadyTraining => {
                    info!("Model training already underway");
                }
            }
        }

        let stats = self.model.stats();
        info!(
            model_ready = stats.model_ready,
            samples = stats.samples_count,
            source = %stats.data_source,
            "Risk predictor initialized"
        );
        self.initialized.store(true, Ordering::Release);
        true
    }

    /// Score a snapshot and record it in the history
    pub async fn calculate_risk(&self, snapshot: &TelemetrySnapshot) -> RiskResult {
        let started = Instant::now();

        let result = if !self.is_initialized() {
            warn!("Risk predictor not initialized, using rule-based score");
            self.fallback_risk(snapshot)
        } else {
            let features = self.extractor.extract(snapshot);
            match self.model.predict(&features) {
                Ok(prediction) => {
                    let result = RiskResult {
                        probability: prediction.probability,
                        level: self.classifier.classify(prediction.probability),
                        features,
                        timestamp: Utc::now(),
                        is_fallback: prediction.used_fallback,
                    };
                    self.record(&result, snapshot).await;
                    result
                }
                Err(e) => {
                    warn!(error = %e, "Risk prediction failed, using rule-based score");
                    self.fallback_risk(snapshot)
                }
            }
        };

        self.metrics.record_risk(&result, started.elapsed());
        self.logger.log_risk(&result);
        result
    }

    async fn record(&self, result: &RiskResult, snapshot: &TelemetrySnapshot) {
        let mut state = self.state.write().await;
        state.history.push(RiskEntry::new(result, snapshot));
        state.current_risk = result.probability;
        self.metrics.set_history_size(state.history.len());
    }

    /// Rule-based result; not recorded in the history
    pub fn fallback_risk(&self, snapshot: &TelemetrySnapshot) -> RiskResult {
        let features = self.extractor.extract(snapshot);
        let probability = FallbackScorer::score(&features);
        RiskResult {
            probability,
            level: self.classifier.classify(probability),
            features,
            timestamp: Utc::now(),
            is_fallback: true,
        }
    }

    /// Force a fresh training pass; true when a new network was committed
    pub async fn retrain_model(&self) -> bool {
        match self.model.retrain().await {
            TrainOutcome::Trained(report) => {
                info!(accuracy = report.accuracy, persisted = report.persisted, "Model retrained");
                true
            }
            TrainOutcome::Degraded { reason } => {
                warn!(reason = %reason, "Retrain failed, scoring with rules");
                false
            }
            TrainOutcome::AlreadyTraining => false,
        }
    }

    pub async fn history(&self) -> HistoryReport {
        self.history_with_limit(None).await
    }

    /// History report with at most `limit` entries; stats cover all entries
    pub async fn history_with_limit(&self, limit: Option<usize>) -> HistoryReport {
        let state = self.state.read().await;
        HistoryReport {
            current: state.current_risk,
            history: state
                .history
                .newest(limit.unwrap_or(state.history.capacity())),
            stats: state.history.stats(),
        }
    }

    pub async fn status(&self) -> SystemStatus {
        let state = self.state.read().await;
        SystemStatus {
            is_initialized: self.is_initialized(),
            model: self.model.stats(),
            current_risk: state.current_risk,
            history_size: state.history.len(),
            config: self.config.clone(),
        }
    }

    pub fn model_stats(&self) -> ModelStats {
        self.model.stats()
    }

    /// Mark uninitialized and drop recorded history
    pub async fn dispose(&self) {
        self.initialized.store(false, Ordering::Release);
        let mut state = self.state.write().await;
        state.history.clear();
        state.current_risk = 0.0;
        self.metrics.set_history_size(0);
        info!(vehicle = %self.config.vehicle_id, "Risk predictor disposed");
    }
}
