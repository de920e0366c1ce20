//! Trainable scoring model
//!
//! Owns the network and its normalization parameters as one committed
//! snapshot. Scoring reads the current snapshot; a training pass builds a
//! complete replacement off to the side and swaps it in.

use super::fallback::FallbackScorer;
use super::network::{FitOptions, FitReport, RiskNetwork};
use super::normalizer::NormalizationParams;
use crate::error::ModelError;
use crate::models::{DatasetStats, FeatureVector, FEATURE_NAMES};
use crate::observability::{RiskMetrics, StructuredLogger};
use crate::retry::{with_retry, IoPolicy};
use crate::store::{ModelStore, METADATA_KEY, WEIGHTS_KEY};
use crate::training::{Dataset, TrainingDataProvider};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Version tag written into persisted metadata
pub const MODEL_FORMAT_VERSION: &str = "2.0.0";

/// Accuracy reported after a failed training pass
pub const FALLBACK_ACCURACY: f64 = 0.75;

const FALLBACK_SOURCE: &str = "fallback_enhanced";
const RESTORED_SOURCE: &str = "restored";

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Tail fraction of the dataset held out for validation
    pub validation_split: f64,
    pub learning_rate: f64,
    /// Seed for weight init, shuffling and dropout
    pub seed: Option<u64>,
    /// Consecutive NaN outputs before an alert is raised
    pub nan_alert_threshold: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            validation_split: 0.2,
            learning_rate: 0.001,
            seed: None,
            nan_alert_threshold: 10,
        }
    }
}

impl TrainingConfig {
    fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs: self.epochs,
            batch_size: self.batch_size,
            validation_split: self.validation_split,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

/// Immutable model state read by every prediction
#[derive(Debug, Clone)]
pub struct CommittedModel {
    pub network: Option<RiskNetwork>,
    pub normalization: Option<NormalizationParams>,
    pub trained: bool,
    pub accuracy: f64,
    pub dataset_stats: DatasetStats,
    pub trained_at: Option<DateTime<Utc>>,
}

impl CommittedModel {
    pub fn untrained() -> Self {
        Self {
            network: None,
            normalization: None,
            trained: false,
            accuracy: 0.0,
            dataset_stats: DatasetStats::untrained(),
            trained_at: None,
        }
    }

    /// Trained state with no network; scoring falls back to rules
    fn degraded(stats: DatasetStats) -> Self {
        Self {
            network: None,
            normalization: None,
            trained: true,
            accuracy: FALLBACK_ACCURACY,
            dataset_stats: DatasetStats {
                source: FALLBACK_SOURCE.to_string(),
                ..stats
            },
            trained_at: Some(Utc::now()),
        }
    }

    /// Whether predictions come from the network
    pub fn is_ready(&self) -> bool {
        self.trained && self.network.is_some()
    }
}

/// One model output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability: f64,
    pub used_fallback: bool,
}

impl Prediction {
    fn fallback(features: &FeatureVector) -> Self {
        Self {
            probability: FallbackScorer::score(features),
            used_fallback: true,
        }
    }
}

/// Summary of a successful training pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub accuracy: f64,
    pub samples: usize,
    pub source: String,
    pub epochs: usize,
    pub final_loss: f64,
    #[serde(skip)]
    pub duration: Duration,
    pub persisted: bool,
}

/// Result of a call to [`ScoringModel::train`]
#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    Trained(TrainingReport),
    /// Training failed; the model is marked trained and scores with rules
    Degraded { reason: String },
    /// Another pass was already running; nothing changed
    AlreadyTraining,
}

impl TrainOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, TrainOutcome::Trained(_))
    }
}

/// Metadata persisted next to the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    #[serde(default)]
    pub dataset_stats: DatasetStats,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub is_trained: bool,
    #[serde(default)]
    pub normalization_params: Option<NormalizationParams>,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: String,
}

impl ModelMetadata {
    fn from_committed(model: &CommittedModel) -> Self {
        Self {
            dataset_stats: model.dataset_stats.clone(),
            accuracy: model.accuracy,
            is_trained: model.trained,
            normalization_params: model.normalization,
            trained_at: model.trained_at,
            version: MODEL_FORMAT_VERSION.to_string(),
        }
    }

    /// Defaults for weights found without usable metadata
    fn restored() -> Self {
        Self {
            dataset_stats: DatasetStats::new(0, RESTORED_SOURCE, "Weights restored without metadata"),
            accuracy: 0.0,
            is_trained: true,
            normalization_params: None,
            trained_at: None,
            version: MODEL_FORMAT_VERSION.to_string(),
        }
    }
}

/// Model status for APIs and health checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub is_trained: bool,
    pub is_training: bool,
    pub accuracy: f64,
    pub dataset_stats: DatasetStats,
    pub model_ready: bool,
    pub samples_count: usize,
    pub data_source: String,
    pub features: Vec<String>,
    pub consecutive_nan: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
}

impl ModelStats {
    pub fn from_dataset(stats: &DatasetStats, accuracy: f64) -> Self {
        let features = if stats.features.is_empty() {
            FEATURE_NAMES.iter().map(|f| f.to_string()).collect()
        } else {
            stats.features.clone()
        };
        Self {
            is_trained: false,
            is_training: false,
            accuracy,
            dataset_stats: stats.clone(),
            model_ready: false,
            samples_count: stats.total_samples,
            data_source: stats.source.clone(),
            features,
            consecutive_nan: 0,
            trained_at: None,
        }
    }
}

/// Clears the training flag when a pass ends, however it ends
struct TrainingGuard<'a>(&'a AtomicBool);

impl<'a> TrainingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Scoring network with training, persistence and rule-based fallback
pub struct ScoringModel {
    config: TrainingConfig,
    provider: TrainingDataProvider,
    store: Arc<dyn ModelStore>,
    io_policy: IoPolicy,
    committed: RwLock<Arc<CommittedModel>>,
    training: AtomicBool,
    consecutive_nan: AtomicU64,
    metrics: RiskMetrics,
    logger: StructuredLogger,
}

impl ScoringModel {
    pub fn new(
        config: TrainingConfig,
        provider: TrainingDataProvider,
        store: Arc<dyn ModelStore>,
    ) -> Self {
        Self {
            config,
            provider,
            store,
            io_policy: IoPolicy::default(),
            committed: RwLock::new(Arc::new(CommittedModel::untrained())),
            training: AtomicBool::new(false),
            consecutive_nan: AtomicU64::new(0),
            metrics: RiskMetrics::new(),
            logger: StructuredLogger::new("unknown"),
        }
    }

    pub fn with_io_policy(mut self, policy: IoPolicy) -> Self {
        self.io_policy = policy;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> Result<Arc<CommittedModel>> {
        self.committed
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|_| anyhow!("Lock poisoned"))
    }

    fn current(&self) -> Arc<CommittedModel> {
        let guard = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    fn commit(&self, model: CommittedModel) {
        self.metrics.set_model_state(model.trained, model.accuracy);
        let mut guard = self.committed.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(model);
        self.consecutive_nan.store(0, Ordering::Release);
    }

    /// Score one feature vector
    ///
    /// Falls back to rules when no trained network is committed or when the
    /// network output is NaN.
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        let committed = self.snapshot()?;
        let network = match committed.network.as_ref() {
            Some(network) if committed.trained => network,
            _ => return Ok(Prediction::fallback(features)),
        };

        let input = match &committed.normalization {
            Some(params) => params.apply(features),
            None => features.to_array(),
        };
        let probability = network.predict(&input);

        if probability.is_nan() {
            self.record_nan();
            return Ok(Prediction::fallback(features));
        }

        self.consecutive_nan.store(0, Ordering::Release);
        Ok(Prediction {
            probability: probability.clamp(0.0, 1.0),
            used_fallback: false,
        })
    }

    fn record_nan(&self) {
        let consecutive = self.consecutive_nan.fetch_add(1, Ordering::AcqRel) + 1;
        self.metrics.inc_nan_predictions();
        if consecutive == self.config.nan_alert_threshold {
            self.metrics.inc_nan_alerts();
            self.logger
                .log_nan_alert(consecutive, self.config.nan_alert_threshold);
        } else {
            debug!(consecutive, "Network produced NaN, using rule-based score");
        }
    }

    /// Run a full training pass and commit the result
    pub async fn train(&self) -> TrainOutcome {
        let Some(_guard) = TrainingGuard::acquire(&self.training) else {
            info!("Training already in progress, ignoring request");
            return TrainOutcome::AlreadyTraining;
        };

        let started = Instant::now();
        self.metrics.inc_training_runs();

        let dataset = self.provider.provide().await;
        let stats = dataset.stats();

        match self.fit(dataset).await {
            Ok((committed, fit)) => {
                let accuracy = committed.accuracy;
                self.commit(committed);
                let persisted = self.save().await;
                let duration = started.elapsed();
                self.metrics.observe_training_duration(duration);
                self.logger
                    .log_training(&stats.source, stats.total_samples, accuracy, duration);

                TrainOutcome::Trained(TrainingReport {
                    accuracy,
                    samples: stats.total_samples,
                    source: stats.source,
                    epochs: fit.history.len(),
                    final_loss: fit.last().map(|m| m.loss).unwrap_or(f64::NAN),
                    duration,
                    persisted,
                })
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                self.metrics.inc_training_failures();
                self.commit(CommittedModel::degraded(stats));
                self.logger.log_training_failure(&reason, FALLBACK_ACCURACY);
                TrainOutcome::Degraded { reason }
            }
        }
    }

    /// Discard the current fit and train again
    pub async fn retrain(&self) -> TrainOutcome {
        info!("Forcing model retrain");
        self.train().await
    }

    async fn fit(&self, dataset: Dataset) -> Result<(CommittedModel, FitReport)> {
        if dataset.is_empty() {
            return Err(ModelError::EmptyDataset.into());
        }
        let stats = dataset.stats();

        let features: Vec<FeatureVector> = dataset.samples.iter().map(|s| s.features).collect();
        let params = NormalizationParams::fit(&features).ok_or(ModelError::EmptyDataset)?;
        let x = params.apply_batch(&features);
        let y: Array1<f64> = dataset.samples.iter().map(|s| s.label_value()).collect();

        let options = self.config.fit_options();
        let seed = self.config.seed;
        let (network, report) = tokio::task::spawn_blocking(move || {
            let mut network = RiskNetwork::new(seed);
            let report = network.fit(&x, &y, &options)?;
            Ok::<_, ModelError>((network, report))
        })
        .await
        .map_err(|e| ModelError::Task(e.to_string()))?
        .context("Failed to fit risk network")?;

        let committed = CommittedModel {
            network: Some(network),
            normalization: Some(params),
            trained: true,
            accuracy: report.accuracy.clamp(0.0, 1.0),
            dataset_stats: stats,
            trained_at: Some(Utc::now()),
        };
        Ok((committed, report))
    }

    /// Persist the committed network and metadata; false on any failure
    pub async fn save(&self) -> bool {
        let committed = self.current();
        let Some(network) = committed.network.as_ref() else {
            debug!("No network committed, nothing to save");
            return false;
        };

        let result = self.persist(network, &committed).await;
        if let Err(e) = &result {
            warn!(error = %format!("{:#}", e), "Failed to save risk model");
        }
        self.logger.log_model_saved(result.is_ok());
        result.is_ok()
    }

    async fn persist(&self, network: &RiskNetwork, committed: &CommittedModel) -> Result<()> {
        let weights = network.to_bytes()?;
        let metadata = serde_json::to_vec(&ModelMetadata::from_committed(committed))
            .context("Failed to serialize model metadata")?;

        self.put(WEIGHTS_KEY, weights).await?;
        self.put(METADATA_KEY, metadata).await
    }

    async fn put(&self, key: &'static str, bytes: Vec<u8>) -> Result<()> {
        let store = self.store.as_ref();
        with_retry(&self.io_policy, key, move || {
            let bytes = bytes.clone();
            async move { store.put(key, bytes).await.map_err(anyhow::Error::from) }
        })
        .await
    }

    async fn get(&self, key: &'static str) -> Result<Option<Vec<u8>>> {
        let store = self.store.as_ref();
        with_retry(&self.io_policy, key, move || async move {
            store.get(key).await.map_err(anyhow::Error::from)
        })
        .await
    }

    /// Restore a stored model; false when there is none to use
    pub async fn load(&self) -> bool {
        let weights = match self.get(WEIGHTS_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("No stored risk model found");
                return false;
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Failed to read stored weights");
                return false;
            }
        };

        let network = match RiskNetwork::from_bytes(&weights) {
            Ok(network) => network,
            Err(e) => {
                warn!(error = %e, "Stored weights are unusable");
                return false;
            }
        };

        let metadata = self.load_metadata().await;
        if !metadata.is_trained {
            info!("Stored model was never trained");
            return false;
        }

        self.logger
            .log_model_loaded(metadata.accuracy, &metadata.dataset_stats.source);
        self.commit(CommittedModel {
            network: Some(network),
            normalization: metadata.normalization_params,
            trained: true,
            accuracy: metadata.accuracy.clamp(0.0, 1.0),
            dataset_stats: metadata.dataset_stats,
            trained_at: metadata.trained_at,
        });
        true
    }

    async fn load_metadata(&self) -> ModelMetadata {
        let bytes = match self.get(METADATA_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!("Model metadata missing, using defaults");
                return ModelMetadata::restored();
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Failed to read model metadata, using defaults");
                return ModelMetadata::restored();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(error = %e, "Model metadata is corrupt, using defaults");
            ModelMetadata::restored()
        })
    }

    pub fn stats(&self) -> ModelStats {
        let committed = self.current();
        ModelStats {
            is_trained: committed.trained,
            is_training: self.is_training(),
            model_ready: committed.is_ready(),
            consecutive_nan: self.consecutive_nan.load(Ordering::Acquire),
            trained_at: committed.trained_at,
            ..ModelStats::from_dataset(&committed.dataset_stats, committed.accuracy)
        }
    }

    pub fn normalization_params(&self) -> Option<NormalizationParams> {
        self.current().normalization
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataSourceError;
    use crate::models::TrainingSample;
    use crate::store::MemoryStore;
    use crate::training::{SyntheticConfig, TrainingSource};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            epochs: 3,
            seed: Some(17),
            ..Default::default()
        }
    }

    fn synthetic(samples: usize) -> TrainingDataProvider {
        TrainingDataProvider::synthetic_only(SyntheticConfig {
            sample_count: samples,
            seed: Some(17),
        })
    }

    fn model_with(store: Arc<dyn ModelStore>) -> ScoringModel {
        ScoringModel::new(quick_config(), synthetic(200), store)
    }

    fn rush_hour() -> FeatureVector {
        FeatureVector::from([38.0, 85.0, 90.0, 10.0, 17.0])
    }

    struct NanSource;

    #[async_trait]
    impl TrainingSource for NanSource {
        fn name(&self) -> &str {
            "nan"
        }

        async fn load(&self) -> Result<Vec<TrainingSample>, DataSourceError> {
            Ok((0..20)
                .map(|i| TrainingSample::new(FeatureVector::from([f64::NAN; 5]), i % 2 == 0))
                .collect())
        }
    }

    /// Blocks `load` until released
    struct GatedSource {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl TrainingSource for GatedSource {
        fn name(&self) -> &str {
            "gated"
        }

        async fn load(&self) -> Result<Vec<TrainingSample>, DataSourceError> {
            self.gate.notified().await;
            Ok((0..40)
                .map(|i| {
                    TrainingSample::new(
                        FeatureVector::from([i as f64, 50.0, 10.0, 8.0, (i % 24) as f64]),
                        i % 3 == 0,
                    )
                })
                .collect())
        }
    }

    /// First `load` returns at once; later loads block until released and
    /// return a shifted dataset
    struct GatedRetrainSource {
        loads: AtomicU64,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl TrainingSource for GatedRetrainSource {
        fn name(&self) -> &str {
            "gated-retrain"
        }

        async fn load(&self) -> Result<Vec<TrainingSample>, DataSourceError> {
            let call = self.loads.fetch_add(1, Ordering::AcqRel);
            if call > 0 {
                self.gate.notified().await;
            }
            let shift = call as f64 * 25.0;
            Ok((0..60)
                .map(|i| {
                    TrainingSample::new(
                        FeatureVector::from([
                            i as f64 + shift,
                            40.0 + (i % 30) as f64,
                            5.0 * (i % 12) as f64,
                            8.0,
                            (i % 24) as f64,
                        ]),
                        i % 3 == 0,
                    )
                })
                .collect())
        }
    }

    #[test]
    fn test_untrained_uses_fallback() {
        let model = model_with(Arc::new(MemoryStore::new()));
        let prediction = model.predict(&rush_hour()).unwrap();
        assert!(prediction.used_fallback);
        assert!((prediction.probability - 0.65).abs() < 1e-9);
        assert!(!model.stats().is_trained);
        assert_eq!(model.stats().data_source, "untrained");
    }

    #[tokio::test]
    async fn test_train_commits_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let model = model_with(store.clone());

        let outcome = model.train().await;
        let TrainOutcome::Trained(report) = outcome else {
            panic!("expected trained outcome, got {:?}", outcome);
        };
        assert_eq!(report.samples, 200);
        assert_eq!(report.source, "simulated_enhanced");
        assert_eq!(report.epochs, 3);
        assert!(report.persisted);

        let stats = model.stats();
        assert!(stats.is_trained && stats.model_ready && !stats.is_training);
        assert!((0.0..=1.0).contains(&stats.accuracy));
        assert!(model.normalization_params().is_some());

        let prediction = model.predict(&rush_hour()).unwrap();
        assert!(!prediction.used_fallback);
        assert!((0.0..=1.0).contains(&prediction.probability));

        let metadata: ModelMetadata =
            serde_json::from_slice(&store.get(METADATA_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(metadata.version, MODEL_FORMAT_VERSION);
        assert!(metadata.is_trained);
        assert_eq!(metadata.normalization_params, model.normalization_params());
    }

    #[tokio::test]
    async fn test_load_restores_identical_predictions() {
        let store: Arc<dyn ModelStore> = Arc::new(MemoryStore::new());
        let trained = model_with(store.clone());
        assert!(trained.train().await.is_trained());

        let restored = model_with(store);
        assert!(restored.load().await);
        assert_eq!(
            trained.predict(&rush_hour()).unwrap(),
            restored.predict(&rush_hour()).unwrap()
        );
        assert_eq!(restored.stats().accuracy, trained.stats().accuracy);
    }

    #[tokio::test]
    async fn test_load_without_stored_model() {
        let model = model_with(Arc::new(MemoryStore::new()));
        assert!(!model.load().await);
        assert!(!model.stats().is_trained);
    }

    #[tokio::test]
    async fn test_weights_without_metadata_use_defaults() {
        let store = Arc::new(MemoryStore::new());
        let weights = RiskNetwork::new(Some(1)).to_bytes().unwrap();
        store.put(WEIGHTS_KEY, weights).await.unwrap();
        store.put(METADATA_KEY, b"{not json".to_vec()).await.unwrap();

        let model = model_with(store);
        assert!(model.load().await);

        let stats = model.stats();
        assert!(stats.model_ready);
        assert_eq!(stats.accuracy, 0.0);
        assert_eq!(stats.data_source, "restored");
        assert!(model.normalization_params().is_none());
        assert!(!model.predict(&rush_hour()).unwrap().used_fallback);
    }

    #[tokio::test]
    async fn test_untrained_metadata_is_not_loaded() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(WEIGHTS_KEY, RiskNetwork::new(Some(1)).to_bytes().unwrap())
            .await
            .unwrap();
        let metadata = ModelMetadata {
            is_trained: false,
            ..ModelMetadata::restored()
        };
        store
            .put(METADATA_KEY, serde_json::to_vec(&metadata).unwrap())
            .await
            .unwrap();

        assert!(!model_with(store).load().await);
    }

    #[tokio::test]
    async fn test_corrupt_weights_are_not_loaded() {
        let store = Arc::new(MemoryStore::new());
        store.put(WEIGHTS_KEY, b"garbage".to_vec()).await.unwrap();
        assert!(!model_with(store).load().await);
    }

    #[tokio::test]
    async fn test_failed_training_degrades_to_rules() {
        let provider = TrainingDataProvider::new(Arc::new(NanSource), SyntheticConfig::default());
        let store = Arc::new(MemoryStore::new());
        let model = ScoringModel::new(quick_config(), provider, store.clone());

        let outcome = model.train().await;
        assert!(matches!(outcome, TrainOutcome::Degraded { .. }));

        let stats = model.stats();
        assert!(stats.is_trained);
        assert!(!stats.model_ready);
        assert_eq!(stats.accuracy, FALLBACK_ACCURACY);
        assert_eq!(stats.data_source, "fallback_enhanced");
        assert!(model.predict(&rush_hour()).unwrap().used_fallback);
        assert!(store.is_empty());
    }

    #[test]
    fn test_nan_output_falls_back_and_counts() {
        let config = TrainingConfig {
            nan_alert_threshold: 2,
            ..quick_config()
        };
        let model = ScoringModel::new(config, synthetic(10), Arc::new(MemoryStore::new()));
        model.commit(CommittedModel {
            network: Some(RiskNetwork::new(Some(1))),
            normalization: Some(NormalizationParams {
                means: [f64::NAN; 5],
                stds: [1.0; 5],
            }),
            trained: true,
            accuracy: 0.8,
            dataset_stats: DatasetStats::new(10, "csv_real", "test"),
            trained_at: None,
        });

        for _ in 0..3 {
            let prediction = model.predict(&rush_hour()).unwrap();
            assert!(prediction.used_fallback);
            assert!((prediction.probability - 0.65).abs() < 1e-9);
        }
        assert_eq!(model.stats().consecutive_nan, 3);
    }

    #[tokio::test]
    async fn test_concurrent_train_is_rejected() {
        let gate = Arc::new(Notify::new());
        let provider = TrainingDataProvider::new(
            Arc::new(GatedSource { gate: gate.clone() }),
            SyntheticConfig::default(),
        )
        .with_policy(IoPolicy {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_delay: Duration::ZERO,
        });
        let model = Arc::new(ScoringModel::new(
            quick_config(),
            provider,
            Arc::new(MemoryStore::new()),
        ));

        let first = tokio::spawn({
            let model = model.clone();
            async move { model.train().await }
        });

        while !model.is_training() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert_eq!(model.train().await, TrainOutcome::AlreadyTraining);
        assert!(model.normalization_params().is_none());
        assert_eq!(model.stats().accuracy, 0.0);

        gate.notify_one();
        let outcome = first.await.unwrap();
        assert!(outcome.is_trained());
        assert!(!model.is_training());
        assert!(model.normalization_params().is_some());
    }

    #[tokio::test]
    async fn test_scoring_during_retrain_uses_committed_model() {
        let gate = Arc::new(Notify::new());
        let source = GatedRetrainSource {
            loads: AtomicU64::new(0),
            gate: gate.clone(),
        };
        let provider = TrainingDataProvider::new(Arc::new(source), SyntheticConfig::default())
            .with_policy(IoPolicy {
                timeout: Duration::from_secs(30),
                max_retries: 0,
                retry_delay: Duration::ZERO,
            });
        let model = Arc::new(ScoringModel::new(
            quick_config(),
            provider,
            Arc::new(MemoryStore::new()),
        ));

        assert!(model.train().await.is_trained());
        let params_before = model.normalization_params();
        let before = model.predict(&rush_hour()).unwrap();
        assert!(!before.used_fallback);

        let retrain = tokio::spawn({
            let model = model.clone();
            async move { model.retrain().await }
        });
        while !model.is_training() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let during = model.predict(&rush_hour()).unwrap();
        assert_eq!(during, before);
        assert_eq!(model.normalization_params(), params_before);

        gate.notify_one();
        assert!(retrain.await.unwrap().is_trained());
        assert!(model.normalization_params().is_some());
        assert_ne!(model.normalization_params(), params_before);
    }
}
