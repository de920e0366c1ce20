//! Risk prediction engine

mod classifier;
mod engine;
mod fallback;
mod features;
mod history;
mod model;
mod monitor;
mod network;
mod normalizer;

pub use classifier::{RiskClassifier, RiskThresholds};
pub use engine::{PredictorConfig, RiskPredictor, SystemStatus};
pub use fallback::FallbackScorer;
pub use features::{
    Clock, FeatureExtractor, FixedClock, SystemClock, DEFAULT_HUMIDITY, DEFAULT_SPEED,
    DEFAULT_TEMPERATURE, DEFAULT_VISIBILITY_KM,
};
pub use history::{
    trend_of, HistoryReport, RiskEntry, RiskHistory, RiskStats, Trend, DEFAULT_HISTORY_CAPACITY,
};
pub use model::{
    CommittedModel, ModelMetadata, ModelStats, Prediction, ScoringModel, TrainOutcome,
    TrainingConfig, TrainingReport, FALLBACK_ACCURACY, MODEL_FORMAT_VERSION,
};
pub use monitor::{MonitorConfig, MonitorStats, RiskMonitor, DEFAULT_UPDATE_INTERVAL};
pub use network::{
    Activation, DenseLayer, EpochMetrics, FitOptions, FitReport, LayerSpec, RiskNetwork,
    DEFAULT_ARCHITECTURE,
};
pub use normalizer::NormalizationParams;
