//! Agent configuration

use anyhow::{Context, Result};
use risk_lib::predictor::{MonitorConfig, PredictorConfig, TrainingConfig};
use risk_lib::training::{CsvSource, SyntheticConfig, TrainingDataProvider};
use std::sync::Arc;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration, read from `RISK_AGENT_*` environment variables
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentConfig {
    /// Identifier attached to log events
    #[serde(default = "default_vehicle_id")]
    pub vehicle_id: String,

    /// API server port for risk, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding persisted model weights and metadata
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Historical accident records; synthetic data is used when unset
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,

    /// Field separator of the dataset file
    #[serde(default = "default_dataset_delimiter")]
    pub dataset_delimiter: char,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Monitor scoring interval in seconds
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    #[serde(default = "default_training_epochs")]
    pub training_epochs: usize,

    #[serde(default = "default_synthetic_samples")]
    pub synthetic_samples: usize,

    /// Consecutive NaN predictions before an alert
    #[serde(default = "default_nan_alert_threshold")]
    pub nan_alert_threshold: u64,

    /// Fixed seed for training and synthetic data
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_vehicle_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "vehicle".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./model")
}

fn default_dataset_delimiter() -> char {
    ','
}

fn default_history_capacity() -> usize {
    100
}

fn default_update_interval() -> u64 {
    5
}

fn default_training_epochs() -> usize {
    100
}

fn default_synthetic_samples() -> usize {
    5000
}

fn default_nan_alert_threshold() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vehicle_id: default_vehicle_id(),
            api_port: default_api_port(),
            model_dir: default_model_dir(),
            dataset_path: None,
            dataset_delimiter: default_dataset_delimiter(),
            history_capacity: default_history_capacity(),
            update_interval_secs: default_update_interval(),
            training_epochs: default_training_epochs(),
            synthetic_samples: default_synthetic_samples(),
            nan_alert_threshold: default_nan_alert_threshold(),
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("RISK_AGENT").try_parsing(true))
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Invalid RISK_AGENT configuration")
    }

    pub fn predictor_config(&self) -> PredictorConfig {
        PredictorConfig {
            max_history: self.history_capacity,
            vehicle_id: self.vehicle_id.clone(),
            ..Default::default()
        }
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.training_epochs,
            seed: self.seed,
            nan_alert_threshold: self.nan_alert_threshold,
            ..Default::default()
        }
    }

    pub fn synthetic_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            sample_count: self.synthetic_samples,
            seed: self.seed,
        }
    }

    /// Training data from the configured dataset, falling back to synthetic
    pub fn training_provider(&self) -> TrainingDataProvider {
        match &self.dataset_path {
            Some(path) => TrainingDataProvider::new(
                Arc::new(CsvSource::new(path).with_delimiter(self.dataset_delimiter)),
                self.synthetic_config(),
            ),
            None => TrainingDataProvider::synthetic_only(self.synthetic_config()),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            update_interval: Duration::from_secs(self.update_interval_secs.max(1)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_uses_defaults() {
        let config = AgentConfig::from_config(config::Config::default()).unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.update_interval_secs, 5);
        assert_eq!(config.training_epochs, 100);
        assert_eq!(config.synthetic_samples, 5000);
        assert!(config.dataset_path.is_none());
        assert_eq!(config.dataset_delimiter, ',');
    }

    #[test]
    fn test_overrides() {
        let source = config::Config::builder()
            .set_override("api_port", 9090)
            .unwrap()
            .set_override("dataset_path", "/data/accidents.csv")
            .unwrap()
            .set_override("history_capacity", 20)
            .unwrap()
            .set_override("dataset_delimiter", ";")
            .unwrap()
            .build()
            .unwrap();
        let config = AgentConfig::from_config(source).unwrap();

        assert_eq!(config.api_port, 9090);
        assert_eq!(
            config.dataset_path,
            Some(PathBuf::from("/data/accidents.csv"))
        );
        assert_eq!(config.dataset_delimiter, ';');
        assert_eq!(config.predictor_config().max_history, 20);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let source = config::Config::builder()
            .set_override("api_port", "not-a-port")
            .unwrap()
            .build()
            .unwrap();
        assert!(AgentConfig::from_config(source).is_err());
    }

    #[test]
    fn test_derived_configs() {
        let config = AgentConfig {
            update_interval_secs: 0,
            seed: Some(3),
            ..Default::default()
        };
        assert_eq!(config.monitor_config().update_interval, Duration::from_secs(1));
        assert_eq!(config.training_config().seed, Some(3));
        assert_eq!(config.synthetic_config().sample_count, 5000);
    }
}
