//! Training data acquisition
//!
//! This module provides:
//! - A pluggable source of historical accident records (CSV by default)
//! - A synthetic generator used when no usable real data exists
//! - The provider that picks between them

mod csv;
mod synthetic;

pub use csv::{parse_dataset, parse_line, CsvSource};
pub use synthetic::{accident_probability, SyntheticConfig, SyntheticGenerator};

use crate::error::DataSourceError;
use crate::models::{DatasetStats, TrainingSample};
use crate::retry::{with_retry, IoPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Fewest usable rows a real source must yield before it is trusted
pub const MIN_REAL_ROWS: usize = 10;

/// A source of labeled historical samples
#[async_trait]
pub trait TrainingSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Load every usable sample from the source
    async fn load(&self) -> Result<Vec<TrainingSample>, DataSourceError>;
}

/// Where a dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetSource {
    /// Historical records from a real source
    Real,
    /// Output of the synthetic generator
    Synthetic,
}

impl DatasetSource {
    pub fn tag(&self) -> &'static str {
        match self {
            DatasetSource::Real => "csv_real",
            DatasetSource::Synthetic => "simulated_enhanced",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DatasetSource::Real => "Historical accident records",
            DatasetSource::Synthetic => "Realistic simulated conditions",
        }
    }
}

/// A labeled dataset ready for training
#[derive(Debug, Clone)]
pub struct Dataset {
    pub samples: Vec<TrainingSample>,
    pub source: DatasetSource,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn stats(&self) -> DatasetStats {
        DatasetStats::new(self.len(), self.source.tag(), self.source.description())
    }

    /// Fraction of samples labeled as accidents
    pub fn positive_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let positives = self.samples.iter().filter(|s| s.label).count();
        positives as f64 / self.samples.len() as f64
    }
}

/// Produces training data, preferring the real source
pub struct TrainingDataProvider {
    primary: Option<Arc<dyn TrainingSource>>,
    synthetic: SyntheticGenerator,
    policy: IoPolicy,
    min_rows: usize,
}

impl TrainingDataProvider {
    /// Provider that only generates synthetic data
    pub fn synthetic_only(config: SyntheticConfig) -> Self {
        Self {
            primary: None,
            synthetic: SyntheticGenerator::new(config),
            policy: IoPolicy::default(),
            min_rows: MIN_REAL_ROWS,
        }
    }

    /// Provider that tries `source` first
    pub fn new(source: Arc<dyn TrainingSource>, config: SyntheticConfig) -> Self {
        Self {
            primary: Some(source),
            ..Self::synthetic_only(config)
        }
    }

    pub fn with_policy(mut self, policy: IoPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Obtain a dataset; never fails
    pub async fn provide(&self) -> Dataset {
        if let Some(source) = &self.primary {
            match self.load_real(source.as_ref()).await {
                Ok(samples) => {
                    info!(source = source.name(), samples = samples.len(), "Loaded real training data");
                    return Dataset {
                        samples,
                        source: DatasetSource::Real,
                    };
                }
                Err(e) => {
                    warn!(
                        source = source.name(),
                        error = %format!("{:#}", e),
                        "Real training data unavailable, generating synthetic data"
                    );
                }
            }
        }

        let samples = self.synthetic.generate();
        info!(samples = samples.len(), "Generated synthetic training data");
        Dataset {
            samples,
            source: DatasetSource::Synthetic,
        }
    }

    async fn load_real(&self, source: &dyn TrainingSource) -> anyhow::Result<Vec<TrainingSample>> {
        let samples = with_retry(&self.policy, "load training data", move || async move {
            source.load().await.map_err(anyhow::Error::from)
        })
        .await?;

        if samples.len() < self.min_rows {
            return Err(DataSourceError::Insufficient {
                rows: samples.len(),
                required: self.min_rows,
            }
            .into());
        }
        Ok(samples)
    }
}
