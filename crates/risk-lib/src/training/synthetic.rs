//! Synthetic accident records
//!
//! Conditions are drawn uniformly over plausible ranges and labeled by
//! sampling against a hand-tuned accident probability.

use crate::models::{FeatureVector, TrainingSample};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Synthetic generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of samples to generate
    pub sample_count: usize,
    /// Fixed seed for reproducible datasets
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_count: 5000,
            seed: None,
        }
    }
}

fn is_rush_hour(hour: f64) -> bool {
    (7.0..=9.0).contains(&hour) || (16.0..=19.0).contains(&hour)
}

fn is_late_night(hour: f64) -> bool {
    hour >= 21.0 || hour <= 5.0
}

/// Probability of an accident under the given conditions
pub fn accident_probability(f: &FeatureVector) -> f64 {
    let mut risk = 0.03;

    if f.temperature > 35.0 || f.temperature < 0.0 {
        risk += 0.25;
    }
    if f.humidity > 85.0 {
        risk += 0.15;
    }
    if f.wind_speed > 25.0 {
        risk += 0.20;
    }
    if f.visibility < 2.0 {
        risk += 0.30;
    }
    if is_rush_hour(f.hour) {
        risk += 0.25;
    }
    if is_late_night(f.hour) {
        risk += 0.20;
    }

    // Compounding conditions
    if f.visibility < 3.0 && is_late_night(f.hour) {
        risk += 0.15;
    }
    if f.humidity > 80.0 && f.temperature < 0.0 {
        risk += 0.10;
    }
    if f.wind_speed > 20.0 && f.visibility < 5.0 {
        risk += 0.10;
    }

    risk
}

/// Generates labeled samples from [`accident_probability`]
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    config: SyntheticConfig,
}

impl SyntheticGenerator {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self) -> Vec<TrainingSample> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        (0..self.config.sample_count)
            .map(|_| {
                let features = FeatureVector {
                    temperature: rng.gen_range(-5.0..40.0),
                    humidity: rng.gen_range(0.0..100.0),
                    wind_speed: rng.gen_range(0.0..40.0),
                    visibility: rng.gen_range(0.5..12.5),
                    hour: f64::from(rng.gen_range(0u32..24)),
                };
                let label = rng.gen::<f64>() < accident_probability(&features);
                TrainingSample::new(features, label)
            })
            .collect()
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}
