//! Probability to risk level mapping

use crate::models::RiskLevel;
use serde::{Deserialize, Serialize};

/// Upper bounds (exclusive) of the low, medium and high bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.3,
            medium: 0.6,
            high: 0.8,
        }
    }
}

/// Buckets probabilities into risk levels
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskClassifier {
    thresholds: RiskThresholds,
}

impl RiskClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// Total over f64; NaN lands in the top band.
    pub fn classify(&self, probability: f64) -> RiskLevel {
        let t = &self.thresholds;
        if probability < t.low {
            RiskLevel::Low
        } else if probability < t.medium {
            RiskLevel::Medium
        } else if probability < t.high {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }
}
