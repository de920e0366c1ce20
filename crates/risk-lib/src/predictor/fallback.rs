//! Rule-based risk scoring used when the network is unavailable

use crate::models::FeatureVector;

const BASE_RISK: f64 = 0.05;
const MIN_RISK: f64 = 0.05;
const MAX_RISK: f64 = 0.95;

/// Deterministic rule-based scorer
///
/// Comparisons against NaN are false, so a NaN feature contributes nothing.
pub struct FallbackScorer;

impl FallbackScorer {
    pub fn score(features: &FeatureVector) -> f64 {
        let mut risk = BASE_RISK;

        if features.temperature > 35.0 || features.temperature < 0.0 {
            risk += 0.20;
        }
        if features.humidity > 80.0 {
            risk += 0.15;
        }
        if features.wind_speed > 15.0 {
            risk += 0.10;
        }
        if features.visibility < 3.0 {
            risk += 0.25;
        }
        if (16.0..=19.0).contains(&features.hour) {
            risk += 0.15;
        }
        if features.hour >= 21.0 || features.hour <= 6.0 {
            risk += 0.15;
        }

        risk.clamp(MIN_RISK, MAX_RISK)
    }
}
