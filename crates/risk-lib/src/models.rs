//! Core data models for the risk predictor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of features consumed by the scoring model
pub const FEATURE_COUNT: usize = 5;

/// Feature names in vector order. Training and inference share this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["temperature", "humidity", "windSpeed", "visibility", "hour"];

/// Telemetry snapshot pushed by the vehicle feed
///
/// Every field is optional on the wire; the feature extractor substitutes
/// defaults for the ones the model needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led: Option<serde_json::Value>,
    #[serde(
        default,
        rename = "engine_state",
        alias = "engineState",
        skip_serializing_if = "Option::is_none"
    )]
    pub engine_state: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Value>,
}

impl TelemetrySnapshot {
    /// Snapshot carrying only the fields the scoring model reads
    pub fn conditions(temperature: f64, humidity: f64, speed: f64) -> Self {
        Self {
            temperature: Some(temperature),
            humidity: Some(humidity),
            speed: Some(speed),
            ..Default::default()
        }
    }
}

/// Feature vector for risk scoring
///
/// Serialized as a plain `[temperature, humidity, windSpeed, visibility, hour]`
/// array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; FEATURE_COUNT]", into = "[f64; FEATURE_COUNT]")]
pub struct FeatureVector {
    pub temperature: f64,
    pub humidity: f64,
    /// Vehicle speed stands in for wind speed
    pub wind_speed: f64,
    pub visibility: f64,
    pub hour: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.temperature,
            self.humidity,
            self.wind_speed,
            self.visibility,
            self.hour,
        ]
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            temperature: values[0],
            humidity: values[1],
            wind_speed: values[2],
            visibility: values[3],
            hour: values[4],
        }
    }
}

impl From<FeatureVector> for [f64; FEATURE_COUNT] {
    fn from(features: FeatureVector) -> Self {
        features.to_array()
    }
}

/// Labeled example for training the scoring model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    /// True when an accident occurred under these conditions
    pub label: bool,
}

impl TrainingSample {
    pub fn new(features: FeatureVector, label: bool) -> Self {
        Self { features, label }
    }

    pub fn label_value(&self) -> f64 {
        if self.label {
            1.0
        } else {
            0.0
        }
    }
}

/// Discrete risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk assessment returned for every scoring call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    pub probability: f64,
    pub level: RiskLevel,
    pub features: FeatureVector,
    pub timestamp: DateTime<Utc>,
    /// Set when the rule-based scorer produced the probability
    pub is_fallback: bool,
}

/// Summary of the dataset a model was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    pub total_samples: usize,
    pub features: Vec<String>,
    pub description: String,
    pub source: String,
}

impl DatasetStats {
    pub fn new(total_samples: usize, source: &str, description: &str) -> Self {
        Self {
            total_samples,
            features: FEATURE_NAMES.iter().map(|f| f.to_string()).collect(),
            description: description.to_string(),
            source: source.to_string(),
        }
    }

    pub fn untrained() -> Self {
        Self::new(0, "untrained", "Model not trained")
    }
}

impl Default for DatasetStats {
    fn default() -> Self {
        Self::untrained()
    }
}
