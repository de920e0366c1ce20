//! Feature extraction for risk scoring
//!
//! Maps a telemetry snapshot onto the fixed-order feature vector shared by
//! training and inference. The hour component comes from an injected clock.

use crate::models::{FeatureVector, TelemetrySnapshot};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Timelike};
use std::sync::Arc;

pub const DEFAULT_TEMPERATURE: f64 = 20.0;
pub const DEFAULT_HUMIDITY: f64 = 50.0;
pub const DEFAULT_SPEED: f64 = 0.0;
pub const DEFAULT_VISIBILITY_KM: f64 = 10.0;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Reads the local system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self(at)
    }

    /// A fixed day at `hour:00` UTC
    pub fn at_hour(hour: u32) -> Self {
        let at = NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(hour % 24, 0, 0))
            .unwrap_or_default()
            .and_utc()
            .fixed_offset();
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Extracts model features from telemetry snapshots
#[derive(Clone)]
pub struct FeatureExtractor {
    clock: Arc<dyn Clock>,
}

impl FeatureExtractor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn extract(&self, snapshot: &TelemetrySnapshot) -> FeatureVector {
        FeatureVector {
            temperature: or_default(snapshot.temperature, DEFAULT_TEMPERATURE),
            humidity: or_default(snapshot.humidity, DEFAULT_HUMIDITY),
            wind_speed: or_default(snapshot.speed, DEFAULT_SPEED),
            visibility: or_default(snapshot.visibility, DEFAULT_VISIBILITY_KM),
            hour: self.clock.now().hour() as f64,
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

fn or_default(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}
