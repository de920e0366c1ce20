//! Bounded risk history and trend tracking

use crate::models::{RiskLevel, RiskResult, TelemetrySnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of entries kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Entries per trend window
const TREND_WINDOW: usize = 5;

/// Mean difference below which the trend is stable
const TREND_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEntry {
    pub probability: f64,
    pub level: RiskLevel,
    pub timestamp: DateTime<Utc>,
    pub sensor_data: TelemetrySnapshot,
}

impl RiskEntry {
    pub fn new(result: &RiskResult, snapshot: &TelemetrySnapshot) -> Self {
        Self {
            probability: result.probability,
            level: result.level,
            timestamp: result.timestamp,
            sensor_data: snapshot.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskStats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub trend: Trend,
    pub total_records: usize,
}

/// Current risk plus recorded history, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    pub current: f64,
    pub history: Vec<RiskEntry>,
    /// Absent when nothing has been recorded
    pub stats: Option<RiskStats>,
}

/// Ring buffer of risk entries, newest at index 0
#[derive(Debug, Clone)]
pub struct RiskHistory {
    entries: VecDeque<RiskEntry>,
    capacity: usize,
}

impl RiskHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert at the front, evicting the oldest entries past capacity
    pub fn push(&mut self, entry: RiskEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = &RiskEntry> {
        self.entries.iter()
    }

    pub fn newest(&self, limit: usize) -> Vec<RiskEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn stats(&self) -> Option<RiskStats> {
        if self.entries.is_empty() {
            return None;
        }
        let probabilities: Vec<f64> = self.entries.iter().map(|e| e.probability).collect();
        let total = probabilities.len();

        Some(RiskStats {
            average: probabilities.iter().sum::<f64>() / total as f64,
            max: probabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: probabilities.iter().copied().fold(f64::INFINITY, f64::min),
            trend: trend_of(&probabilities),
            total_records: total,
        })
    }
}

impl Default for RiskHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Compare the newest window of probabilities against the one before it
pub fn trend_of(newest_first: &[f64]) -> Trend {
    let recent = &newest_first[..newest_first.len().min(TREND_WINDOW)];
    let older_end = newest_first.len().min(2 * TREND_WINDOW);
    let older = newest_first.get(recent.len()..older_end).unwrap_or(&[]);

    if recent.is_empty() || older.is_empty() {
        return Trend::Stable;
    }

    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
    let diff = mean(recent) - mean(older);

    if diff.abs() < TREND_TOLERANCE {
        Trend::Stable
    } else if diff > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    }
}
