//! Periodic risk scoring over the telemetry feed
//!
//! Holds the most recent snapshot and scores it once per tick when new data
//! has arrived since the previous tick. Results go out on a channel.

use super::engine::RiskPredictor;
use crate::models::{RiskResult, TelemetrySnapshot};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default scoring interval
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between scoring passes
    pub update_interval: Duration,
    /// Buffered results before new ones are dropped
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            channel_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStats {
    pub snapshots_received: u64,
    pub risks_published: u64,
    pub results_dropped: u64,
    pub idle_ticks: u64,
    pub last_result: Option<RiskResult>,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    idle: AtomicU64,
}

/// Feeds telemetry to a [`RiskPredictor`] on a fixed cadence
pub struct RiskMonitor {
    predictor: Arc<RiskPredictor>,
    config: MonitorConfig,
    pending: Mutex<Option<TelemetrySnapshot>>,
    last_result: RwLock<Option<RiskResult>>,
    result_tx: mpsc::Sender<RiskResult>,
    counters: Counters,
}

impl RiskMonitor {
    pub fn new(
        predictor: Arc<RiskPredictor>,
        config: MonitorConfig,
    ) -> (Self, mpsc::Receiver<RiskResult>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let monitor = Self {
            predictor,
            config,
            pending: Mutex::new(None),
            last_result: RwLock::new(None),
            result_tx: tx,
            counters: Counters::default(),
        };
        (monitor, rx)
    }

    /// Replace the snapshot waiting to be scored
    pub async fn ingest(&self, snapshot: TelemetrySnapshot) {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        *self.pending.lock().await = Some(snapshot);
    }

    /// Run until `shutdown` fires
    ///
    /// Snapshots arrive through `feed` when given, and through [`ingest`]
    /// in any case.
    ///
    /// [`ingest`]: RiskMonitor::ingest
    pub async fn run(
        self: Arc<Self>,
        mut feed: Option<mpsc::Receiver<TelemetrySnapshot>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(
            interval_ms = self.config.update_interval.as_millis() as u64,
            subscribed = feed.is_some(),
            "Starting risk monitor"
        );

        let mut ticker = interval(self.config.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.score_pending().await;
                }
                snapshot = next_snapshot(&mut feed) => match snapshot {
                    Some(snapshot) => self.ingest(snapshot).await,
                    None => {
                        warn!("Telemetry feed closed, accepting pushed snapshots only");
                        feed = None;
                    }
                },
                _ = shutdown.recv() => {
                    info!("Shutting down risk monitor");
                    break;
                }
            }
        }
    }

    /// Score the pending snapshot, if any, and publish the result
    pub async fn score_pending(&self) -> Option<RiskResult> {
        let Some(snapshot) = self.pending.lock().await.take() else {
            self.counters.idle.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let result = self.predictor.calculate_risk(&snapshot).await;
        *self.last_result.write().await = Some(result.clone());

        match self.result_tx.try_send(result.clone()) {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Risk result not delivered");
            }
        }
        Some(result)
    }

    pub async fn last_result(&self) -> Option<RiskResult> {
        self.last_result.read().await.clone()
    }

    pub async fn stats(&self) -> MonitorStats {
        MonitorStats {
            snapshots_received: self.counters.received.load(Ordering::Relaxed),
            risks_published: self.counters.published.load(Ordering::Relaxed),
            results_dropped: self.counters.dropped.load(Ordering::Relaxed),
            idle_ticks: self.counters.idle.load(Ordering::Relaxed),
            last_result: self.last_result().await,
        }
    }
}

async fn next_snapshot(
    feed: &mut Option<mpsc::Receiver<TelemetrySnapshot>>,
) -> Option<TelemetrySnapshot> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{FixedClock, PredictorConfig, ScoringModel, TrainingConfig};
    use crate::store::MemoryStore;
    use crate::training::{SyntheticConfig, TrainingDataProvider};

    fn predictor() -> Arc<RiskPredictor> {
        let model = ScoringModel::new(
            TrainingConfig::default(),
            TrainingDataProvider::synthetic_only(SyntheticConfig {
                sample_count: 20,
                seed: Some(1),
            }),
            Arc::new(MemoryStore::new()),
        );
        Arc::new(RiskPredictor::new(
            PredictorConfig::default(),
            model,
            Arc::new(FixedClock::at_hour(17)),
        ))
    }

    fn fast_config(channel_capacity: usize) -> MonitorConfig {
        MonitorConfig {
            update_interval: Duration::from_millis(10),
            channel_capacity,
        }
    }

    #[tokio::test]
    async fn test_scores_only_new_snapshots() {
        let (monitor, mut rx) = RiskMonitor::new(predictor(), fast_config(8));

        assert!(monitor.score_pending().await.is_none());

        monitor
            .ingest(TelemetrySnapshot::conditions(38.0, 85.0, 90.0))
            .await;
        let scored = monitor.score_pending().await.unwrap();
        assert!((scored.probability - 0.65).abs() < 1e-9);
        assert_eq!(rx.recv().await.unwrap(), scored);

        assert!(monitor.score_pending().await.is_none());

        let stats = monitor.stats().await;
        assert_eq!(stats.snapshots_received, 1);
        assert_eq!(stats.risks_published, 1);
        assert_eq!(stats.idle_ticks, 2);
        assert_eq!(stats.last_result, Some(scored));
    }

    #[tokio::test]
    async fn test_latest_snapshot_wins() {
        let (monitor, _rx) = RiskMonitor::new(predictor(), fast_config(8));
        monitor.ingest(TelemetrySnapshot::conditions(20.0, 50.0, 0.0)).await;
        monitor.ingest(TelemetrySnapshot::conditions(20.0, 50.0, 80.0)).await;

        let scored = monitor.score_pending().await.unwrap();
        assert_eq!(scored.features.wind_speed, 80.0);
    }

    #[tokio::test]
    async fn test_full_channel_drops_results() {
        let (monitor, _rx) = RiskMonitor::new(predictor(), fast_config(1));
        for _ in 0..3 {
            monitor.ingest(TelemetrySnapshot::default()).await;
            monitor.score_pending().await;
        }

        let stats = monitor.stats().await;
        assert_eq!(stats.risks_published, 1);
        assert_eq!(stats.results_dropped, 2);
    }

    #[tokio::test]
    async fn test_run_consumes_feed_until_shutdown() {
        let (monitor, mut rx) = RiskMonitor::new(predictor(), fast_config(8));
        let monitor = Arc::new(monitor);
        let (feed_tx, feed_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(monitor.clone().run(Some(feed_rx), shutdown_rx));

        feed_tx
            .send(TelemetrySnapshot::conditions(-4.0, 90.0, 10.0))
            .await
            .unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.features.temperature, -4.0);

        // Closing the feed leaves push ingestion working
        drop(feed_tx);
        monitor.ingest(TelemetrySnapshot::conditions(10.0, 40.0, 5.0)).await;
        let result = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.features.temperature, 10.0);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
