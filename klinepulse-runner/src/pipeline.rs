//! Per-key pipeline: upsert → recompute → score → publish.
//!
//! [`Pipeline`] runs one synchronous cycle per candle. [`spawn_pipeline`]
//! wraps it in a task that drains a command queue, so cycles for one key are
//! strictly sequential while different keys run in parallel. Every payload is
//! computed from the window snapshot taken under the same lock as the upsert
//! that triggered it.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::feed::CandleUpdate;
use crate::hub::DistributionHub;
use crate::payload::Payload;
use klinepulse_core::window::BackfillReport;
use klinepulse_core::{
    compute_snapshot, score, Candle, IndicatorConfig, ScoringConfig, SignalType, WindowError,
    WindowKey, WindowStore,
};

/// Commands accepted by a running pipeline.
#[derive(Debug)]
pub enum PipelineCommand {
    /// Historical candles, oldest first.
    Backfill(Vec<Candle>),
    /// One live update.
    Update(CandleUpdate),
    /// Upstream fault; published as an ERROR payload.
    FeedFault(String),
    /// Finish queued work, then stop.
    Shutdown,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline for {key} has stopped")]
    Closed { key: WindowKey },

    #[error("pipeline task for {key} failed: {reason}")]
    TaskFailed { key: WindowKey, reason: String },
}

/// Running counters for one pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub cycles: u64,
    pub rejected: u64,
    pub faults: u64,
    /// Sum of subscribers reached over all publishes.
    pub deliveries: u64,
    pub last_open_time: Option<i64>,
    pub last_signal: Option<SignalType>,
}

/// Synchronous cycle for one key.
pub struct Pipeline {
    key: WindowKey,
    store: Arc<WindowStore>,
    indicators: IndicatorConfig,
    scoring: ScoringConfig,
}

impl Pipeline {
    pub fn new(
        key: WindowKey,
        store: Arc<WindowStore>,
        indicators: IndicatorConfig,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            key,
            store,
            indicators,
            scoring,
        }
    }

    pub fn key(&self) -> &WindowKey {
        &self.key
    }

    /// Upsert one candle and build the payload for the resulting window.
    /// A rejected candle leaves the window unchanged and yields no payload.
    pub fn cycle(&self, candle: Candle) -> Result<Payload, WindowError> {
        let (_, candles) = self.store.upsert_and_snapshot(&self.key, candle)?;
        Ok(self.payload_for(candles))
    }

    /// Load history and build the payload for the resulting window.
    pub fn backfill(&self, candles: Vec<Candle>) -> (BackfillReport, Payload) {
        let report = self.store.extend(&self.key, candles);
        let payload = self.payload_for(self.store.snapshot(&self.key));
        (report, payload)
    }

    /// ERROR payload over the current window.
    pub fn fault(&self, message: impl Into<String>) -> Payload {
        let candles = self.store.snapshot(&self.key);
        let snapshot = compute_snapshot(&candles, &self.indicators);
        Payload::fault(&self.key, candles, snapshot, message)
    }

    fn payload_for(&self, candles: Vec<Candle>) -> Payload {
        let snapshot = compute_snapshot(&candles, &self.indicators);
        let price = candles.last().map_or(f64::NAN, |c| c.close);
        let signal = score(&snapshot, price, &self.scoring);
        Payload::new(&self.key, candles, snapshot, signal)
    }
}

/// Handle to a spawned pipeline task.
#[derive(Debug)]
pub struct PipelineHandle {
    key: WindowKey,
    tx: mpsc::Sender<PipelineCommand>,
    stats: Arc<Mutex<PipelineStats>>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn key(&self) -> &WindowKey {
        &self.key
    }

    pub fn sender(&self) -> mpsc::Sender<PipelineCommand> {
        self.tx.clone()
    }

    pub async fn send(&self, command: PipelineCommand) -> Result<(), PipelineError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| PipelineError::Closed {
                key: self.key.clone(),
            })
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.lock().clone()
    }

    /// Queue a shutdown behind any pending commands and wait for the task.
    pub async fn shutdown(self) -> Result<PipelineStats, PipelineError> {
        // Already stopped is fine; the join below still reports panics.
        let _ = self.tx.send(PipelineCommand::Shutdown).await;
        self.task.await.map_err(|e| PipelineError::TaskFailed {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        let stats = self.stats.lock().clone();
        Ok(stats)
    }
}

/// Spawn `pipeline` as a task publishing to `hub` on the key's topic.
pub fn spawn_pipeline(
    pipeline: Pipeline,
    hub: Arc<DistributionHub<Payload>>,
    buffer: usize,
) -> PipelineHandle {
    let key = pipeline.key().clone();
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let stats = Arc::new(Mutex::new(PipelineStats::default()));
    let task = tokio::spawn(run(pipeline, hub, rx, Arc::clone(&stats)));
    PipelineHandle {
        key,
        tx,
        stats,
        task,
    }
}

async fn run(
    pipeline: Pipeline,
    hub: Arc<DistributionHub<Payload>>,
    mut rx: mpsc::Receiver<PipelineCommand>,
    stats: Arc<Mutex<PipelineStats>>,
) {
    let key = pipeline.key().clone();
    let topic = key.topic();
    info!(%key, "pipeline started");

    while let Some(command) = rx.recv().await {
        let payload = match command {
            PipelineCommand::Backfill(candles) => {
                let requested = candles.len();
                let (report, payload) = pipeline.backfill(candles);
                info!(
                    %key,
                    requested,
                    accepted = report.accepted,
                    rejected = report.rejected.len(),
                    "backfill loaded"
                );
                stats.lock().rejected += report.rejected.len() as u64;
                payload
            }
            PipelineCommand::Update(update) => match pipeline.cycle(update.candle) {
                Ok(payload) => payload,
                Err(e) => {
                    debug!(%key, closed = update.closed, error = %e, "update skipped");
                    stats.lock().rejected += 1;
                    continue;
                }
            },
            PipelineCommand::FeedFault(message) => {
                error!(%key, error = %message, "feed fault");
                stats.lock().faults += 1;
                pipeline.fault(message)
            }
            PipelineCommand::Shutdown => break,
        };

        let last_open_time = payload.last_open_time();
        let signal_type = payload.signal.signal_type;
        if signal_type == SignalType::Error {
            warn!(%key, reason = %payload.signal.reason, "publishing ERROR signal");
        }
        let delivered = hub.publish(&topic, payload);

        let mut s = stats.lock();
        s.cycles += 1;
        s.deliveries += delivered as u64;
        s.last_open_time = last_open_time;
        s.last_signal = Some(signal_type);
    }

    let s = stats.lock().clone();
    info!(%key, cycles = s.cycles, rejected = s.rejected, faults = s.faults, "pipeline stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(t: i64, close: f64) -> Candle {
        Candle::new(t, close, close + 1.0, close - 1.0, close, 10.0)
    }

    fn pipeline(store: Arc<WindowStore>) -> Pipeline {
        Pipeline::new(
            WindowKey::new("BTCUSDT", "1m"),
            store,
            IndicatorConfig::default(),
            ScoringConfig::default(),
        )
    }

    #[test]
    fn cycle_builds_payload_from_post_upsert_window() {
        let store = Arc::new(WindowStore::new(3));
        let p = pipeline(Arc::clone(&store));
        for t in 1..=4 {
            p.cycle(candle(t, 100.0 + t as f64)).unwrap();
        }
        let payload = p.cycle(candle(4, 200.0)).unwrap();
        let times: Vec<i64> = payload.klines.iter().map(|c| c.open_time).collect();
        assert_eq!(times, vec![2, 3, 4]);
        assert_eq!(payload.indicators.timestamps, times);
        assert_eq!(payload.klines[2].close, 200.0);
        assert_eq!(payload.symbol, "BTCUSDT");
    }

    #[test]
    fn rejected_candle_yields_no_payload() {
        let store = Arc::new(WindowStore::new(10));
        let p = pipeline(Arc::clone(&store));
        p.cycle(candle(5, 100.0)).unwrap();
        assert!(p.cycle(candle(4, 100.0)).is_err());
        assert_eq!(store.snapshot(p.key()).len(), 1);
    }

    #[test]
    fn empty_backfill_publishes_error_signal() {
        let p = pipeline(Arc::new(WindowStore::new(10)));
        let (report, payload) = p.backfill(Vec::new());
        assert_eq!(report.accepted, 0);
        assert_eq!(payload.signal.signal_type, SignalType::Error);
        assert!(payload.indicators.error.is_some());
    }

    #[test]
    fn backfill_skips_malformed_and_out_of_order_rows() {
        let p = pipeline(Arc::new(WindowStore::new(10)));
        let mut broken = candle(3, 103.0);
        broken.close = f64::NAN;
        let rows = vec![
            candle(1, 101.0),
            candle(2, 102.0),
            broken,
            candle(1, 99.0),
            candle(4, 104.0),
        ];

        let (report, payload) = p.backfill(rows);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.rejected.len(), 2);
        assert!(matches!(report.rejected[0], WindowError::Malformed(_)));
        assert!(matches!(report.rejected[1], WindowError::OutOfOrder { open_time: 1, .. }));
        let times: Vec<i64> = payload.klines.iter().map(|c| c.open_time).collect();
        assert_eq!(times, vec![1, 2, 4]);
        assert!(payload.klines.iter().all(|c| c.close.is_finite()));
    }

    #[test]
    fn fault_keeps_window() {
        let p = pipeline(Arc::new(WindowStore::new(10)));
        p.cycle(candle(1, 100.0)).unwrap();
        let payload = p.fault("upstream timed out");
        assert_eq!(payload.klines.len(), 1);
        assert_eq!(payload.signal.signal_type, SignalType::Error);
        assert_eq!(payload.signal.reason, "upstream timed out");
    }

    #[tokio::test]
    async fn actor_processes_in_order_and_shuts_down() {
        let store = Arc::new(WindowStore::new(50));
        let hub = Arc::new(DistributionHub::new());
        let key = WindowKey::new("BTCUSDT", "1m");
        let sub = hub.subscribe(&key.topic());

        let handle = spawn_pipeline(pipeline(Arc::clone(&store)), Arc::clone(&hub), 8);
        handle
            .send(PipelineCommand::Backfill(vec![candle(1, 100.0), candle(2, 101.0)]))
            .await
            .unwrap();
        handle
            .send(PipelineCommand::Update(CandleUpdate::forming(candle(3, 102.0))))
            .await
            .unwrap();
        handle
            .send(PipelineCommand::Update(CandleUpdate::closed(candle(1, 99.0))))
            .await
            .unwrap();
        handle
            .send(PipelineCommand::FeedFault("socket closed".to_string()))
            .await
            .unwrap();

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.faults, 1);
        assert_eq!(stats.deliveries, 3);
        assert_eq!(stats.last_open_time, Some(3));
        assert_eq!(stats.last_signal, Some(SignalType::Error));

        let latest = sub.latest().unwrap();
        assert_eq!(latest.signal.reason, "socket closed");
        assert_eq!(latest.klines.len(), 3);
    }

    #[tokio::test]
    async fn send_after_shutdown_is_closed() {
        let hub = Arc::new(DistributionHub::new());
        let handle = spawn_pipeline(pipeline(Arc::new(WindowStore::new(10))), hub, 1);
        let tx = handle.sender();
        handle.shutdown().await.unwrap();
        assert!(tx.send(PipelineCommand::Shutdown).await.is_err());
    }
}
