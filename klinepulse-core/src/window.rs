//! Candle window store — bounded per-key candle history.
//!
//! Each (symbol, interval) key owns one [`Window`]: candles ordered by
//! `open_time`, at most `capacity` long, oldest evicted first.
//!
//! Upsert rule for an incoming candle vs. the last stored one:
//! - window empty or `open_time` greater → append (evict oldest if full)
//! - `open_time` equal → replace the last candle in place (still-forming update)
//! - `open_time` smaller → rejected as out-of-order, window untouched
//!
//! The store is shared across keys but every key has its own lock, so
//! mutations of one key never wait on another.

use crate::domain::{Candle, CandleError, WindowKey};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors from a window upsert. The window is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("malformed candle: {0}")]
    Malformed(#[from] CandleError),

    #[error("out-of-order candle: open_time {open_time} is before last stored {last_open_time}")]
    OutOfOrder { open_time: i64, last_open_time: i64 },
}

/// What an accepted upsert did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New candle appended. `evicted` holds the open_time pushed out, if any.
    Appended { evicted: Option<i64> },
    /// Last candle replaced in place.
    Replaced,
}

/// Result of loading a batch of candles into a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillReport {
    pub accepted: usize,
    pub rejected: Vec<WindowError>,
}

/// Bounded ordered candle sequence for a single key.
#[derive(Debug, Clone)]
pub struct Window {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be >= 1");
        Self {
            capacity,
            candles: VecDeque::with_capacity(capacity),
        }
    }

    pub fn upsert(&mut self, candle: Candle) -> Result<UpsertOutcome, WindowError> {
        candle.validate()?;

        match self.candles.back_mut() {
            Some(last) if candle.open_time == last.open_time => {
                *last = candle;
                Ok(UpsertOutcome::Replaced)
            }
            Some(last) if candle.open_time < last.open_time => Err(WindowError::OutOfOrder {
                open_time: candle.open_time,
                last_open_time: last.open_time,
            }),
            _ => {
                let evicted = if self.candles.len() == self.capacity {
                    self.candles.pop_front().map(|c| c.open_time)
                } else {
                    None
                };
                self.candles.push_back(candle);
                Ok(UpsertOutcome::Appended { evicted })
            }
        }
    }

    /// Immutable copy of the current ordered sequence.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Keyed window store. Capacity is fixed per store and shared by all keys.
#[derive(Debug)]
pub struct WindowStore {
    capacity: usize,
    windows: RwLock<HashMap<WindowKey, Arc<Mutex<Window>>>>,
}

impl WindowStore {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be >= 1");
        Self {
            capacity,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Upsert a candle into the window for `key`, creating the window lazily.
    pub fn upsert(&self, key: &WindowKey, candle: Candle) -> Result<UpsertOutcome, WindowError> {
        self.upsert_and_snapshot(key, candle).map(|(outcome, _)| outcome)
    }

    /// Upsert and return the snapshot taken under the same lock, so the caller
    /// sees exactly the window its own mutation produced.
    pub fn upsert_and_snapshot(
        &self,
        key: &WindowKey,
        candle: Candle,
    ) -> Result<(UpsertOutcome, Vec<Candle>), WindowError> {
        // Malformed candles never create a window.
        if let Err(e) = candle.validate() {
            warn!(%key, open_time = candle.open_time, error = %e, "rejected malformed candle");
            return Err(e.into());
        }

        let entry = self.entry(key);
        let mut window = entry.lock();
        match window.upsert(candle) {
            Ok(outcome) => Ok((outcome, window.snapshot())),
            Err(e) => {
                warn!(%key, open_time = candle.open_time, error = %e, "rejected candle");
                Err(e)
            }
        }
    }

    /// Load an ordered batch (historical backfill). Rejected candles are
    /// reported and skipped; the rest are applied in order.
    pub fn extend(
        &self,
        key: &WindowKey,
        candles: impl IntoIterator<Item = Candle>,
    ) -> BackfillReport {
        let entry = self.entry(key);
        let mut window = entry.lock();
        let mut report = BackfillReport::default();
        for candle in candles {
            match window.upsert(candle) {
                Ok(_) => report.accepted += 1,
                Err(e) => {
                    warn!(%key, open_time = candle.open_time, error = %e, "backfill candle rejected");
                    report.rejected.push(e);
                }
            }
        }
        report
    }

    /// Snapshot of the window for `key`. Unknown keys yield an empty sequence.
    pub fn snapshot(&self, key: &WindowKey) -> Vec<Candle> {
        let entry = self.windows.read().get(key).cloned();
        entry.map(|w| w.lock().snapshot()).unwrap_or_default()
    }

    /// Drop the window for `key`. Returns true if one existed.
    pub fn remove(&self, key: &WindowKey) -> bool {
        self.windows.write().remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<WindowKey> {
        let mut keys: Vec<WindowKey> = self.windows.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.windows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.read().is_empty()
    }

    fn entry(&self, key: &WindowKey) -> Arc<Mutex<Window>> {
        if let Some(entry) = self.windows.read().get(key) {
            return Arc::clone(entry);
        }
        let mut windows = self.windows.write();
        Arc::clone(
            windows
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Window::new(self.capacity)))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open_time: i64, close: f64) -> Candle {
        Candle::new(open_time, close, close + 1.0, close - 1.0, close, 10.0)
    }

    fn key() -> WindowKey {
        WindowKey::new("BTCUSDT", "1m")
    }

    fn open_times(candles: &[Candle]) -> Vec<i64> {
        candles.iter().map(|c| c.open_time).collect()
    }

    #[test]
    fn capacity_three_keeps_latest_three() {
        let store = WindowStore::new(3);
        for t in 1..=4 {
            store.upsert(&key(), candle(t, 100.0 + t as f64)).unwrap();
        }
        assert_eq!(open_times(&store.snapshot(&key())), vec![2, 3, 4]);
    }

    #[test]
    fn eviction_is_reported() {
        let mut window = Window::new(2);
        assert_eq!(
            window.upsert(candle(1, 10.0)).unwrap(),
            UpsertOutcome::Appended { evicted: None }
        );
        window.upsert(candle(2, 11.0)).unwrap();
        assert_eq!(
            window.upsert(candle(3, 12.0)).unwrap(),
            UpsertOutcome::Appended { evicted: Some(1) }
        );
    }

    #[test]
    fn equal_open_time_replaces_last() {
        let store = WindowStore::new(10);
        store.upsert(&key(), candle(1, 100.0)).unwrap();
        store.upsert(&key(), candle(2, 101.0)).unwrap();
        let outcome = store.upsert(&key(), candle(2, 105.0)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced);

        let snap = store.snapshot(&key());
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[1].close, 105.0);
        assert_eq!(snap[0].close, 100.0);
    }

    #[test]
    fn out_of_order_is_rejected_and_window_unchanged() {
        let store = WindowStore::new(10);
        store.upsert(&key(), candle(5, 100.0)).unwrap();
        store.upsert(&key(), candle(6, 101.0)).unwrap();
        let before = store.snapshot(&key());

        let err = store.upsert(&key(), candle(4, 99.0)).unwrap_err();
        assert_eq!(
            err,
            WindowError::OutOfOrder {
                open_time: 4,
                last_open_time: 6
            }
        );
        assert_eq!(store.snapshot(&key()), before);
    }

    #[test]
    fn malformed_candle_is_rejected() {
        let store = WindowStore::new(10);
        let mut bad = candle(1, 100.0);
        bad.high = f64::NAN;
        assert!(matches!(
            store.upsert(&key(), bad),
            Err(WindowError::Malformed(_))
        ));
        // Rejected before the key was created.
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_key_snapshot_is_empty() {
        let store = WindowStore::new(10);
        assert!(store.snapshot(&WindowKey::new("NOPE", "1h")).is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let store = WindowStore::new(10);
        let eth = WindowKey::new("ETHUSDT", "1m");
        store.upsert(&key(), candle(10, 100.0)).unwrap();
        // A lower open_time on another key is fine.
        store.upsert(&eth, candle(1, 2000.0)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.keys(), vec![key(), eth]);
    }

    #[test]
    fn extend_reports_rejections() {
        let store = WindowStore::new(10);
        let report = store.extend(&key(), vec![candle(1, 1.0), candle(3, 3.0), candle(2, 2.0)]);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(open_times(&store.snapshot(&key())), vec![1, 3]);
    }

    #[test]
    fn upsert_and_snapshot_returns_post_mutation_view() {
        let store = WindowStore::new(2);
        store.upsert(&key(), candle(1, 1.0)).unwrap();
        store.upsert(&key(), candle(2, 2.0)).unwrap();
        let (_, snap) = store.upsert_and_snapshot(&key(), candle(3, 3.0)).unwrap();
        assert_eq!(open_times(&snap), vec![2, 3]);
    }

    #[test]
    fn remove_drops_window() {
        let store = WindowStore::new(4);
        store.upsert(&key(), candle(1, 1.0)).unwrap();
        assert!(store.remove(&key()));
        assert!(!store.remove(&key()));
        assert!(store.snapshot(&key()).is_empty());
    }
}
