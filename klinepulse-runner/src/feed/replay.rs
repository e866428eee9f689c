//! Replays recorded update sequences as a feed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::{collapse_updates, CandleFeed, CandleUpdate, FeedError, LiveStream};
use crate::loader::Recording;
use klinepulse_core::{Candle, WindowKey};

/// In-memory recordings keyed by stream. The first `backfill` updates of each
/// recording are served as history; the rest are replayed live.
#[derive(Debug, Clone, Default)]
pub struct ReplayFeed {
    streams: HashMap<WindowKey, Vec<CandleUpdate>>,
    backfill: usize,
    pace: Option<Duration>,
}

impl ReplayFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, key: WindowKey, updates: Vec<CandleUpdate>) -> Self {
        self.streams.insert(key, updates);
        self
    }

    pub fn with_recording(self, key: WindowKey, recording: Recording) -> Self {
        self.with_stream(key, recording.updates)
    }

    pub fn with_backfill(mut self, updates: usize) -> Self {
        self.backfill = updates;
        self
    }

    /// Delay between live updates. `None` replays as fast as the consumer reads.
    pub fn with_pace(mut self, pace: Option<Duration>) -> Self {
        self.pace = pace;
        self
    }

    fn stream(&self, key: &WindowKey) -> Result<&[CandleUpdate], FeedError> {
        self.streams
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| FeedError::UnknownKey { key: key.clone() })
    }
}

#[async_trait]
impl CandleFeed for ReplayFeed {
    fn name(&self) -> &str {
        "replay"
    }

    async fn fetch_history(
        &self,
        key: &WindowKey,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError> {
        let updates = self.stream(key)?;
        let head = &updates[..self.backfill.min(updates.len())];
        let candles = collapse_updates(head);
        let skip = candles.len().saturating_sub(limit);
        Ok(candles[skip..].to_vec())
    }

    async fn subscribe_live(&self, key: &WindowKey) -> Result<LiveStream, FeedError> {
        let updates = self.stream(key)?;
        let live: Vec<CandleUpdate> = updates[self.backfill.min(updates.len())..].to_vec();
        let pace = self.pace;
        let key = key.clone();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let total = live.len();
            for update in live {
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
                if tx.send(Ok(update)).await.is_err() {
                    debug!(%key, "replay consumer went away");
                    return;
                }
            }
            debug!(%key, total, "replay finished");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> WindowKey {
        WindowKey::new("BTCUSDT", "1m")
    }

    fn updates() -> Vec<CandleUpdate> {
        let c = |t: i64, close: f64| Candle::new(t, close, close + 1.0, close - 1.0, close, 1.0);
        vec![
            CandleUpdate::closed(c(1, 10.0)),
            CandleUpdate::forming(c(2, 11.0)),
            CandleUpdate::closed(c(2, 12.0)),
            CandleUpdate::closed(c(3, 13.0)),
            CandleUpdate::forming(c(4, 14.0)),
        ]
    }

    #[tokio::test]
    async fn history_collapses_forming_updates() {
        let feed = ReplayFeed::new().with_stream(key(), updates()).with_backfill(3);
        let history = feed.fetch_history(&key(), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].close, 12.0);

        let limited = feed.fetch_history(&key(), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].open_time, 2);
    }

    #[tokio::test]
    async fn live_replays_remaining_updates_then_ends() {
        let feed = ReplayFeed::new().with_stream(key(), updates()).with_backfill(3);
        let mut rx = feed.subscribe_live(&key()).await.unwrap();
        let mut seen = Vec::new();
        while let Some(update) = rx.recv().await {
            seen.push(update.unwrap().candle.open_time);
        }
        assert_eq!(seen, vec![3, 4]);
    }

    #[tokio::test]
    async fn unknown_key_is_error() {
        let feed = ReplayFeed::new();
        let err = feed.fetch_history(&key(), 10).await.unwrap_err();
        assert!(matches!(err, FeedError::UnknownKey { .. }));
        assert!(feed.subscribe_live(&key()).await.is_err());
    }
}
