//! Seeded random-walk feed.
//!
//! Each key gets its own deterministic walk (seed = BLAKE3 of the key's
//! topic), so history and live updates for the same key always line up and
//! repeated runs produce identical candles.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::{CandleFeed, CandleUpdate, FeedError, LiveStream};
use klinepulse_core::{Candle, WindowKey};

#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    pub start_price: f64,
    /// Open time of candle 0, epoch ms.
    pub origin_ms: i64,
    pub interval_ms: i64,
    /// Closed candles that exist before the live stream starts.
    pub history_candles: usize,
    /// Forming updates emitted before each closing update.
    pub ticks_per_candle: usize,
    /// Largest relative move of one candle.
    pub max_move: f64,
    /// Delay between live updates.
    pub pace: Option<Duration>,
    /// Stop the live stream after this many candles.
    pub max_candles: Option<usize>,
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self {
            start_price: 100.0,
            origin_ms: 1_700_000_000_000,
            interval_ms: 60_000,
            history_candles: 500,
            ticks_per_candle: 3,
            max_move: 0.02,
            pace: None,
            max_candles: None,
        }
    }
}

/// Walk state for one key.
struct Walk {
    rng: StdRng,
    price: f64,
    index: usize,
}

impl Walk {
    fn new(feed: &SyntheticFeed, key: &WindowKey) -> Self {
        let seed: [u8; 32] = *blake3::hash(key.topic().as_bytes()).as_bytes();
        Self {
            rng: StdRng::from_seed(seed),
            price: feed.start_price,
            index: 0,
        }
    }

    /// Next candle as its sequence of updates: `ticks` forming, then closed.
    fn next_candle(&mut self, feed: &SyntheticFeed) -> Vec<CandleUpdate> {
        let open_time = feed.origin_ms + self.index as i64 * feed.interval_ms;
        let open = self.price;
        let ret: f64 = self.rng.gen_range(-feed.max_move..feed.max_move);
        let close = open * (1.0 + ret);
        let total_volume: f64 = self.rng.gen_range(10.0..1000.0);

        let steps = feed.ticks_per_candle + 1;
        let mut updates = Vec::with_capacity(steps);
        let mut high = open;
        let mut low = open;
        for step in 1..=steps {
            let frac = step as f64 / steps as f64;
            let last = if step == steps {
                close
            } else {
                let noise: f64 = self.rng.gen_range(-0.25..0.25) * (close - open).abs();
                open + (close - open) * frac + noise
            };
            let wick: f64 = self.rng.gen_range(0.0..0.002);
            high = high.max(last * (1.0 + wick));
            low = low.min(last * (1.0 - wick));
            let candle = Candle::new(open_time, open, high, low, last, total_volume * frac);
            updates.push(CandleUpdate {
                candle,
                closed: step == steps,
            });
        }

        self.price = close;
        self.index += 1;
        updates
    }

    fn next_closed(&mut self, feed: &SyntheticFeed) -> Option<Candle> {
        self.next_candle(feed).last().map(|u| u.candle)
    }
}

impl SyntheticFeed {
    /// History candles for `key`, generated synchronously.
    pub fn history(&self, key: &WindowKey) -> Vec<Candle> {
        let mut walk = Walk::new(self, key);
        (0..self.history_candles)
            .filter_map(|_| walk.next_closed(self))
            .collect()
    }
}

#[async_trait]
impl CandleFeed for SyntheticFeed {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch_history(
        &self,
        key: &WindowKey,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError> {
        let candles = self.history(key);
        let skip = candles.len().saturating_sub(limit);
        Ok(candles[skip..].to_vec())
    }

    async fn subscribe_live(&self, key: &WindowKey) -> Result<LiveStream, FeedError> {
        let feed = self.clone();
        let key = key.clone();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut walk = Walk::new(&feed, &key);
            for _ in 0..feed.history_candles {
                walk.next_candle(&feed);
            }

            let mut emitted = 0usize;
            while feed.max_candles.map_or(true, |max| emitted < max) {
                for update in walk.next_candle(&feed) {
                    if let Some(pace) = feed.pace {
                        tokio::time::sleep(pace).await;
                    }
                    if tx.send(Ok(update)).await.is_err() {
                        debug!(%key, emitted, "synthetic consumer went away");
                        return;
                    }
                }
                emitted += 1;
            }
            debug!(%key, emitted, "synthetic stream finished");
        });

        Ok(rx)
    }
}
