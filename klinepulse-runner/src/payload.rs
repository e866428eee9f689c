//! The message delivered to subscribers on every recompute.

use serde::{Deserialize, Serialize};

use klinepulse_core::{Candle, IndicatorSnapshot, Signal, WindowKey};

/// `{symbol, interval, klines, indicators, signal}` for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub symbol: String,
    pub interval: String,
    pub klines: Vec<Candle>,
    pub indicators: IndicatorSnapshot,
    pub signal: Signal,
}

impl Payload {
    pub fn new(
        key: &WindowKey,
        klines: Vec<Candle>,
        indicators: IndicatorSnapshot,
        signal: Signal,
    ) -> Self {
        Self {
            symbol: key.symbol.clone(),
            interval: key.interval.clone(),
            klines,
            indicators,
            signal,
        }
    }

    /// Payload for an upstream fault: the last good window and indicators,
    /// with an ERROR signal carrying the fault as its reason.
    pub fn fault(
        key: &WindowKey,
        klines: Vec<Candle>,
        indicators: IndicatorSnapshot,
        message: impl Into<String>,
    ) -> Self {
        Self::new(key, klines, indicators, Signal::error(message))
    }

    pub fn key(&self) -> WindowKey {
        WindowKey::new(&self.symbol, self.interval.clone())
    }

    pub fn last_open_time(&self) -> Option<i64> {
        self.klines.last().map(|c| c.open_time)
    }
}
