//! Window / topic key: one (symbol, interval) stream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one independent pipeline: a symbol on a candle interval.
///
/// Symbols are normalised to upper case so `btcusdt` and `BTCUSDT` address
/// the same window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub symbol: String,
    pub interval: String,
}

impl WindowKey {
    pub fn new(symbol: impl AsRef<str>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.as_ref().to_uppercase(),
            interval: interval.into(),
        }
    }

    /// Topic name used by the distribution hub: `klines:{symbol}:{interval}`.
    pub fn topic(&self) -> String {
        format!("klines:{}:{}", self.symbol, self.interval)
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}
