//! Signal scoring — indicator snapshot + latest price → discrete signal.
//!
//! The scorer holds no state between calls: the same snapshot and price
//! always produce the same `Signal`.

pub mod rules;
pub mod scorer;

pub use rules::{evaluate, Condition, Direction, Evidence, Rule};
pub use scorer::score;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::indicators::TrendLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
    Error,
}

impl SignalType {
    pub fn direction(self) -> Option<Direction> {
        match self {
            SignalType::StrongBuy | SignalType::Buy => Some(Direction::Bullish),
            SignalType::StrongSell | SignalType::Sell => Some(Direction::Bearish),
            SignalType::Hold | SignalType::Error => None,
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalType::StrongBuy => "STRONG_BUY",
            SignalType::Buy => "BUY",
            SignalType::Hold => "HOLD",
            SignalType::Sell => "SELL",
            SignalType::StrongSell => "STRONG_SELL",
            SignalType::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Latest indicator values the conditions were evaluated on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalDetails {
    pub price: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub vwap: Option<f64>,
    pub cloud_top: Option<f64>,
    pub cloud_bottom: Option<f64>,
    pub tenkan: Option<f64>,
    pub kijun: Option<f64>,
    /// (level fraction, price) of the Fibonacci level closest to price.
    pub nearest_fib: Option<(f64, f64)>,
    pub trend: Option<TrendLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub reliability: f64,
    /// Sorted, de-duplicated tags joined with ", "; "Neutral" if none fired.
    /// For ERROR signals, the underlying error message.
    pub reason: String,
    pub tags: Vec<String>,
    pub details: SignalDetails,
}

impl Signal {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            signal_type: SignalType::Error,
            reliability: 0.0,
            reason: message.into(),
            tags: Vec::new(),
            details: SignalDetails::default(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.signal_type == SignalType::Error
    }
}
