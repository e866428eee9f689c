//! Candle — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle for one instrument and interval.
///
/// `open_time` is the interval start in epoch milliseconds. A still-forming
/// candle and its later updates share the same `open_time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reasons a candle is rejected at the window boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("non-finite {field} in candle at open_time {open_time}")]
    NonFinite { field: &'static str, open_time: i64 },

    #[error("negative volume {volume} in candle at open_time {open_time}")]
    NegativeVolume { volume: f64, open_time: i64 },

    #[error("inconsistent range in candle at open_time {open_time}: {detail}")]
    InconsistentRange { open_time: i64, detail: String },
}

impl Candle {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check the field and range invariants:
    /// all fields finite, volume >= 0, high >= max(open, close, low),
    /// low <= min(open, close, high).
    pub fn validate(&self) -> Result<(), CandleError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(CandleError::NonFinite {
                    field,
                    open_time: self.open_time,
                });
            }
        }

        if self.volume < 0.0 {
            return Err(CandleError::NegativeVolume {
                volume: self.volume,
                open_time: self.open_time,
            });
        }

        if self.high < self.low {
            return Err(self.range_error(format!("high {} < low {}", self.high, self.low)));
        }
        if self.high < self.open.max(self.close) {
            return Err(self.range_error(format!(
                "high {} below body (open {}, close {})",
                self.high, self.open, self.close
            )));
        }
        if self.low > self.open.min(self.close) {
            return Err(self.range_error(format!(
                "low {} above body (open {}, close {})",
                self.low, self.open, self.close
            )));
        }

        Ok(())
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Interval start as a UTC timestamp. `None` if out of chrono's range.
    pub fn open_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }

    fn range_error(&self, detail: String) -> CandleError {
        CandleError::InconsistentRange {
            open_time: self.open_time,
            detail,
        }
    }
}
