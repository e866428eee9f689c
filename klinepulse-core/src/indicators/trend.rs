//! Trend status from a fast/slow SMA pair (default 50/200).
//!
//! UPTREND where SMA(fast) > SMA(slow), DOWNTREND where <, FLAT otherwise,
//! including any position where either average is still warming up.
//! Both averages use the full-period warm-up.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Sma;
use crate::components::indicator::{Indicator, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendLabel {
    Uptrend,
    Downtrend,
    Flat,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendLabel::Uptrend => write!(f, "UPTREND"),
            TrendLabel::Downtrend => write!(f, "DOWNTREND"),
            TrendLabel::Flat => write!(f, "FLAT"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendStatus {
    fast: usize,
    slow: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendStatusSeries {
    pub current: TrendLabel,
    /// Latest SMA(fast) > SMA(slow); `None` while either is unavailable.
    pub fast_above_slow: Option<bool>,
    pub details: Vec<TrendLabel>,
}

impl TrendStatus {
    pub fn new(fast: usize, slow: usize) -> Self {
        Self { fast, slow }
    }

    pub fn lookback(&self) -> usize {
        self.fast.max(self.slow).saturating_sub(1)
    }

    pub fn compute(&self, candles: &[Candle]) -> Result<TrendStatusSeries, IndicatorError> {
        let fast = Sma::strict(self.fast).compute(candles)?;
        let slow = Sma::strict(self.slow).compute(candles)?;

        let details: Vec<TrendLabel> = fast
            .iter()
            .zip(&slow)
            .map(|(&f, &s)| {
                if f > s {
                    TrendLabel::Uptrend
                } else if f < s {
                    TrendLabel::Downtrend
                } else {
                    // equal, or a NaN on either side
                    TrendLabel::Flat
                }
            })
            .collect();

        let fast_above_slow = match (fast.last(), slow.last()) {
            (Some(f), Some(s)) if !f.is_nan() && !s.is_nan() => Some(f > s),
            _ => None,
        };

        Ok(TrendStatusSeries {
            current: details.last().copied().unwrap_or(TrendLabel::Flat),
            fast_above_slow,
            details,
        })
    }
}

impl Default for TrendStatus {
    fn default() -> Self {
        Self::new(50, 200)
    }
}
