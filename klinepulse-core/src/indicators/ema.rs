//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1],
//! alpha = 2 / (period + 1), seeded from the first available close.
//! Available from the first candle, like the SMA.

use super::{closes, ewm};
use crate::components::indicator::{check_period, Indicator, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Result<Vec<f64>, IndicatorError> {
        check_period("ema", "period", self.period)?;
        Ok(ema_of_series(&closes(candles), self.period, 1))
    }
}

/// EMA of an arbitrary series with span `period`, masked until
/// `min_periods` observations. Used by MACD for gated lines.
pub fn ema_of_series(values: &[f64], period: usize, min_periods: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    ewm(values, alpha, min_periods)
}
