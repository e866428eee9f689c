//! Stochastic oscillator.
//!
//! %K = 100 * (close - lowest_low) / (highest_high - lowest_low) over `k_period`.
//! %D = full-period SMA of %K over `d_period`.
//! A zero range leaves %K unavailable at that position.

use super::{closes, highs, lows, rolling_max, rolling_mean, rolling_min, safe_div};
use crate::components::indicator::{check_period, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticLines {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

impl Stochastic {
    pub fn new(k_period: usize, d_period: usize) -> Self {
        Self { k_period, d_period }
    }

    pub fn k_period(&self) -> usize {
        self.k_period
    }

    pub fn d_period(&self) -> usize {
        self.d_period
    }

    /// Lookback of %D: %K needs k_period - 1, then d_period - 1 more.
    pub fn lookback(&self) -> usize {
        (self.k_period + self.d_period).saturating_sub(2)
    }

    pub fn compute(&self, candles: &[Candle]) -> Result<StochasticLines, IndicatorError> {
        check_period("stochastic", "k_period", self.k_period)?;
        check_period("stochastic", "d_period", self.d_period)?;

        let close = closes(candles);
        let hh = rolling_max(&highs(candles), self.k_period);
        let ll = rolling_min(&lows(candles), self.k_period);

        let k: Vec<f64> = (0..candles.len())
            .map(|i| safe_div(close[i] - ll[i], hh[i] - ll[i]) * 100.0)
            .collect();
        let d = rolling_mean(&k, self.d_period, self.d_period);

        Ok(StochasticLines { k, d })
    }
}
