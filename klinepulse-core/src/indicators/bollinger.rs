//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses the sample standard deviation (divide by N - 1). All three bands
//! share the full-period warm-up so they always appear together.

use super::{closes, rolling_mean, rolling_std};
use crate::components::indicator::{check_period, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
}

/// Aligned band series.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self { period, multiplier }
    }

    /// Parameter tag used as the snapshot key, e.g. "20_2".
    pub fn params(&self) -> String {
        format!("{}_{}", self.period, self.multiplier)
    }

    pub fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    pub fn compute(&self, candles: &[Candle]) -> Result<BollingerBands, IndicatorError> {
        check_period("bollinger", "period", self.period)?;
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(IndicatorError::InvalidParameter {
                indicator: "bollinger",
                param: "multiplier",
                value: self.multiplier.to_string(),
            });
        }

        let closes = closes(candles);
        let mut middle = rolling_mean(&closes, self.period, self.period);
        let std = rolling_std(&closes, self.period);

        let mut upper = vec![f64::NAN; closes.len()];
        let mut lower = vec![f64::NAN; closes.len()];
        for i in 0..closes.len() {
            if std[i].is_nan() {
                middle[i] = f64::NAN;
                continue;
            }
            upper[i] = middle[i] + self.multiplier * std[i];
            lower[i] = middle[i] - self.multiplier * std[i];
        }

        Ok(BollingerBands {
            middle,
            upper,
            lower,
        })
    }
}
