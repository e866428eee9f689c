//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices. The moving-average family is available from
//! the first candle: positions with fewer than `period` candles carry the
//! partial average (minimum periods = 1). `Sma::strict` gates at the full
//! period instead, for consumers that compare long averages.

use super::{closes, rolling_mean};
use crate::components::indicator::{check_period, Indicator, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    min_periods: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            min_periods: 1,
            name: format!("sma_{period}"),
        }
    }

    /// SMA with the full-period warm-up.
    pub fn strict(period: usize) -> Self {
        Self {
            period,
            min_periods: period,
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.min_periods.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Result<Vec<f64>, IndicatorError> {
        check_period("sma", "period", self.period)?;
        Ok(rolling_mean(&closes(candles), self.period, self.min_periods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let result = Sma::new(5).compute(&candles).unwrap();

        assert_eq!(result.len(), 7);
        // Partial averages during warm-up
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 10.5, DEFAULT_EPSILON);
        assert_approx(result[3], 11.5, DEFAULT_EPSILON);
        // SMA[4] = mean(10,11,12,13,14) = 12.0
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
        assert_approx(result[5], 13.0, DEFAULT_EPSILON);
        assert_approx(result[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_strict_gates_warmup() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0]);
        let result = Sma::strict(3).compute(&candles).unwrap();
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_close() {
        let candles = make_candles(&[100.0, 200.0, 300.0]);
        let result = Sma::new(1).compute(&candles).unwrap();
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_is_skipped_in_partial_mode() {
        let mut candles = make_candles(&[10.0, 11.0, 12.0, 13.0]);
        candles[1].close = f64::NAN;
        let result = Sma::new(3).compute(&candles).unwrap();
        // Window [10, NaN, 12] → mean of the valid values
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_lookback() {
        assert_eq!(Sma::new(20).lookback(), 0);
        assert_eq!(Sma::strict(20).lookback(), 19);
    }

    #[test]
    fn sma_zero_period_errors() {
        let candles = make_candles(&[1.0]);
        assert!(Sma::new(0).compute(&candles).is_err());
    }
}
