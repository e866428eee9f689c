//! MACD — Moving Average Convergence Divergence.
//!
//! line = EMA(fast) - EMA(slow), signal = EMA(signal) of line,
//! histogram = line - signal.
//!
//! Gated like the other oscillators: each EMA is masked until it has seen a
//! full period, so the line starts at index slow - 1 and the signal at
//! slow + signal - 2.

use super::closes;
use super::ema::ema_of_series;
use crate::components::indicator::{check_period, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
}

/// Aligned MACD output series.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }

    /// Parameter tag used as the snapshot key, e.g. "12_26_9".
    pub fn params(&self) -> String {
        format!("{}_{}_{}", self.fast, self.slow, self.signal)
    }

    pub fn line_lookback(&self) -> usize {
        self.slow.saturating_sub(1)
    }

    pub fn signal_lookback(&self) -> usize {
        (self.slow + self.signal).saturating_sub(2)
    }

    pub fn compute(&self, candles: &[Candle]) -> Result<MacdLines, IndicatorError> {
        check_period("macd", "fast", self.fast)?;
        check_period("macd", "slow", self.slow)?;
        check_period("macd", "signal", self.signal)?;
        if self.fast >= self.slow {
            return Err(IndicatorError::InvalidParameter {
                indicator: "macd",
                param: "fast",
                value: format!("{} (must be < slow {})", self.fast, self.slow),
            });
        }

        let closes = closes(candles);
        let fast = ema_of_series(&closes, self.fast, self.fast);
        let slow = ema_of_series(&closes, self.slow, self.slow);

        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&line, self.signal, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

        Ok(MacdLines {
            line,
            signal,
            histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn macd_warmup_gating() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let candles = make_candles(&closes);
        let macd = Macd::new(3, 5, 4);
        let out = macd.compute(&candles).unwrap();

        assert_eq!(macd.line_lookback(), 4);
        assert_eq!(macd.signal_lookback(), 7);
        assert!(out.line[3].is_nan());
        assert!(!out.line[4].is_nan());
        assert!(out.signal[6].is_nan());
        assert!(!out.signal[7].is_nan());
        assert!(!out.histogram[7].is_nan());
    }

    #[test]
    fn macd_signal_of_one_tracks_line() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let macd = Macd::new(2, 4, 1);
        let out = macd.compute(&make_candles(&closes)).unwrap();

        assert_eq!(macd.signal_lookback(), macd.line_lookback());
        assert!(out.signal[2].is_nan());
        assert_approx(out.signal[3], out.line[3], DEFAULT_EPSILON);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let out = Macd::new(3, 6, 3).compute(&make_candles(&closes)).unwrap();
        for i in 0..30 {
            if !out.histogram[i].is_nan() {
                assert_approx(out.histogram[i], out.line[i] - out.signal[i], DEFAULT_EPSILON);
            }
        }
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 2.0).collect();
        let out = Macd::new(12, 26, 9).compute(&make_candles(&closes)).unwrap();
        assert!(out.line[39] > 0.0);
    }

    #[test]
    fn macd_constant_price_is_zero() {
        let out = Macd::new(3, 5, 2).compute(&make_candles(&[50.0; 10])).unwrap();
        assert_approx(out.line[9], 0.0, DEFAULT_EPSILON);
        assert_approx(out.signal[9], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn macd_rejects_fast_not_below_slow() {
        let err = Macd::new(26, 12, 9).compute(&make_candles(&[1.0])).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidParameter { .. }));
    }

    #[test]
    fn macd_params_tag() {
        assert_eq!(Macd::new(12, 26, 9).params(), "12_26_9");
    }
}
