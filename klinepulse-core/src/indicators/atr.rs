//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|); the first
//! candle has no previous close and uses high-low.
//! ATR is the Wilder-smoothed true range (EMA with center of mass period - 1),
//! first value at index period - 1.

use super::wilder;
use crate::components::indicator::{check_period, Indicator, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// Compute the True Range series. Any NaN input field → NaN at that position.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let n = candles.len();
    let mut tr = vec![f64::NAN; n];

    for i in 0..n {
        let h = candles[i].high;
        let l = candles[i].low;
        if h.is_nan() || l.is_nan() {
            continue;
        }
        if i == 0 {
            tr[i] = h - l;
            continue;
        }
        let pc = candles[i - 1].close;
        if pc.is_nan() {
            continue;
        }
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }

    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Result<Vec<f64>, IndicatorError> {
        check_period("atr", "period", self.period)?;
        Ok(wilder(&true_range(candles), self.period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_candles, DEFAULT_EPSILON};

    fn swing() -> Vec<Candle> {
        make_ohlc_candles(&[
            (20.0, 21.0, 19.5, 20.5),
            (20.5, 22.0, 20.0, 21.8),
            (21.8, 22.4, 21.6, 22.0),
            (19.0, 19.4, 18.6, 19.0),
        ])
    }

    #[test]
    fn true_range_first_bar_is_its_span() {
        let tr = true_range(&swing());
        assert_approx(tr[0], 1.5, DEFAULT_EPSILON);
        assert_approx(tr[1], 2.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 0.8, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_spans_gap_down() {
        // 18.6 against the prior close of 22.0
        assert_approx(true_range(&swing())[3], 3.4, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_2_smoothing() {
        let result = Atr::new(2).compute(&swing()).unwrap();

        assert!(result[0].is_nan());
        assert_approx(result[1], 1.75, DEFAULT_EPSILON);
        assert_approx(result[2], 1.275, DEFAULT_EPSILON);
        assert_approx(result[3], 2.3375, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_missing_high_low_is_unavailable() {
        let mut candles = swing();
        for c in &mut candles {
            c.high = f64::NAN;
        }
        let result = Atr::new(2).compute(&candles).unwrap();
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 13);
        assert_eq!(Atr::new(1).lookback(), 0);
    }
}
