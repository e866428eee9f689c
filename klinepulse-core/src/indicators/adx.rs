//! ADX — Average Directional Index (Wilder).
//!
//! Steps:
//! 1. +DM / -DM from consecutive highs and lows (zero on the first candle)
//! 2. Wilder-smooth +DM and -DM the same way as ATR
//! 3. +DI = 100 * smoothed(+DM) / ATR, -DI = 100 * smoothed(-DM) / ATR
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! ATR == 0 or +DI + -DI == 0 → unavailable at that position.
//! Lookback: period - 1 for the DI lines, 2 * (period - 1) for ADX.

use super::atr::true_range;
use super::{safe_div, wilder};
use crate::components::indicator::{check_period, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
}

/// Aligned ADX output series.
#[derive(Debug, Clone, PartialEq)]
pub struct AdxLines {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn lookback(&self) -> usize {
        2 * self.period.saturating_sub(1)
    }

    pub fn compute(&self, candles: &[Candle]) -> Result<AdxLines, IndicatorError> {
        check_period("adx", "period", self.period)?;

        let n = candles.len();
        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];

        for i in 0..n {
            if i == 0 {
                if !candles[0].high.is_nan() && !candles[0].low.is_nan() {
                    plus_dm[0] = 0.0;
                    minus_dm[0] = 0.0;
                }
                continue;
            }
            let up_move = candles[i].high - candles[i - 1].high;
            let down_move = candles[i - 1].low - candles[i].low;
            if up_move.is_nan() || down_move.is_nan() {
                continue;
            }
            plus_dm[i] = if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            };
            minus_dm[i] = if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            };
        }

        let atr = wilder(&true_range(candles), self.period);
        let smooth_plus = wilder(&plus_dm, self.period);
        let smooth_minus = wilder(&minus_dm, self.period);

        let mut plus_di = vec![f64::NAN; n];
        let mut minus_di = vec![f64::NAN; n];
        let mut dx = vec![f64::NAN; n];
        for i in 0..n {
            plus_di[i] = safe_div(smooth_plus[i], atr[i]) * 100.0;
            minus_di[i] = safe_div(smooth_minus[i], atr[i]) * 100.0;
            dx[i] = safe_div((plus_di[i] - minus_di[i]).abs(), plus_di[i] + minus_di[i]) * 100.0;
        }

        Ok(AdxLines {
            adx: wilder(&dx, self.period),
            plus_di,
            minus_di,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_ohlc_candles;

    fn trending(n: usize, step: f64) -> Vec<Candle> {
        let data: Vec<(f64, f64, f64, f64)> = (0..n)
            .map(|i| {
                let base = 100.0 + i as f64 * step;
                (base - 1.0, base + 3.0, base - 3.0, base + 2.0)
            })
            .collect();
        make_ohlc_candles(&data)
    }

    #[test]
    fn adx_bounds() {
        let candles = make_ohlc_candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
            (99.0, 103.0, 97.0, 101.0),
            (101.0, 106.0, 100.0, 105.0),
            (105.0, 110.0, 103.0, 108.0),
            (108.0, 112.0, 106.0, 110.0),
            (110.0, 111.0, 104.0, 105.0),
            (105.0, 109.0, 103.0, 107.0),
            (107.0, 113.0, 105.0, 112.0),
        ]);
        let lines = Adx::new(3).compute(&candles).unwrap();
        for (i, &v) in lines.adx.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "ADX out of bounds at {i}: {v}");
            }
        }
    }

    #[test]
    fn adx_gating() {
        let lines = Adx::new(5).compute(&trending(20, 5.0)).unwrap();
        assert!(lines.plus_di[3].is_nan());
        assert!(!lines.plus_di[4].is_nan());
        assert!(lines.adx[7].is_nan());
        assert!(!lines.adx[8].is_nan());
    }

    #[test]
    fn adx_strong_uptrend() {
        let lines = Adx::new(5).compute(&trending(30, 5.0)).unwrap();
        let last = lines.adx[29];
        assert!(last > 25.0, "ADX should be elevated in a strong trend, got {last}");
        assert!(lines.plus_di[29] > lines.minus_di[29]);
    }

    #[test]
    fn adx_downtrend_favours_minus_di() {
        let lines = Adx::new(5).compute(&trending(30, -5.0)).unwrap();
        assert!(lines.minus_di[29] > lines.plus_di[29]);
    }

    #[test]
    fn adx_zero_range_is_unavailable() {
        let candles = make_ohlc_candles(&[(100.0, 100.0, 100.0, 100.0); 10]);
        let lines = Adx::new(3).compute(&candles).unwrap();
        assert!(lines.plus_di.iter().all(|v| v.is_nan()));
        assert!(lines.adx.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn adx_lookback() {
        assert_eq!(Adx::new(14).lookback(), 26);
    }

    #[test]
    fn adx_too_few_candles() {
        let lines = Adx::new(3)
            .compute(&make_ohlc_candles(&[(100.0, 105.0, 95.0, 102.0)]))
            .unwrap();
        assert!(lines.adx.iter().all(|v| v.is_nan()));
    }
}
