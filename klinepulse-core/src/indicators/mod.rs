//! Concrete indicator implementations.
//!
//! Single-series indicators (SMA, EMA, RSI, ATR, OBV, VWAP, volatility %)
//! implement the `Indicator` trait. Multi-series families (MACD, Bollinger,
//! ADX, Stochastic, Ichimoku, Fibonacci, trend status) return a struct of
//! aligned series from their own `compute`.
//!
//! Two warm-up conventions coexist:
//! - moving averages (SMA, EMA) are available from the first candle;
//! - oscillators and range indicators are gated at their full period.
//!
//! The helpers below implement the shared numeric kernels. All of them treat
//! NaN as "missing": a NaN input produces a NaN output at that position.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod fibonacci;
pub mod ichimoku;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod trend;
pub mod volatility;
pub mod vwap;

pub use adx::{Adx, AdxLines};
pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBands};
pub use ema::Ema;
pub use fibonacci::{Fibonacci, FibonacciGrid, FibonacciLevel, RetracementDirection};
pub use ichimoku::{Ichimoku, IchimokuLines};
pub use macd::{Macd, MacdLines};
pub use obv::Obv;
pub use rsi::Rsi;
pub use sma::Sma;
pub use stochastic::{Stochastic, StochasticLines};
pub use trend::{TrendLabel, TrendStatus, TrendStatusSeries};
pub use volatility::VolatilityPct;
pub use vwap::Vwap;

use crate::domain::Candle;

pub(crate) fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub(crate) fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.high).collect()
}

pub(crate) fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.low).collect()
}

/// Exponentially weighted mean, recursive form.
///
/// y[first] = x[first]; y[t] = alpha * x[t] + (1 - alpha) * y[prev].
/// Seeded from the first non-NaN value. NaN inputs are skipped (output NaN,
/// state carried). Positions before `min_periods` observations are NaN.
pub(crate) fn ewm(values: &[f64], alpha: f64, min_periods: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    let mut state: Option<f64> = None;
    let mut observed = 0usize;

    for (i, &x) in values.iter().enumerate() {
        if x.is_nan() {
            continue;
        }
        let y = match state {
            None => x,
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
        };
        state = Some(y);
        observed += 1;
        if observed >= min_periods.max(1) {
            result[i] = y;
        }
    }

    result
}

/// Wilder smoothing: `ewm` with alpha = 1/period (center of mass period - 1),
/// gated at `period` observations.
pub(crate) fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    ewm(values, 1.0 / period as f64, period)
}

/// Rolling mean over `period` positions, requiring at least `min_periods`
/// non-NaN values inside the window.
pub(crate) fn rolling_mean(values: &[f64], period: usize, min_periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let mut sum = 0.0;
    let mut count = 0usize;

    for i in 0..n {
        if !values[i].is_nan() {
            sum += values[i];
            count += 1;
        }
        if i >= period {
            let leaving = values[i - period];
            if !leaving.is_nan() {
                sum -= leaving;
                count -= 1;
            }
        }
        if count >= min_periods.max(1) {
            result[i] = sum / count as f64;
        }
    }

    result
}

/// Rolling sample standard deviation (ddof = 1) over a full window of
/// `period` non-NaN values.
pub(crate) fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period < 2 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let ss: f64 = window.iter().map(|v| (v - mean) * (v - mean)).sum();
        result[i] = (ss / (period - 1) as f64).sqrt();
    }

    result
}

/// Rolling maximum over a full window of `period` values; NaN in window → NaN.
pub(crate) fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling_extreme(values, period, f64::max)
}

/// Rolling minimum over a full window of `period` values; NaN in window → NaN.
pub(crate) fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling_extreme(values, period, f64::min)
}

fn rolling_extreme(values: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().copied().fold(window[0], pick);
    }

    result
}

/// Midpoint of rolling highest high and lowest low.
pub(crate) fn rolling_midpoint(highs: &[f64], lows: &[f64], period: usize) -> Vec<f64> {
    let hh = rolling_max(highs, period);
    let ll = rolling_min(lows, period);
    hh.iter().zip(&ll).map(|(h, l)| (h + l) / 2.0).collect()
}

/// Shift a series forward: out[i] = values[i - by]. Values pushed past the
/// end are dropped.
pub(crate) fn shift_forward(values: &[f64], by: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    for i in by..n {
        result[i] = values[i - by];
    }
    result
}

/// Shift a series backward: out[i] = values[i + by].
pub(crate) fn shift_backward(values: &[f64], by: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    for i in 0..n.saturating_sub(by) {
        result[i] = values[i + by];
    }
    result
}

/// Element-wise division yielding NaN where the divisor is zero.
pub(crate) fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || denominator.is_nan() || numerator.is_nan() {
        f64::NAN
    } else {
        numerator / denominator
    }
}

/// Create synthetic candles from close prices for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                open_time: 1_700_000_000_000 + i as i64 * 60_000,
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Candles from explicit (open, high, low, close) tuples, volume 1000.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            open_time: 1_700_000_000_000 + i as i64 * 60_000,
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
