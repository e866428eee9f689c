//! Relative Strength Index (RSI).
//!
//! Average gain and average loss are Wilder-smoothed (EMA with center of
//! mass period - 1). The first candle has no prior close and counts as a
//! zero change, so the first value lands at index period - 1.
//!
//! Edge cases: avg_gain > 0 and avg_loss == 0 → 100; both zero → 50
//! (no movement is neutral, not undefined).

use super::{closes, wilder};
use crate::components::indicator::{check_period, Indicator, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Result<Vec<f64>, IndicatorError> {
        check_period("rsi", "period", self.period)?;

        let closes = closes(candles);
        let n = closes.len();
        let mut gains = vec![f64::NAN; n];
        let mut losses = vec![f64::NAN; n];

        for i in 0..n {
            let change = if i == 0 {
                if closes[0].is_nan() {
                    f64::NAN
                } else {
                    0.0
                }
            } else {
                closes[i] - closes[i - 1]
            };
            if change.is_nan() {
                continue;
            }
            gains[i] = change.max(0.0);
            losses[i] = (-change).max(0.0);
        }

        let avg_gain = wilder(&gains, self.period);
        let avg_loss = wilder(&losses, self.period);

        Ok(avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| compute_rsi(g, l))
            .collect())
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        f64::NAN
    } else if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
