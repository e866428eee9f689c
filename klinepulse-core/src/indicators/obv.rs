//! On-Balance Volume.
//!
//! OBV[0] = 0; each later candle adds its volume when the close rose, subtracts
//! it when the close fell, and carries the total when unchanged.

use crate::components::indicator::{Indicator, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone, Default)]
pub struct Obv;

impl Obv {
    pub fn new() -> Self {
        Self
    }
}

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Result<Vec<f64>, IndicatorError> {
        let mut result = Vec::with_capacity(candles.len());
        let mut total = 0.0;

        for (i, c) in candles.iter().enumerate() {
            if i > 0 {
                let prev = candles[i - 1].close;
                if c.close > prev {
                    total += c.volume;
                } else if c.close < prev {
                    total -= c.volume;
                }
            }
            result.push(total);
        }

        Ok(result)
    }
}
