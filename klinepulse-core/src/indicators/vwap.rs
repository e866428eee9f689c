//! Volume-weighted average price over the retained window.
//!
//! VWAP[i] = sum(typical_price * volume) / sum(volume) over candles 0..=i.
//! Unavailable while the cumulative volume is zero.

use super::safe_div;
use crate::components::indicator::{Indicator, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone, Default)]
pub struct Vwap;

impl Vwap {
    pub fn new() -> Self {
        Self
    }
}

impl Indicator for Vwap {
    fn name(&self) -> &str {
        "vwap"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Result<Vec<f64>, IndicatorError> {
        let mut pv = 0.0;
        let mut vol = 0.0;

        Ok(candles
            .iter()
            .map(|c| {
                pv += c.typical_price() * c.volume;
                vol += c.volume;
                safe_div(pv, vol)
            })
            .collect())
    }
}
