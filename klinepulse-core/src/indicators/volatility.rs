//! ATR as a percentage of close.

use super::atr::Atr;
use super::safe_div;
use crate::components::indicator::{Indicator, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct VolatilityPct {
    atr: Atr,
    period: usize,
    name: String,
}

impl VolatilityPct {
    pub fn new(period: usize) -> Self {
        Self {
            atr: Atr::new(period),
            period,
            name: format!("atr_pct_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for VolatilityPct {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.atr.lookback()
    }

    fn compute(&self, candles: &[Candle]) -> Result<Vec<f64>, IndicatorError> {
        let atr = self.atr.compute(candles)?;
        Ok(atr
            .iter()
            .zip(candles)
            .map(|(&a, c)| safe_div(a, c.close) * 100.0)
            .collect())
    }
}
