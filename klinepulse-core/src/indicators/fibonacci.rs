//! Fibonacci retracement grid.
//!
//! Over the last `period` candles take the highest high and lowest low.
//! For every level fraction:
//!   uptrend   = high - range * level
//!   downtrend = low + range * level
//!
//! The grid describes the current retracement only: every level series
//! carries a value at the last position and is unavailable elsewhere.
//! Windows shorter than `period` produce an empty grid.

use serde::{Deserialize, Serialize};

use crate::components::indicator::{check_period, IndicatorError};
use crate::domain::Candle;

/// Which way the swing inside the lookback ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetracementDirection {
    /// Lowest low came before the highest high.
    Up,
    /// Highest high came before (or with) the lowest low.
    Down,
}

#[derive(Debug, Clone)]
pub struct Fibonacci {
    period: usize,
    levels: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FibonacciLevel {
    pub level: f64,
    pub uptrend: Vec<f64>,
    pub downtrend: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FibonacciGrid {
    pub direction: Option<RetracementDirection>,
    pub high: f64,
    pub low: f64,
    pub levels: Vec<FibonacciLevel>,
}

impl Fibonacci {
    pub fn new(period: usize, levels: Vec<f64>) -> Self {
        Self { period, levels }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    pub fn compute(&self, candles: &[Candle]) -> Result<FibonacciGrid, IndicatorError> {
        check_period("fibonacci", "period", self.period)?;
        if let Some(bad) = self.levels.iter().find(|l| !l.is_finite()) {
            return Err(IndicatorError::InvalidParameter {
                indicator: "fibonacci",
                param: "levels",
                value: bad.to_string(),
            });
        }

        let n = candles.len();
        let mut grid = FibonacciGrid {
            direction: None,
            high: f64::NAN,
            low: f64::NAN,
            levels: self
                .levels
                .iter()
                .map(|&level| FibonacciLevel {
                    level,
                    uptrend: vec![f64::NAN; n],
                    downtrend: vec![f64::NAN; n],
                })
                .collect(),
        };
        if n < self.period {
            return Ok(grid);
        }

        let recent = &candles[n - self.period..];
        if recent.iter().any(|c| c.high.is_nan() || c.low.is_nan()) {
            return Ok(grid);
        }

        let mut high_idx = 0;
        let mut low_idx = 0;
        for (i, c) in recent.iter().enumerate() {
            if c.high > recent[high_idx].high {
                high_idx = i;
            }
            if c.low < recent[low_idx].low {
                low_idx = i;
            }
        }

        let high = recent[high_idx].high;
        let low = recent[low_idx].low;
        let range = high - low;

        grid.high = high;
        grid.low = low;
        grid.direction = Some(if low_idx < high_idx {
            RetracementDirection::Up
        } else {
            RetracementDirection::Down
        });
        for level in &mut grid.levels {
            level.uptrend[n - 1] = high - range * level.level;
            level.downtrend[n - 1] = low + range * level.level;
        }

        Ok(grid)
    }
}
