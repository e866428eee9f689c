//! Indicator trait and the indicator error type.
//!
//! Indicators are pure functions: candle window in, numeric series out.
//! Internally a series is `Vec<f64>` with `f64::NAN` marking "unavailable";
//! the snapshot layer converts NaN to an explicit `None` before anything
//! leaves the library.

use crate::domain::Candle;
use thiserror::Error;

/// Errors raised while computing a single indicator.
///
/// These never abort a snapshot: the snapshot records the fault and the
/// affected indicator degrades to all-unavailable output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("{indicator}: invalid parameter {param} = {value}")]
    InvalidParameter {
        indicator: &'static str,
        param: &'static str,
        value: String,
    },

    #[error("{indicator}: {detail}")]
    Computation {
        indicator: &'static str,
        detail: String,
    },
}

/// Single-series indicator.
///
/// `compute` returns a series of the same length as `candles`. The first
/// `lookback()` values are NaN (warm-up); windows shorter than the warm-up
/// yield an all-NaN series.
///
/// # Look-ahead guard
/// No value at position t may depend on candles after t. The one exception is
/// the Ichimoku chikou span, which is a backward-shifted close by definition
/// and lives outside this trait.
pub trait Indicator: Send + Sync {
    /// Output key in the snapshot (e.g. "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of leading positions that are always unavailable.
    fn lookback(&self) -> usize;

    fn compute(&self, candles: &[Candle]) -> Result<Vec<f64>, IndicatorError>;
}

/// Reject a zero period.
pub(crate) fn check_period(
    indicator: &'static str,
    param: &'static str,
    period: usize,
) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter {
            indicator,
            param,
            value: period.to_string(),
        });
    }
    Ok(())
}
