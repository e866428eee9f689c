//! Shared component contracts.

pub mod indicator;

pub use indicator::{Indicator, IndicatorError};
