//! Domain types for klinepulse

pub mod candle;
pub mod key;

pub use candle::{Candle, CandleError};
pub use key::WindowKey;
