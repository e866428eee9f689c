//! KlinePulse Core — candle windows, indicators, and signal scoring.
//!
//! This crate is pure and synchronous:
//! - Domain types (candles, window keys)
//! - Bounded per-key candle window store with still-forming candle updates
//! - Indicator library with an explicit warm-up and unavailable-value policy
//! - Versioned indicator snapshot schema
//! - Rule-based signal scorer producing a typed, explainable signal

pub mod components;
pub mod config;
pub mod domain;
pub mod indicators;
pub mod signal;
pub mod snapshot;
pub mod window;

pub use config::{IndicatorConfig, ScoringConfig};
pub use domain::{Candle, CandleError, WindowKey};
pub use signal::{score, Signal, SignalType};
pub use snapshot::{compute_snapshot, IndicatorSnapshot};
pub use window::{WindowError, WindowStore};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything handed across pipeline tasks is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Candle>();
        require_sync::<Candle>();
        require_send::<WindowKey>();
        require_sync::<WindowKey>();
        require_send::<WindowStore>();
        require_sync::<WindowStore>();
        require_send::<IndicatorSnapshot>();
        require_sync::<IndicatorSnapshot>();
        require_send::<Signal>();
        require_sync::<Signal>();
        require_send::<IndicatorConfig>();
        require_sync::<IndicatorConfig>();
        require_send::<ScoringConfig>();
        require_sync::<ScoringConfig>();
        require_send::<WindowError>();
        require_sync::<WindowError>();
    }
}
