//! Top-level runtime configuration, loaded from TOML.
//!
//! ```toml
//! [window]
//! capacity = 500
//!
//! [indicators]
//! rsi_periods = [7, 14]
//!
//! [scoring.bonus]
//! cloud = 0.15
//!
//! [feed]
//! fetch_timeout_ms = 5000
//! ```
//!
//! Every section and field is optional; omitted values take their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use klinepulse_core::{IndicatorConfig, ScoringConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Candles retained per (symbol, interval) key.
    pub capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { capacity: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Historical candles requested when a pipeline starts.
    pub backfill_limit: usize,
    pub fetch_timeout_ms: u64,
    /// Retries after the first failed attempt.
    pub fetch_retries: u32,
    /// Base delay before the first retry; doubles on every further retry.
    pub retry_backoff_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            backfill_limit: 500,
            fetch_timeout_ms: 10_000,
            fetch_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl FeedConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Bound of each pipeline's inbound command queue.
    pub command_buffer: usize,
    /// How often streams whose subscribers all dropped away are stopped.
    pub idle_check_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_buffer: 256,
            idle_check_ms: 1_000,
        }
    }
}

impl HubConfig {
    pub fn idle_check(&self) -> Duration {
        Duration::from_millis(self.idle_check_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub window: WindowConfig,
    pub indicators: IndicatorConfig,
    pub scoring: ScoringConfig,
    pub feed: FeedConfig,
    pub hub: HubConfig,
}

impl PulseConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.scoring
            .validate_against(&self.indicators)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let needed = self.indicators.max_lookback() + 1;
        if self.window.capacity < needed {
            return Err(ConfigError::Invalid(format!(
                "window.capacity {} is below the {} candles the slowest indicator needs",
                self.window.capacity, needed
            )));
        }
        if self.hub.command_buffer == 0 {
            return Err(ConfigError::Invalid(
                "hub.command_buffer must be at least 1".to_string(),
            ));
        }
        if self.hub.idle_check_ms == 0 {
            return Err(ConfigError::Invalid(
                "hub.idle_check_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = PulseConfig::from_toml_str("").unwrap();
        assert_eq!(config, PulseConfig::default());
        assert_eq!(config.window.capacity, 500);
        assert_eq!(config.feed.fetch_retries, 3);
    }

    #[test]
    fn partial_sections_override() {
        let config = PulseConfig::from_toml_str(
            r#"
            [window]
            capacity = 300

            [indicators]
            rsi_periods = [7, 14]

            [scoring.bonus]
            cloud = 0.15

            [feed]
            fetch_timeout_ms = 2500
            "#,
        )
        .unwrap();
        assert_eq!(config.window.capacity, 300);
        assert_eq!(config.indicators.rsi_periods, vec![7, 14]);
        assert_eq!(config.indicators.adx_period, 14);
        assert_eq!(config.scoring.bonus.cloud, 0.15);
        assert_eq!(config.scoring.bonus.vwap, 0.05);
        assert_eq!(config.feed.fetch_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn capacity_below_lookback_is_invalid() {
        let err = PulseConfig::from_toml_str("[window]\ncapacity = 50").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("200"));
    }

    #[test]
    fn scorer_must_read_configured_series() {
        let err = PulseConfig::from_toml_str("[indicators]\nrsi_periods = [7]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_idle_check_is_invalid() {
        let err = PulseConfig::from_toml_str("[hub]\nidle_check_ms = 0").unwrap_err();
        assert!(err.to_string().contains("idle_check_ms"));
        let config = PulseConfig::from_toml_str("[hub]\nidle_check_ms = 250").unwrap();
        assert_eq!(config.hub.idle_check(), Duration::from_millis(250));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = PulseConfig::from_toml_str("[window\ncapacity = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.toml");
        std::fs::write(&path, "[window]\ncapacity = 250\n").unwrap();
        let config = PulseConfig::from_file(&path).unwrap();
        assert_eq!(config.window.capacity, 250);

        let missing = PulseConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
