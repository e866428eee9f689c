//! Candle feed collaborator boundary.
//!
//! A [`CandleFeed`] supplies a key's history (oldest first) and a live stream
//! of updates. Still-forming and closing updates share an `open_time`; the
//! window's upsert rule handles both, so `closed` is informational.
//!
//! [`ResilientFeed`] wraps any feed with the timeout/retry policy. The core
//! never retries; only this boundary does.

pub mod replay;
pub mod synthetic;

pub use replay::ReplayFeed;
pub use synthetic::SyntheticFeed;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::FeedConfig;
use crate::decode::DecodeError;
use crate::loader::LoadError;
use klinepulse_core::{Candle, WindowKey};

/// One live update for a key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleUpdate {
    pub candle: Candle,
    /// True once the interval has closed and the candle is final.
    pub closed: bool,
}

impl CandleUpdate {
    pub fn forming(candle: Candle) -> Self {
        Self {
            candle,
            closed: false,
        }
    }

    pub fn closed(candle: Candle) -> Self {
        Self {
            candle,
            closed: true,
        }
    }
}

/// Collapse an update sequence to its last version per `open_time`,
/// keeping order.
pub fn collapse_updates(updates: &[CandleUpdate]) -> Vec<Candle> {
    let mut candles: Vec<Candle> = Vec::new();
    for update in updates {
        match candles.last_mut() {
            Some(last) if last.open_time == update.candle.open_time => *last = update.candle,
            _ => candles.push(update.candle),
        }
    }
    candles
}

/// Live update stream for one key. The stream ends when the sender is dropped.
pub type LiveStream = mpsc::Receiver<Result<CandleUpdate, FeedError>>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("fetch timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("feed unavailable: {0}")]
    Unavailable(String),

    #[error("unknown stream {key}")]
    UnknownKey { key: WindowKey },

    #[error("malformed feed data: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to load recording: {0}")]
    Load(#[from] LoadError),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<FeedError> },
}

impl FeedError {
    /// Transient faults worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Timeout { .. } | FeedError::Unavailable(_))
    }
}

#[async_trait]
pub trait CandleFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` most recent candles for `key`, oldest first.
    async fn fetch_history(&self, key: &WindowKey, limit: usize)
        -> Result<Vec<Candle>, FeedError>;

    /// Open the live update stream for `key`.
    async fn subscribe_live(&self, key: &WindowKey) -> Result<LiveStream, FeedError>;
}

/// Timeout and exponential backoff applied to history fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for RetryPolicy {
    fn from(config: &FeedConfig) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            max_retries: config.fetch_retries,
            base_delay: config.retry_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (0-based). Attempt 0 is immediate.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.base_delay
                .saturating_mul(2u32.saturating_pow(attempt - 1))
        }
    }
}

/// Applies a [`RetryPolicy`] to an inner feed's history fetch.
pub struct ResilientFeed<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: CandleFeed> ResilientFeed<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl<F: CandleFeed> CandleFeed for ResilientFeed<F> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_history(
        &self,
        key: &WindowKey,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError> {
        let attempts = self.policy.max_retries + 1;
        let mut last_error = None;

        for attempt in 0..attempts {
            let delay = self.policy.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result =
                match tokio::time::timeout(self.policy.timeout, self.inner.fetch_history(key, limit))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(FeedError::Timeout {
                        after_ms: self.policy.timeout.as_millis() as u64,
                    }),
                };

            match result {
                Ok(candles) => return Ok(candles),
                Err(e) if e.is_retryable() => {
                    warn!(
                        feed = self.inner.name(),
                        %key,
                        attempt = attempt + 1,
                        attempts,
                        error = %e,
                        "history fetch failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(FeedError::RetriesExhausted {
            attempts,
            last: Box::new(last_error.unwrap_or(FeedError::Unavailable(
                "no attempt was made".to_string(),
            ))),
        })
    }

    async fn subscribe_live(&self, key: &WindowKey) -> Result<LiveStream, FeedError> {
        self.inner.subscribe_live(key).await
    }
}
