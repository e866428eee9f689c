//! KlinePulse Runner — live orchestration around `klinepulse-core`.
//!
//! This crate provides:
//! - TOML runtime configuration (`PulseConfig`)
//! - Distribution hub with last-value-wins delivery per topic
//! - Per-key pipeline tasks (upsert → recompute → score → publish)
//! - Stream manager tying pipeline lifetime to subscribers
//! - Candle feed boundary with timeout/retry, plus replay and synthetic feeds
//! - Exchange kline decoding and recorded-feed loading

pub mod config;
pub mod decode;
pub mod feed;
pub mod hub;
pub mod loader;
pub mod manager;
pub mod payload;
pub mod pipeline;

pub use config::{ConfigError, FeedConfig, HubConfig, PulseConfig, WindowConfig};
pub use decode::{decode_kline_event, decode_rest_klines, DecodeError, KlineEvent};
pub use feed::{
    CandleFeed, CandleUpdate, FeedError, LiveStream, ReplayFeed, ResilientFeed, RetryPolicy,
    SyntheticFeed,
};
pub use hub::{DistributionHub, SubscriberId, Subscription};
pub use loader::{load_recording, write_csv, LoadError, Recording};
pub use manager::StreamManager;
pub use payload::Payload;
pub use pipeline::{
    spawn_pipeline, Pipeline, PipelineCommand, PipelineError, PipelineHandle, PipelineStats,
};
