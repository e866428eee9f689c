//! KlinePulse CLI — replay, analyze, and demo commands.
//!
//! Commands:
//! - `replay` — stream a recorded feed through one pipeline, one JSON payload per line
//! - `analyze` — one snapshot + signal per recording, computed in parallel
//! - `demo` — run the synthetic live feed through the stream manager
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); stdout carries results only.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use klinepulse_core::{Signal, WindowKey, WindowStore};
use klinepulse_runner::{load_recording, Pipeline, PulseConfig, StreamManager, SyntheticFeed};

#[derive(Parser)]
#[command(
    name = "klinepulse",
    about = "KlinePulse — streaming candle indicators and trading signals"
)]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a recorded feed (.csv, .jsonl or .json history) through a pipeline.
    Replay {
        file: PathBuf,

        /// Symbol for CSV recordings (event recordings carry their own).
        #[arg(long, default_value = "REPLAY")]
        symbol: String,

        /// Interval for CSV recordings.
        #[arg(long, default_value = "1m")]
        interval: String,

        /// Print only `{open_time, signal}` instead of the full payload.
        #[arg(long, default_value_t = false)]
        signals_only: bool,
    },
    /// Compute the latest snapshot and signal for each recording.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run the synthetic feed live and print each signal.
    Demo {
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,

        #[arg(long, default_value = "1m")]
        interval: String,

        /// Live candles to generate after the backfill.
        #[arg(long, default_value_t = 20)]
        candles: usize,

        /// Forming updates per candle before it closes.
        #[arg(long, default_value_t = 3)]
        ticks: usize,

        /// Delay between live updates in milliseconds.
        #[arg(long, default_value_t = 50)]
        pace_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let config = match &cli.config {
        Some(path) => PulseConfig::from_file(path)?,
        None => PulseConfig::default(),
    };

    match cli.command {
        Commands::Replay {
            file,
            symbol,
            interval,
            signals_only,
        } => run_replay(&config, &file, WindowKey::new(symbol, interval), signals_only),
        Commands::Analyze { files } => run_analyze(&config, &files),
        Commands::Demo {
            symbol,
            interval,
            candles,
            ticks,
            pace_ms,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_demo(
                config,
                WindowKey::new(symbol, interval),
                candles,
                ticks,
                pace_ms,
            ))
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_replay(
    config: &PulseConfig,
    file: &Path,
    fallback: WindowKey,
    signals_only: bool,
) -> Result<()> {
    let recording = load_recording(file)?;
    let key = recording.key.clone().unwrap_or(fallback);
    info!(%key, updates = recording.updates.len(), file = %file.display(), "replaying");

    let store = Arc::new(WindowStore::new(config.window.capacity));
    let pipeline = Pipeline::new(key, store, config.indicators.clone(), config.scoring.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut rejected = 0usize;
    for update in &recording.updates {
        let payload = match pipeline.cycle(update.candle) {
            Ok(payload) => payload,
            Err(_) => {
                rejected += 1;
                continue;
            }
        };
        let line = if signals_only {
            serde_json::to_string(&serde_json::json!({
                "open_time": payload.last_open_time(),
                "closed": update.closed,
                "signal": payload.signal,
            }))?
        } else {
            serde_json::to_string(&payload)?
        };
        writeln!(out, "{line}")?;
    }

    if rejected > 0 {
        warn!(rejected, "updates rejected during replay");
    }
    Ok(())
}

struct AnalyzeRow {
    file: String,
    symbol: String,
    candles: usize,
    rejected: usize,
    last_time: String,
    close: f64,
    signal: Signal,
}

fn analyze_file(config: &PulseConfig, file: &Path) -> Result<AnalyzeRow> {
    let recording =
        load_recording(file).with_context(|| format!("loading {}", file.display()))?;
    let symbol = recording
        .key
        .as_ref()
        .map_or_else(|| "-".to_string(), |k| k.to_string());
    let key = recording.key.clone().unwrap_or_else(|| {
        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("recording");
        WindowKey::new(stem, "file")
    });

    // Same window rules as a live stream: malformed and out-of-order rows are dropped.
    let store = Arc::new(WindowStore::new(config.window.capacity));
    let pipeline = Pipeline::new(key, store, config.indicators.clone(), config.scoring.clone());
    let (report, payload) = pipeline.backfill(recording.closed_candles());
    if !report.rejected.is_empty() {
        warn!(
            file = %file.display(),
            rejected = report.rejected.len(),
            "rows rejected while loading window"
        );
    }
    let Some(last) = payload.klines.last().copied() else {
        bail!(
            "{} holds no usable candles ({} rejected)",
            file.display(),
            report.rejected.len()
        );
    };

    Ok(AnalyzeRow {
        file: file.display().to_string(),
        symbol,
        candles: payload.klines.len(),
        rejected: report.rejected.len(),
        last_time: last.open_datetime().map_or_else(
            || last.open_time.to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
        ),
        close: last.close,
        signal: payload.signal,
    })
}

fn run_analyze(config: &PulseConfig, files: &[PathBuf]) -> Result<()> {
    let results: Vec<(PathBuf, Result<AnalyzeRow>)> = files
        .par_iter()
        .map(|f| (f.clone(), analyze_file(config, f)))
        .collect();

    println!(
        "{:<28} {:<14} {:>7} {:>8} {:<17} {:>12} {:<12} {:>6}  Reason",
        "File", "Stream", "Candles", "Rejected", "Last", "Close", "Signal", "Rel"
    );
    println!("{}", "-".repeat(119));

    let mut failed = 0usize;
    for (file, result) in results {
        match result {
            Ok(row) => println!(
                "{:<28} {:<14} {:>7} {:>8} {:<17} {:>12.4} {:<12} {:>6.2}  {}",
                row.file,
                row.symbol,
                row.candles,
                row.rejected,
                row.last_time,
                row.close,
                row.signal.signal_type.to_string(),
                row.signal.reliability,
                row.signal.reason
            ),
            Err(e) => {
                failed += 1;
                eprintln!("Error for {}: {e:#}", file.display());
            }
        }
    }

    if failed == files.len() {
        bail!("no recording could be analyzed");
    }
    Ok(())
}

async fn run_demo(
    config: PulseConfig,
    key: WindowKey,
    candles: usize,
    ticks: usize,
    pace_ms: u64,
) -> Result<()> {
    let feed = SyntheticFeed {
        history_candles: config.feed.backfill_limit,
        ticks_per_candle: ticks,
        pace: Some(Duration::from_millis(pace_ms)),
        max_candles: Some(candles),
        ..SyntheticFeed::default()
    };
    let last_open_time = feed.origin_ms
        + (feed.history_candles + candles).saturating_sub(1) as i64 * feed.interval_ms;

    let manager = StreamManager::new(config, feed);
    let mut sub = manager.subscribe(&key).await;

    while let Some(payload) = sub.recv().await {
        let Some(last) = payload.klines.last() else {
            continue;
        };
        println!(
            "{} {:>12.4}  {:<12} {:>5.2}  {}",
            last.open_datetime().map_or_else(
                || last.open_time.to_string(),
                |dt| dt.format("%H:%M").to_string()
            ),
            last.close,
            payload.signal.signal_type.to_string(),
            payload.signal.reliability,
            payload.signal.reason
        );
        if last.open_time >= last_open_time {
            break;
        }
    }

    if let Some(stats) = manager.unsubscribe(sub).await {
        info!(
            cycles = stats.cycles,
            deliveries = stats.deliveries,
            rejected = stats.rejected,
            "demo finished"
        );
    }
    Ok(())
}
