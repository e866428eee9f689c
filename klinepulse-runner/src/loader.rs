//! Recorded feed files.
//!
//! Three formats, chosen by extension:
//! - `.csv`: header `open_time,open,high,low,close,volume[,closed]`; rows
//!   without a `closed` column count as closed candles.
//! - `.jsonl` / `.ndjson`: one exchange kline event per line (see
//!   [`crate::decode`]); the stream key is taken from the events.
//! - `.json`: a saved REST kline history response. Every row is a closed
//!   candle and the file carries no stream key.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::decode::{decode_kline_event, decode_rest_klines, DecodeError};
use crate::feed::{collapse_updates, CandleUpdate};
use klinepulse_core::{Candle, WindowKey};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: {source}")]
    Event {
        path: PathBuf,
        line: usize,
        #[source]
        source: DecodeError,
    },

    #[error("{path}: {source}")]
    History {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("{path} mixes streams {first} and {other}")]
    MixedStreams {
        path: PathBuf,
        first: WindowKey,
        other: WindowKey,
    },

    #[error("unsupported recording format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// A recorded update sequence. `key` is known only for event recordings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub key: Option<WindowKey>,
    pub updates: Vec<CandleUpdate>,
}

impl Recording {
    /// Final candle per `open_time`, in recorded order.
    pub fn closed_candles(&self) -> Vec<Candle> {
        collapse_updates(&self.updates)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default = "default_closed")]
    closed: bool,
}

fn default_closed() -> bool {
    true
}

pub fn load_recording(path: impl AsRef<Path>) -> Result<Recording, LoadError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => load_csv(path),
        Some("jsonl") | Some("ndjson") => load_events(path),
        Some("json") => load_history(path),
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn load_csv(path: &Path) -> Result<Recording, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut updates = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(csv_err)?;
        updates.push(CandleUpdate {
            candle: Candle::new(row.open_time, row.open, row.high, row.low, row.close, row.volume),
            closed: row.closed,
        });
    }
    Ok(Recording { key: None, updates })
}

fn load_events(path: &Path) -> Result<Recording, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut recording = Recording::default();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event = decode_kline_event(line).map_err(|source| LoadError::Event {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        match &recording.key {
            None => recording.key = Some(event.key),
            Some(first) if *first != event.key => {
                return Err(LoadError::MixedStreams {
                    path: path.to_path_buf(),
                    first: first.clone(),
                    other: event.key,
                })
            }
            Some(_) => {}
        }
        recording.updates.push(event.update);
    }
    Ok(recording)
}

fn load_history(path: &Path) -> Result<Recording, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let candles = decode_rest_klines(&text).map_err(|source| LoadError::History {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Recording {
        key: None,
        updates: candles.into_iter().map(CandleUpdate::closed).collect(),
    })
}

/// Write updates in the CSV recording format.
pub fn write_csv(path: impl AsRef<Path>, updates: &[CandleUpdate]) -> Result<(), LoadError> {
    let path = path.as_ref();
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for update in updates {
        let c = update.candle;
        writer
            .serialize(CsvRow {
                open_time: c.open_time,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                volume: c.volume,
                closed: update.closed,
            })
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
