//! Exchange kline wire formats.
//!
//! Live stream event (prices and volumes are decimal strings):
//!
//! ```json
//! {"e":"kline","E":1700000000123,"s":"BTCUSDT",
//!  "k":{"t":1700000000000,"T":1700000059999,"s":"BTCUSDT","i":"1m",
//!       "o":"37000.1","h":"37010.0","l":"36990.5","c":"37005.2","v":"12.3","x":false}}
//! ```
//!
//! Combined-stream frames wrap the event as `{"stream": "...", "data": {...}}`.
//! REST history rows are arrays: `[open_time, "o", "h", "l", "c", "v", close_time, ...]`.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::feed::CandleUpdate;
use klinepulse_core::{Candle, WindowKey};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected event type '{0}'")]
    UnexpectedEvent(String),

    #[error("field {field} is not a number: '{value}'")]
    BadNumber { field: &'static str, value: String },

    #[error("malformed kline row {index}: {detail}")]
    BadRow { index: usize, detail: String },
}

/// A decoded live update and the stream it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineEvent {
    pub key: WindowKey,
    pub update: CandleUpdate,
}

#[derive(Deserialize)]
struct EventFrame {
    #[serde(rename = "e")]
    event: String,
    #[serde(rename = "k")]
    kline: Option<KlineBody>,
}

#[derive(Deserialize)]
struct KlineBody {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    closed: bool,
}

fn number(field: &'static str, value: &str) -> Result<f64, DecodeError> {
    value.trim().parse::<f64>().map_err(|_| DecodeError::BadNumber {
        field,
        value: value.to_string(),
    })
}

/// Decode one live kline event, bare or wrapped in a combined-stream frame.
pub fn decode_kline_event(text: &str) -> Result<KlineEvent, DecodeError> {
    let mut value: Value = serde_json::from_str(text)?;
    if let Some(inner) = value.get_mut("data") {
        value = inner.take();
    }

    let frame: EventFrame = serde_json::from_value(value)?;
    if frame.event != "kline" {
        return Err(DecodeError::UnexpectedEvent(frame.event));
    }
    let Some(k) = frame.kline else {
        return Err(DecodeError::UnexpectedEvent("kline without body".to_string()));
    };

    let candle = Candle::new(
        k.open_time,
        number("o", &k.open)?,
        number("h", &k.high)?,
        number("l", &k.low)?,
        number("c", &k.close)?,
        number("v", &k.volume)?,
    );
    Ok(KlineEvent {
        key: WindowKey::new(&k.symbol, k.interval),
        update: CandleUpdate {
            candle,
            closed: k.closed,
        },
    })
}

/// Decode a REST kline history response (array of rows), oldest first.
pub fn decode_rest_klines(text: &str) -> Result<Vec<Candle>, DecodeError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(text)?;
    rows.iter()
        .enumerate()
        .map(|(index, row)| decode_row(index, row))
        .collect()
}

fn decode_row(index: usize, row: &[Value]) -> Result<Candle, DecodeError> {
    if row.len() < 6 {
        return Err(DecodeError::BadRow {
            index,
            detail: format!("expected at least 6 columns, got {}", row.len()),
        });
    }
    let open_time = row[0].as_i64().ok_or_else(|| DecodeError::BadRow {
        index,
        detail: format!("open_time is not an integer: {}", row[0]),
    })?;

    let field = |i: usize, name: &'static str| -> Result<f64, DecodeError> {
        match &row[i] {
            Value::String(s) => number(name, s),
            Value::Number(n) => n.as_f64().ok_or_else(|| DecodeError::BadNumber {
                field: name,
                value: n.to_string(),
            }),
            other => Err(DecodeError::BadNumber {
                field: name,
                value: other.to_string(),
            }),
        }
    };

    Ok(Candle::new(
        open_time,
        field(1, "open")?,
        field(2, "high")?,
        field(3, "low")?,
        field(4, "close")?,
        field(5, "volume")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{"e":"kline","E":1700000000123,"s":"BTCUSDT","k":{"t":1700000000000,"T":1700000059999,"s":"BTCUSDT","i":"1m","o":"37000.1","h":"37010.0","l":"36990.5","c":"37005.2","v":"12.3","x":false}}"#;

    #[test]
    fn decodes_live_event() {
        let event = decode_kline_event(EVENT).unwrap();
        assert_eq!(event.key, WindowKey::new("BTCUSDT", "1m"));
        assert!(!event.update.closed);
        let c = event.update.candle;
        assert_eq!(c.open_time, 1_700_000_000_000);
        assert_eq!(c.open, 37000.1);
        assert_eq!(c.close, 37005.2);
        assert_eq!(c.volume, 12.3);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn decodes_combined_stream_frame() {
        let framed = format!(r#"{{"stream":"btcusdt@kline_1m","data":{EVENT}}}"#);
        let event = decode_kline_event(&framed).unwrap();
        assert_eq!(event.key.symbol, "BTCUSDT");
    }

    #[test]
    fn rejects_other_events() {
        let err = decode_kline_event(r#"{"e":"trade","s":"BTCUSDT"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEvent(e) if e == "trade"));
    }

    #[test]
    fn rejects_non_numeric_price() {
        let bad = EVENT.replace(r#""c":"37005.2""#, r#""c":"n/a""#);
        let err = decode_kline_event(&bad).unwrap_err();
        assert!(matches!(err, DecodeError::BadNumber { field: "c", .. }));
    }

    #[test]
    fn decodes_rest_rows() {
        let body = r#"[
            [1700000000000,"10.0","11.0","9.5","10.5","100.0",1700000059999,"1000",10,"50","500","0"],
            [1700000060000,"10.5","12.0","10.0","11.5","80.0",1700000119999,"900",8,"40","450","0"]
        ]"#;
        let candles = decode_rest_klines(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].open_time, 1_700_000_060_000);
        assert_eq!(candles[1].high, 12.0);
    }

    #[test]
    fn short_rest_row_is_rejected() {
        let err = decode_rest_klines(r#"[[1700000000000,"10.0"]]"#).unwrap_err();
        assert!(matches!(err, DecodeError::BadRow { index: 0, .. }));
    }
}
