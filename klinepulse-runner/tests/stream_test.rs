//! End-to-end: recorded file → stream manager → subscriber payloads.

use std::time::Duration;

use klinepulse_core::{Candle, SignalType, WindowKey};
use klinepulse_runner::{
    load_recording, write_csv, CandleUpdate, PulseConfig, ReplayFeed, StreamManager,
    SyntheticFeed,
};

fn recorded_updates(n: i64) -> Vec<CandleUpdate> {
    let mut updates = Vec::new();
    let mut price: f64 = 100.0;
    for i in 0..n {
        let open = price;
        let close = open + if i % 7 < 4 { 0.8 } else { -0.6 };
        let (high, low) = (open.max(close) + 0.5, open.min(close) - 0.5);
        let forming = Candle::new(i * 60_000, open, high, low, (open + close) / 2.0, 5.0);
        let closed = Candle::new(i * 60_000, open, high, low, close, 10.0);
        updates.push(CandleUpdate::forming(forming));
        updates.push(CandleUpdate::closed(closed));
        price = close;
    }
    updates
}

#[tokio::test]
async fn replayed_recording_reaches_subscriber_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("btc.csv");
    write_csv(&path, &recorded_updates(260)).unwrap();
    let recording = load_recording(&path).unwrap();
    assert_eq!(recording.updates.len(), 520);

    let key = WindowKey::new("BTCUSDT", "1m");
    let feed = ReplayFeed::new()
        .with_recording(key.clone(), recording)
        .with_backfill(420);
    let manager = StreamManager::new(PulseConfig::default(), feed);

    let mut sub = manager.subscribe(&key).await;
    let mut last_seen = i64::MIN;
    let final_payload = loop {
        let payload = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("payload within timeout")
            .expect("subscription open");
        let open_time = payload.last_open_time().unwrap();
        assert!(open_time >= last_seen, "payloads went backwards");
        last_seen = open_time;
        assert_eq!(payload.klines.len(), payload.indicators.timestamps.len());
        if open_time == 259 * 60_000 && payload.klines.last().unwrap().volume == 10.0 {
            break payload;
        }
    };

    assert_eq!(final_payload.klines.len(), 260);
    assert_ne!(final_payload.signal.signal_type, SignalType::Error);
    assert!((0.0..=1.0).contains(&final_payload.signal.reliability));

    manager.shutdown().await;
}

#[tokio::test]
async fn synthetic_feed_drives_live_payloads() {
    let feed = SyntheticFeed {
        history_candles: 300,
        ticks_per_candle: 2,
        max_candles: Some(5),
        ..SyntheticFeed::default()
    };
    let mut config = PulseConfig::default();
    config.feed.backfill_limit = 250;
    let manager = StreamManager::new(config, feed);

    let key = WindowKey::new("ethusdt", "1m");
    let mut sub = manager.subscribe(&key).await;
    let first = sub.recv().await.unwrap();
    assert_eq!(first.symbol, "ETHUSDT");
    assert!(first.klines.len() >= 250);

    let expected_last = 1_700_000_000_000 + 304 * 60_000;
    loop {
        let payload = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("payload within timeout")
            .expect("subscription open");
        if payload.last_open_time() == Some(expected_last) {
            assert_eq!(payload.klines.len(), 255);
            break;
        }
    }

    let stats = manager.unsubscribe(sub).await.unwrap();
    assert_eq!(stats.rejected, 0);
}
