//! Look-ahead contamination tests for the single-series indicators.
//!
//! Compute on a truncated window (0..100) and the full window (0..200); the
//! first 100 positions must match exactly. Any difference means a value at
//! position t depends on candles after t.

use klinepulse_core::components::indicator::Indicator;
use klinepulse_core::domain::Candle;
use klinepulse_core::indicators::*;

fn make_test_candles(n: usize) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        // Deterministic pseudo-random walk using a simple LCG
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.05;
        price = (price + change).max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        candles.push(Candle::new(
            1_700_000_000_000 + i as i64 * 60_000,
            open,
            open.max(close) + 2.0,
            open.min(close) - 2.0,
            close,
            1000.0 + i as f64 * 10.0,
        ));
    }

    candles
}

fn assert_no_lookahead(indicator: &dyn Indicator, full: &[Candle], truncated_len: usize) {
    let a = indicator.compute(&full[..truncated_len]).unwrap();
    let b = indicator.compute(full).unwrap();
    for i in 0..truncated_len {
        let same = (a[i].is_nan() && b[i].is_nan()) || a[i] == b[i];
        assert!(
            same,
            "{}: look-ahead at {i}: truncated={} full={}",
            indicator.name(),
            a[i],
            b[i]
        );
    }
}

#[test]
fn single_series_indicators_are_causal() {
    let candles = make_test_candles(200);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Sma::new(20)),
        Box::new(Sma::strict(50)),
        Box::new(Ema::new(21)),
        Box::new(Rsi::new(14)),
        Box::new(Atr::new(14)),
        Box::new(Obv::new()),
        Box::new(Vwap::new()),
        Box::new(VolatilityPct::new(14)),
    ];
    for indicator in &indicators {
        assert_no_lookahead(indicator.as_ref(), &candles, 100);
    }
}

#[test]
fn multi_series_families_are_causal() {
    let candles = make_test_candles(200);
    let (short, full) = (&candles[..100], &candles[..]);

    let eq = |a: &[f64], b: &[f64]| {
        a.iter()
            .zip(b)
            .all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
    };

    let macd = Macd::new(12, 26, 9);
    let (a, b) = (macd.compute(short).unwrap(), macd.compute(full).unwrap());
    assert!(eq(&a.line, &b.line[..100]));
    assert!(eq(&a.signal, &b.signal[..100]));

    let adx = Adx::new(14);
    let (a, b) = (adx.compute(short).unwrap(), adx.compute(full).unwrap());
    assert!(eq(&a.adx, &b.adx[..100]));

    let bb = Bollinger::new(20, 2.0);
    let (a, b) = (bb.compute(short).unwrap(), bb.compute(full).unwrap());
    assert!(eq(&a.upper, &b.upper[..100]));

    let stoch = Stochastic::new(14, 3);
    let (a, b) = (stoch.compute(short).unwrap(), stoch.compute(full).unwrap());
    assert!(eq(&a.d, &b.d[..100]));

    // Senkou spans are displaced forward, never backward.
    let ichimoku = Ichimoku::default();
    let (a, b) = (ichimoku.compute(short).unwrap(), ichimoku.compute(full).unwrap());
    assert!(eq(&a.senkou_a, &b.senkou_a[..100]));
    assert!(eq(&a.senkou_b, &b.senkou_b[..100]));
}
