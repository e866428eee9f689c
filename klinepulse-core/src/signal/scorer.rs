//! Reduction of evidence into a `Signal`.
//!
//! 1. Seed type and reliability from the primary RSI x MACD pair.
//! 2. Add each corroboration rule's weight when its condition fired and
//!    agrees with the seeded direction.
//! 3. Clamp to [0, 1]; promote BUY/SELL to STRONG at the strong threshold.
//! 4. Reason = sorted tags of every fired condition, or "Neutral".

use std::collections::BTreeSet;

use super::rules::{corroboration_rules, evaluate, Condition, Direction, Evidence};
use super::{Signal, SignalType};
use crate::config::ScoringConfig;
use crate::snapshot::IndicatorSnapshot;

const NEUTRAL: &str = "Neutral";

fn primary_direction(ev: &Evidence, bullish: Condition, bearish: Condition) -> Option<Direction> {
    if ev.has(bullish) {
        Some(Direction::Bullish)
    } else if ev.has(bearish) {
        Some(Direction::Bearish)
    } else {
        None
    }
}

fn directed(direction: Direction) -> SignalType {
    match direction {
        Direction::Bullish => SignalType::Buy,
        Direction::Bearish => SignalType::Sell,
    }
}

/// Seed from RSI extreme x MACD cross. Disagreeing primaries cancel out.
fn seed(ev: &Evidence, config: &ScoringConfig) -> (SignalType, f64) {
    let base = &config.base;
    let rsi = primary_direction(ev, Condition::RsiOversold, Condition::RsiOverbought);
    let macd = primary_direction(ev, Condition::MacdBullishCross, Condition::MacdBearishCross);

    match (rsi, macd) {
        (Some(r), Some(m)) if r == m => (directed(r), base.aligned),
        (Some(_), Some(_)) => (SignalType::Hold, base.neutral),
        (None, Some(m)) => (directed(m), base.macd_only),
        (Some(r), None) => (directed(r), base.rsi_only),
        (None, None) => (SignalType::Hold, base.neutral),
    }
}

/// Score a snapshot at `price`. Pure: identical inputs give identical output.
pub fn score(snapshot: &IndicatorSnapshot, price: f64, config: &ScoringConfig) -> Signal {
    if let Some(error) = &snapshot.error {
        return Signal::error(error.clone());
    }
    if !price.is_finite() || price <= 0.0 {
        return Signal::error(format!("invalid price: {price}"));
    }

    let ev = evaluate(snapshot, price, config);
    let (mut signal_type, mut reliability) = seed(&ev, config);

    if let Some(direction) = signal_type.direction() {
        reliability += corroboration_rules(config)
            .iter()
            .filter(|rule| rule.direction == direction && ev.has(rule.condition))
            .map(|rule| rule.weight)
            .sum::<f64>();
    }
    let reliability = reliability.clamp(0.0, 1.0);

    if reliability >= config.thresholds.strong {
        signal_type = match signal_type {
            SignalType::Buy => SignalType::StrongBuy,
            SignalType::Sell => SignalType::StrongSell,
            other => other,
        };
    }

    let tags: Vec<String> = ev
        .fired
        .iter()
        .map(|c| c.tag())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let reason = if tags.is_empty() {
        NEUTRAL.to_string()
    } else {
        tags.join(", ")
    };

    Signal {
        signal_type,
        reliability,
        reason,
        tags,
        details: ev.details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorConfig;
    use crate::snapshot::compute_snapshot;

    fn evidence(conditions: &[Condition]) -> Evidence {
        Evidence {
            fired: conditions.iter().copied().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn seed_table() {
        let cfg = ScoringConfig::default();
        use Condition::*;

        assert_eq!(
            seed(&evidence(&[RsiOversold, MacdBullishCross]), &cfg),
            (SignalType::Buy, 0.60)
        );
        assert_eq!(
            seed(&evidence(&[RsiOverbought, MacdBearishCross]), &cfg),
            (SignalType::Sell, 0.60)
        );
        assert_eq!(
            seed(&evidence(&[MacdBullishCross]), &cfg),
            (SignalType::Buy, 0.45)
        );
        assert_eq!(
            seed(&evidence(&[RsiOverbought]), &cfg),
            (SignalType::Sell, 0.35)
        );
        assert_eq!(
            seed(&evidence(&[RsiOversold, MacdBearishCross]), &cfg),
            (SignalType::Hold, 0.10)
        );
        assert_eq!(seed(&evidence(&[]), &cfg), (SignalType::Hold, 0.10));
    }

    #[test]
    fn degenerate_snapshot_is_error() {
        let snapshot = compute_snapshot(&[], &IndicatorConfig::default());
        let signal = score(&snapshot, 100.0, &ScoringConfig::default());
        assert_eq!(signal.signal_type, SignalType::Error);
        assert_eq!(signal.reliability, 0.0);
        assert!(signal.reason.contains("empty window"));
    }

    #[test]
    fn invalid_price_is_error() {
        let candles = crate::indicators::make_candles(&[100.0, 101.0, 102.0]);
        let snapshot = compute_snapshot(&candles, &IndicatorConfig::default());
        let signal = score(&snapshot, f64::NAN, &ScoringConfig::default());
        assert!(signal.is_error());
    }

    #[test]
    fn short_window_is_neutral_hold() {
        // Too short for RSI, MACD, cloud and Fibonacci; only VWAP can fire.
        let candles = crate::indicators::make_candles(&[100.0, 100.0, 100.0]);
        let snapshot = compute_snapshot(&candles, &IndicatorConfig::default());
        let signal = score(&snapshot, 100.0, &ScoringConfig::default());
        assert_eq!(signal.signal_type, SignalType::Hold);
        assert_eq!(signal.reliability, 0.10);
        assert_eq!(signal.reason, "Neutral");
        assert!(signal.tags.is_empty());
    }
}
