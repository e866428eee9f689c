//! Named conditions and the corroboration rule table.
//!
//! `evaluate` reads the latest values out of a snapshot once and returns the
//! set of conditions that fired. The scorer folds that set through the rule
//! table; nothing here mutates a running score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::SignalDetails;
use crate::config::ScoringConfig;
use crate::indicators::RetracementDirection;
use crate::snapshot::{last_value, previous_value, IndicatorSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Condition {
    RsiOversold,
    RsiOverbought,
    MacdBullishCross,
    MacdBearishCross,
    AdxStrongBullish,
    AdxStrongBearish,
    AdxModerateBullish,
    AdxModerateBearish,
    PriceAboveVwap,
    PriceBelowVwap,
    PriceAboveCloud,
    PriceBelowCloud,
    PriceInsideCloud,
    TenkanKijunBullishCross,
    TenkanKijunBearishCross,
    NearFibSupport,
    NearFibResistance,
}

impl Condition {
    pub fn tag(self) -> &'static str {
        match self {
            Condition::RsiOversold => "RSI oversold",
            Condition::RsiOverbought => "RSI overbought",
            Condition::MacdBullishCross => "MACD bullish crossover",
            Condition::MacdBearishCross => "MACD bearish crossover",
            Condition::AdxStrongBullish => "ADX strong uptrend",
            Condition::AdxStrongBearish => "ADX strong downtrend",
            Condition::AdxModerateBullish => "ADX moderate uptrend",
            Condition::AdxModerateBearish => "ADX moderate downtrend",
            Condition::PriceAboveVwap => "Price above VWAP",
            Condition::PriceBelowVwap => "Price below VWAP",
            Condition::PriceAboveCloud => "Price above Ichimoku cloud",
            Condition::PriceBelowCloud => "Price below Ichimoku cloud",
            Condition::PriceInsideCloud => "Price inside Ichimoku cloud",
            Condition::TenkanKijunBullishCross => "Tenkan/Kijun bullish crossover",
            Condition::TenkanKijunBearishCross => "Tenkan/Kijun bearish crossover",
            Condition::NearFibSupport => "Near Fibonacci support",
            Condition::NearFibResistance => "Near Fibonacci resistance",
        }
    }
}

/// One corroboration rule: when `condition` fired and agrees with the
/// signal's direction, add `weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub condition: Condition,
    pub direction: Direction,
    pub weight: f64,
}

impl Rule {
    fn new(condition: Condition, direction: Direction, weight: f64) -> Self {
        Self {
            condition,
            direction,
            weight,
        }
    }
}

/// Corroboration rules in evaluation order.
pub fn corroboration_rules(config: &ScoringConfig) -> Vec<Rule> {
    use Condition::*;
    use Direction::*;

    let b = &config.bonus;
    vec![
        Rule::new(AdxStrongBullish, Bullish, b.adx_strong),
        Rule::new(AdxStrongBearish, Bearish, b.adx_strong),
        Rule::new(AdxModerateBullish, Bullish, b.adx_moderate),
        Rule::new(AdxModerateBearish, Bearish, b.adx_moderate),
        Rule::new(PriceAboveVwap, Bullish, b.vwap),
        Rule::new(PriceBelowVwap, Bearish, b.vwap),
        Rule::new(PriceAboveCloud, Bullish, b.cloud),
        Rule::new(PriceBelowCloud, Bearish, b.cloud),
        Rule::new(TenkanKijunBullishCross, Bullish, b.tenkan_kijun_cross),
        Rule::new(TenkanKijunBearishCross, Bearish, b.tenkan_kijun_cross),
        Rule::new(NearFibSupport, Bullish, b.fibonacci),
        Rule::new(NearFibResistance, Bearish, b.fibonacci),
    ]
}

/// Conditions that fired plus the values they were read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    pub fired: BTreeSet<Condition>,
    pub details: SignalDetails,
}

impl Evidence {
    pub fn has(&self, condition: Condition) -> bool {
        self.fired.contains(&condition)
    }
}

/// Which way `a` crossed `b` between the previous and the last position.
fn crossover(a: &[Option<f64>], b: &[Option<f64>]) -> Option<Direction> {
    let (a_prev, a_now) = (previous_value(a)?, last_value(a)?);
    let (b_prev, b_now) = (previous_value(b)?, last_value(b)?);
    if a_prev <= b_prev && a_now > b_now {
        Some(Direction::Bullish)
    } else if a_prev >= b_prev && a_now < b_now {
        Some(Direction::Bearish)
    } else {
        None
    }
}

/// Evaluate every named condition against the latest snapshot values.
pub fn evaluate(snapshot: &IndicatorSnapshot, price: f64, config: &ScoringConfig) -> Evidence {
    let t = &config.thresholds;
    let mut ev = Evidence::default();
    ev.details.price = Some(price);
    ev.details.trend = Some(snapshot.trend.current);

    if let Some(rsi) = snapshot.rsi(config.rsi_period).and_then(|s| last_value(s)) {
        ev.details.rsi = Some(rsi);
        if rsi < t.rsi_oversold {
            ev.fired.insert(Condition::RsiOversold);
        } else if rsi > t.rsi_overbought {
            ev.fired.insert(Condition::RsiOverbought);
        }
    }

    if let Some(macd) = snapshot.macd(&config.macd.tag()) {
        ev.details.macd_line = last_value(&macd.macd_line);
        ev.details.macd_signal = last_value(&macd.signal_line);
        match crossover(&macd.macd_line, &macd.signal_line) {
            Some(Direction::Bullish) => ev.fired.insert(Condition::MacdBullishCross),
            Some(Direction::Bearish) => ev.fired.insert(Condition::MacdBearishCross),
            None => false,
        };
    }

    let adx = &snapshot.adx;
    ev.details.adx = last_value(&adx.adx);
    ev.details.plus_di = last_value(&adx.plus_di);
    ev.details.minus_di = last_value(&adx.minus_di);
    if let (Some(strength), Some(plus), Some(minus)) =
        (ev.details.adx, ev.details.plus_di, ev.details.minus_di)
    {
        let bullish = plus > minus;
        let bearish = minus > plus;
        if strength > t.adx_strong {
            if bullish {
                ev.fired.insert(Condition::AdxStrongBullish);
            } else if bearish {
                ev.fired.insert(Condition::AdxStrongBearish);
            }
        } else if strength > t.adx_moderate {
            if bullish {
                ev.fired.insert(Condition::AdxModerateBullish);
            } else if bearish {
                ev.fired.insert(Condition::AdxModerateBearish);
            }
        }
    }

    if let Some(vwap) = last_value(&snapshot.vwap) {
        ev.details.vwap = Some(vwap);
        if price > vwap {
            ev.fired.insert(Condition::PriceAboveVwap);
        } else if price < vwap {
            ev.fired.insert(Condition::PriceBelowVwap);
        }
    }

    let ichimoku = &snapshot.ichimoku;
    if let Some((top, bottom)) = ichimoku.current_cloud() {
        ev.details.cloud_top = Some(top);
        ev.details.cloud_bottom = Some(bottom);
        let condition = if price > top {
            Condition::PriceAboveCloud
        } else if price < bottom {
            Condition::PriceBelowCloud
        } else {
            Condition::PriceInsideCloud
        };
        ev.fired.insert(condition);
    }
    ev.details.tenkan = last_value(&ichimoku.tenkan);
    ev.details.kijun = last_value(&ichimoku.kijun);
    match crossover(&ichimoku.tenkan, &ichimoku.kijun) {
        Some(Direction::Bullish) => ev.fired.insert(Condition::TenkanKijunBullishCross),
        Some(Direction::Bearish) => ev.fired.insert(Condition::TenkanKijunBearishCross),
        None => false,
    };

    let nearest = snapshot
        .fibonacci
        .current_levels()
        .into_iter()
        .min_by(|a, b| (a.1 - price).abs().total_cmp(&(b.1 - price).abs()));
    if let Some((level, level_price)) = nearest {
        ev.details.nearest_fib = Some((level, level_price));
        let distance_pct = (price - level_price).abs() / price.abs() * 100.0;
        if distance_pct < t.fib_proximity_pct {
            match snapshot.fibonacci.direction {
                Some(RetracementDirection::Up) => ev.fired.insert(Condition::NearFibSupport),
                Some(RetracementDirection::Down) => ev.fired.insert(Condition::NearFibResistance),
                None => false,
            };
        }
    }

    ev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossover_detection() {
        let up_a = vec![Some(1.0), Some(3.0)];
        let up_b = vec![Some(2.0), Some(2.0)];
        assert_eq!(crossover(&up_a, &up_b), Some(Direction::Bullish));
        assert_eq!(crossover(&up_b, &up_a), Some(Direction::Bearish));

        let parallel = vec![Some(3.0), Some(4.0)];
        assert_eq!(crossover(&parallel, &up_b), None);

        let missing = vec![None, Some(3.0)];
        assert_eq!(crossover(&missing, &up_b), None);
    }

    #[test]
    fn tags_are_unique() {
        let rules = corroboration_rules(&ScoringConfig::default());
        let tags: BTreeSet<&str> = rules.iter().map(|r| r.condition.tag()).collect();
        assert_eq!(tags.len(), rules.len());
    }

    #[test]
    fn rule_weights_follow_config() {
        let mut config = ScoringConfig::default();
        config.bonus.cloud = 0.2;
        let rules = corroboration_rules(&config);
        let cloud = rules
            .iter()
            .find(|r| r.condition == Condition::PriceAboveCloud)
            .unwrap();
        assert_eq!(cloud.weight, 0.2);
        assert_eq!(cloud.direction, Direction::Bullish);
    }
}
