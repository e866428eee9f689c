//! Indicator and scoring configuration.
//!
//! Both structs deserialize with `#[serde(default)]`, so a partial TOML table
//! only overrides the fields it names.

use serde::{Deserialize, Serialize};

use crate::components::indicator::IndicatorError;
use crate::indicators::{
    Adx, Bollinger, Fibonacci, Ichimoku, Macd, Stochastic, TrendStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdParams {
    pub fn indicator(&self) -> Macd {
        Macd::new(self.fast, self.slow, self.signal)
    }

    /// Snapshot tag, e.g. "12_26_9".
    pub fn tag(&self) -> String {
        self.indicator().params()
    }
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerParams {
    pub period: usize,
    pub std_dev: f64,
}

impl BollingerParams {
    pub fn indicator(&self) -> Bollinger {
        Bollinger::new(self.period, self.std_dev)
    }
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StochasticParams {
    pub k_period: usize,
    pub d_period: usize,
}

impl Default for StochasticParams {
    fn default() -> Self {
        Self {
            k_period: 14,
            d_period: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IchimokuParams {
    pub tenkan: usize,
    pub kijun: usize,
    pub senkou_b: usize,
    pub chikou: usize,
    pub displacement: usize,
}

impl IchimokuParams {
    pub fn indicator(&self) -> Ichimoku {
        Ichimoku::new(
            self.tenkan,
            self.kijun,
            self.senkou_b,
            self.chikou,
            self.displacement,
        )
    }
}

impl Default for IchimokuParams {
    fn default() -> Self {
        Self {
            tenkan: 9,
            kijun: 26,
            senkou_b: 52,
            chikou: 26,
            displacement: 26,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciParams {
    pub period: usize,
    pub levels: Vec<f64>,
}

impl Default for FibonacciParams {
    fn default() -> Self {
        Self {
            period: 20,
            levels: vec![0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendParams {
    pub fast: usize,
    pub slow: usize,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self { fast: 50, slow: 200 }
    }
}

/// Every indicator parameterisation computed per snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_periods: Vec<usize>,
    pub ema_periods: Vec<usize>,
    pub sma_periods: Vec<usize>,
    pub macd: Vec<MacdParams>,
    pub bollinger: Vec<BollingerParams>,
    pub atr_periods: Vec<usize>,
    pub adx_period: usize,
    pub stochastic: StochasticParams,
    pub ichimoku: IchimokuParams,
    pub fibonacci: FibonacciParams,
    pub trend: TrendParams,
    pub volatility_atr_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_periods: vec![14],
            ema_periods: vec![9, 21, 50, 200],
            sma_periods: vec![10, 20, 50, 200],
            macd: vec![MacdParams::default()],
            bollinger: vec![BollingerParams::default()],
            atr_periods: vec![14],
            adx_period: 14,
            stochastic: StochasticParams::default(),
            ichimoku: IchimokuParams::default(),
            fibonacci: FibonacciParams::default(),
            trend: TrendParams::default(),
            volatility_atr_period: 14,
        }
    }
}

impl IndicatorConfig {
    /// Largest warm-up across all configured indicators. A window needs
    /// `max_lookback() + 1` candles before every indicator has a value.
    pub fn max_lookback(&self) -> usize {
        let periods = self
            .rsi_periods
            .iter()
            .chain(&self.atr_periods)
            .map(|p| p.saturating_sub(1));
        let macd = self.macd.iter().map(|m| m.indicator().signal_lookback());
        let bollinger = self.bollinger.iter().map(|b| b.indicator().lookback());

        let fixed = [
            Adx::new(self.adx_period).lookback(),
            Stochastic::new(self.stochastic.k_period, self.stochastic.d_period).lookback(),
            self.ichimoku.indicator().lookback(),
            Fibonacci::new(self.fibonacci.period, Vec::new()).lookback(),
            TrendStatus::new(self.trend.fast, self.trend.slow).lookback(),
            self.volatility_atr_period.saturating_sub(1),
        ];

        periods
            .chain(macd)
            .chain(bollinger)
            .chain(fixed)
            .max()
            .unwrap_or(0)
    }

    /// Reject parameterisations that no indicator can compute.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        fn positive(
            indicator: &'static str,
            param: &'static str,
            value: usize,
        ) -> Result<(), IndicatorError> {
            if value == 0 {
                return Err(IndicatorError::InvalidParameter {
                    indicator,
                    param,
                    value: value.to_string(),
                });
            }
            Ok(())
        }

        for &p in &self.rsi_periods {
            positive("rsi", "period", p)?;
        }
        for &p in &self.ema_periods {
            positive("ema", "period", p)?;
        }
        for &p in &self.sma_periods {
            positive("sma", "period", p)?;
        }
        for &p in &self.atr_periods {
            positive("atr", "period", p)?;
        }
        for m in &self.macd {
            positive("macd", "fast", m.fast)?;
            positive("macd", "signal", m.signal)?;
            if m.fast >= m.slow {
                return Err(IndicatorError::InvalidParameter {
                    indicator: "macd",
                    param: "slow",
                    value: format!("{} (must exceed fast {})", m.slow, m.fast),
                });
            }
        }
        for b in &self.bollinger {
            positive("bollinger", "period", b.period)?;
            if !b.std_dev.is_finite() || b.std_dev <= 0.0 {
                return Err(IndicatorError::InvalidParameter {
                    indicator: "bollinger",
                    param: "std_dev",
                    value: b.std_dev.to_string(),
                });
            }
        }
        positive("adx", "period", self.adx_period)?;
        positive("stochastic", "k_period", self.stochastic.k_period)?;
        positive("stochastic", "d_period", self.stochastic.d_period)?;
        positive("ichimoku", "tenkan", self.ichimoku.tenkan)?;
        positive("ichimoku", "kijun", self.ichimoku.kijun)?;
        positive("ichimoku", "senkou_b", self.ichimoku.senkou_b)?;
        positive("fibonacci", "period", self.fibonacci.period)?;
        if let Some(bad) = self
            .fibonacci
            .levels
            .iter()
            .find(|l| !(0.0..=1.0).contains(*l))
        {
            return Err(IndicatorError::InvalidParameter {
                indicator: "fibonacci",
                param: "levels",
                value: bad.to_string(),
            });
        }
        positive("trend", "fast", self.trend.fast)?;
        positive("trend", "slow", self.trend.slow)?;
        positive("volatility", "atr_period", self.volatility_atr_period)?;

        Ok(())
    }

    /// BLAKE3 hex digest of the canonical JSON form of this configuration.
    ///
    /// Identical parameterisations always produce the same fingerprint, so
    /// consumers can tell which parameter set produced a snapshot.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&canonical).to_hex().to_string()
    }
}

/// Thresholds the scorer's conditions compare against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub adx_strong: f64,
    pub adx_moderate: f64,
    /// Distance to a Fibonacci level, in percent of price.
    pub fib_proximity_pct: f64,
    /// Reliability at which BUY/SELL are promoted to STRONG_BUY/STRONG_SELL.
    pub strong: f64,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            adx_strong: 25.0,
            adx_moderate: 20.0,
            fib_proximity_pct: 0.5,
            strong: 0.75,
        }
    }
}

/// Starting reliability chosen by the primary RSI x MACD pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseReliability {
    pub aligned: f64,
    pub macd_only: f64,
    pub rsi_only: f64,
    pub neutral: f64,
}

impl Default for BaseReliability {
    fn default() -> Self {
        Self {
            aligned: 0.60,
            macd_only: 0.45,
            rsi_only: 0.35,
            neutral: 0.10,
        }
    }
}

/// Additive bonuses for corroborating conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorroborationBonus {
    pub adx_strong: f64,
    pub adx_moderate: f64,
    pub vwap: f64,
    pub cloud: f64,
    pub tenkan_kijun_cross: f64,
    pub fibonacci: f64,
}

impl Default for CorroborationBonus {
    fn default() -> Self {
        Self {
            adx_strong: 0.10,
            adx_moderate: 0.05,
            vwap: 0.05,
            cloud: 0.10,
            tenkan_kijun_cross: 0.05,
            fibonacci: 0.05,
        }
    }
}

/// Signal scorer configuration. `rsi_period` and `macd` select which
/// configured series the primary conditions read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rsi_period: usize,
    pub macd: MacdParams,
    pub thresholds: ScoringThresholds,
    pub base: BaseReliability,
    pub bonus: CorroborationBonus,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd: MacdParams::default(),
            thresholds: ScoringThresholds::default(),
            base: BaseReliability::default(),
            bonus: CorroborationBonus::default(),
        }
    }
}

impl ScoringConfig {
    /// Check that the scorer's inputs are part of `indicators`.
    pub fn validate_against(&self, indicators: &IndicatorConfig) -> Result<(), IndicatorError> {
        if !indicators.rsi_periods.contains(&self.rsi_period) {
            return Err(IndicatorError::InvalidParameter {
                indicator: "scoring",
                param: "rsi_period",
                value: format!("{} (not among configured RSI periods)", self.rsi_period),
            });
        }
        if !indicators.macd.contains(&self.macd) {
            return Err(IndicatorError::InvalidParameter {
                indicator: "scoring",
                param: "macd",
                value: format!("{} (not among configured MACD sets)", self.macd.tag()),
            });
        }
        let t = &self.thresholds;
        if t.rsi_oversold >= t.rsi_overbought {
            return Err(IndicatorError::InvalidParameter {
                indicator: "scoring",
                param: "rsi_oversold",
                value: format!("{} (must be below overbought {})", t.rsi_oversold, t.rsi_overbought),
            });
        }
        if t.adx_moderate > t.adx_strong {
            return Err(IndicatorError::InvalidParameter {
                indicator: "scoring",
                param: "adx_moderate",
                value: format!("{} (must not exceed strong {})", t.adx_moderate, t.adx_strong),
            });
        }
        Ok(())
    }
}
