//! Indicator snapshot — the fixed, versioned output schema of the library.
//!
//! `compute_snapshot` recomputes every configured indicator over a window.
//! Series are aligned 1:1 with the window and carry `None` where a value is
//! unavailable; NaN and infinities never leave this module.
//!
//! A family whose computation fails is recorded in `faults` and emitted as
//! all-unavailable; the other families are unaffected. An empty window, or
//! one without a single finite close, yields a degenerate snapshot with
//! `error` set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::components::indicator::{Indicator, IndicatorError};
use crate::config::IndicatorConfig;
use crate::domain::Candle;
use crate::indicators::{
    Adx, Atr, Ema, Fibonacci, Obv, RetracementDirection, Rsi, Sma, Stochastic, TrendLabel,
    TrendStatus, VolatilityPct, Vwap,
};

pub const SCHEMA_VERSION: u32 = 1;

/// Aligned series; `None` = unavailable.
pub type Series = Vec<Option<f64>>;

fn to_series(values: &[f64]) -> Series {
    values.iter().map(|v| v.is_finite().then_some(*v)).collect()
}

fn to_scalar(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn unavailable(n: usize) -> Series {
    vec![None; n]
}

/// Last element of a series, if available.
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Second-to-last element of a series, if available.
pub fn previous_value(series: &[Option<f64>]) -> Option<f64> {
    series.len().checked_sub(2).and_then(|i| series[i])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub params: String,
    pub macd_line: Series,
    pub signal_line: Series,
    pub histogram: Series,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerSeries {
    pub params: String,
    pub middle: Series,
    pub upper: Series,
    pub lower: Series,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdxSeries {
    pub period: usize,
    pub adx: Series,
    pub plus_di: Series,
    pub minus_di: Series,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticSeries {
    pub k_period: usize,
    pub d_period: usize,
    pub k: Series,
    pub d: Series,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IchimokuSeries {
    pub tenkan: Series,
    pub kijun: Series,
    pub senkou_a: Series,
    pub senkou_b: Series,
    pub chikou: Series,
}

impl IchimokuSeries {
    /// (top, bottom) of the cloud at the last position.
    pub fn current_cloud(&self) -> Option<(f64, f64)> {
        let a = last_value(&self.senkou_a)?;
        let b = last_value(&self.senkou_b)?;
        Some((a.max(b), a.min(b)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevelSeries {
    pub level: f64,
    pub uptrend: Series,
    pub downtrend: Series,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciSeries {
    pub period: usize,
    pub direction: Option<RetracementDirection>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub levels: Vec<FibonacciLevelSeries>,
}

impl FibonacciSeries {
    /// (level fraction, price) of every level in the active swing direction.
    pub fn current_levels(&self) -> Vec<(f64, f64)> {
        let Some(direction) = self.direction else {
            return Vec::new();
        };
        self.levels
            .iter()
            .filter_map(|l| {
                let series = match direction {
                    RetracementDirection::Up => &l.uptrend,
                    RetracementDirection::Down => &l.downtrend,
                };
                last_value(series).map(|price| (l.level, price))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub current: TrendLabel,
    pub sma50_gt_sma200: Option<bool>,
    pub details: Vec<TrendLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySeries {
    pub period: usize,
    pub atr_percentage: Series,
    pub current_atr_percentage: Option<f64>,
}

/// One isolated indicator failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorFault {
    pub indicator: String,
    pub message: String,
}

/// Full indicator output for one window, schema version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub schema_version: u32,
    /// Fingerprint of the `IndicatorConfig` that produced this snapshot.
    pub config_fingerprint: String,
    pub timestamps: Vec<i64>,
    pub sma: BTreeMap<String, Series>,
    pub ema: BTreeMap<String, Series>,
    pub rsi: BTreeMap<String, Series>,
    pub macd: Vec<MacdSeries>,
    pub bollinger: Vec<BollingerSeries>,
    pub atr: BTreeMap<String, Series>,
    pub adx: AdxSeries,
    pub stochastic: StochasticSeries,
    pub obv: Series,
    pub vwap: Series,
    pub ichimoku: IchimokuSeries,
    pub fibonacci: FibonacciSeries,
    pub trend: TrendSeries,
    pub volatility: VolatilitySeries,
    pub faults: Vec<IndicatorFault>,
    /// Set when the window cannot support any computation.
    pub error: Option<String>,
}

impl IndicatorSnapshot {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn is_degenerate(&self) -> bool {
        self.error.is_some()
    }

    pub fn rsi(&self, period: usize) -> Option<&Series> {
        self.rsi.get(&format!("rsi_{period}"))
    }

    pub fn macd(&self, params: &str) -> Option<&MacdSeries> {
        self.macd.iter().find(|m| m.params == params)
    }

    /// Snapshot with every family present but unavailable, and `error` set.
    fn degenerate(candles: &[Candle], config: &IndicatorConfig, error: String) -> Self {
        let mut snapshot = Self::unavailable(candles, config);
        snapshot.error = Some(error);
        snapshot
    }

    fn unavailable(candles: &[Candle], config: &IndicatorConfig) -> Self {
        let n = candles.len();
        let keyed = |prefix: &str, periods: &[usize]| -> BTreeMap<String, Series> {
            periods
                .iter()
                .map(|p| (format!("{prefix}_{p}"), unavailable(n)))
                .collect()
        };

        Self {
            schema_version: SCHEMA_VERSION,
            config_fingerprint: config.fingerprint(),
            timestamps: candles.iter().map(|c| c.open_time).collect(),
            sma: keyed("sma", &config.sma_periods),
            ema: keyed("ema", &config.ema_periods),
            rsi: keyed("rsi", &config.rsi_periods),
            macd: config
                .macd
                .iter()
                .map(|m| unavailable_macd(m.tag(), n))
                .collect(),
            bollinger: config
                .bollinger
                .iter()
                .map(|b| unavailable_bollinger(b.indicator().params(), n))
                .collect(),
            atr: keyed("atr", &config.atr_periods),
            adx: unavailable_adx(config.adx_period, n),
            stochastic: unavailable_stochastic(config, n),
            obv: unavailable(n),
            vwap: unavailable(n),
            ichimoku: unavailable_ichimoku(n),
            fibonacci: unavailable_fibonacci(config, n),
            trend: unavailable_trend(n),
            volatility: unavailable_volatility(config.volatility_atr_period, n),
            faults: Vec::new(),
            error: None,
        }
    }
}

fn unavailable_macd(params: String, n: usize) -> MacdSeries {
    MacdSeries {
        params,
        macd_line: unavailable(n),
        signal_line: unavailable(n),
        histogram: unavailable(n),
    }
}

fn unavailable_bollinger(params: String, n: usize) -> BollingerSeries {
    BollingerSeries {
        params,
        middle: unavailable(n),
        upper: unavailable(n),
        lower: unavailable(n),
    }
}

fn unavailable_adx(period: usize, n: usize) -> AdxSeries {
    AdxSeries {
        period,
        adx: unavailable(n),
        plus_di: unavailable(n),
        minus_di: unavailable(n),
    }
}

fn unavailable_stochastic(config: &IndicatorConfig, n: usize) -> StochasticSeries {
    StochasticSeries {
        k_period: config.stochastic.k_period,
        d_period: config.stochastic.d_period,
        k: unavailable(n),
        d: unavailable(n),
    }
}

fn unavailable_ichimoku(n: usize) -> IchimokuSeries {
    IchimokuSeries {
        tenkan: unavailable(n),
        kijun: unavailable(n),
        senkou_a: unavailable(n),
        senkou_b: unavailable(n),
        chikou: unavailable(n),
    }
}

fn unavailable_fibonacci(config: &IndicatorConfig, n: usize) -> FibonacciSeries {
    FibonacciSeries {
        period: config.fibonacci.period,
        direction: None,
        high: None,
        low: None,
        levels: config
            .fibonacci
            .levels
            .iter()
            .map(|&level| FibonacciLevelSeries {
                level,
                uptrend: unavailable(n),
                downtrend: unavailable(n),
            })
            .collect(),
    }
}

fn unavailable_trend(n: usize) -> TrendSeries {
    TrendSeries {
        current: TrendLabel::Flat,
        sma50_gt_sma200: None,
        details: vec![TrendLabel::Flat; n],
    }
}

fn unavailable_volatility(period: usize, n: usize) -> VolatilitySeries {
    VolatilitySeries {
        period,
        atr_percentage: unavailable(n),
        current_atr_percentage: None,
    }
}

/// Records a failed family and hands back the fallback output.
struct FaultLog(Vec<IndicatorFault>);

impl FaultLog {
    fn isolate<T>(&mut self, name: String, result: Result<T, IndicatorError>, fallback: T) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(indicator = %name, error = %e, "indicator degraded to unavailable");
                self.0.push(IndicatorFault {
                    indicator: name,
                    message: e.to_string(),
                });
                fallback
            }
        }
    }

    fn series(&mut self, indicator: &dyn Indicator, candles: &[Candle]) -> Series {
        let result = indicator.compute(candles).map(|v| to_series(&v));
        self.isolate(indicator.name().to_string(), result, unavailable(candles.len()))
    }
}

/// Recompute every configured indicator over `candles`.
pub fn compute_snapshot(candles: &[Candle], config: &IndicatorConfig) -> IndicatorSnapshot {
    if candles.is_empty() {
        return IndicatorSnapshot::degenerate(
            candles,
            config,
            "insufficient data: empty window".to_string(),
        );
    }
    if !candles.iter().any(|c| c.close.is_finite()) {
        return IndicatorSnapshot::degenerate(
            candles,
            config,
            "insufficient data: no finite close prices".to_string(),
        );
    }

    let n = candles.len();
    let mut snapshot = IndicatorSnapshot::unavailable(candles, config);
    let mut faults = FaultLog(Vec::new());

    for &p in &config.sma_periods {
        snapshot
            .sma
            .insert(format!("sma_{p}"), faults.series(&Sma::new(p), candles));
    }
    for &p in &config.ema_periods {
        snapshot
            .ema
            .insert(format!("ema_{p}"), faults.series(&Ema::new(p), candles));
    }
    for &p in &config.rsi_periods {
        snapshot
            .rsi
            .insert(format!("rsi_{p}"), faults.series(&Rsi::new(p), candles));
    }
    for &p in &config.atr_periods {
        snapshot
            .atr
            .insert(format!("atr_{p}"), faults.series(&Atr::new(p), candles));
    }

    snapshot.macd = config
        .macd
        .iter()
        .map(|params| {
            let tag = params.tag();
            let result = params.indicator().compute(candles).map(|lines| MacdSeries {
                params: tag.clone(),
                macd_line: to_series(&lines.line),
                signal_line: to_series(&lines.signal),
                histogram: to_series(&lines.histogram),
            });
            faults.isolate(format!("macd_{tag}"), result, unavailable_macd(tag.clone(), n))
        })
        .collect();

    snapshot.bollinger = config
        .bollinger
        .iter()
        .map(|params| {
            let indicator = params.indicator();
            let tag = indicator.params();
            let result = indicator.compute(candles).map(|bands| BollingerSeries {
                params: tag.clone(),
                middle: to_series(&bands.middle),
                upper: to_series(&bands.upper),
                lower: to_series(&bands.lower),
            });
            faults.isolate(
                format!("bollinger_{tag}"),
                result,
                unavailable_bollinger(tag.clone(), n),
            )
        })
        .collect();

    let adx_period = config.adx_period;
    let adx = Adx::new(adx_period).compute(candles).map(|lines| AdxSeries {
        period: adx_period,
        adx: to_series(&lines.adx),
        plus_di: to_series(&lines.plus_di),
        minus_di: to_series(&lines.minus_di),
    });
    snapshot.adx = faults.isolate(
        format!("adx_{adx_period}"),
        adx,
        unavailable_adx(adx_period, n),
    );

    let stoch = &config.stochastic;
    let stochastic = Stochastic::new(stoch.k_period, stoch.d_period)
        .compute(candles)
        .map(|lines| StochasticSeries {
            k_period: stoch.k_period,
            d_period: stoch.d_period,
            k: to_series(&lines.k),
            d: to_series(&lines.d),
        });
    snapshot.stochastic = faults.isolate(
        "stochastic".to_string(),
        stochastic,
        unavailable_stochastic(config, n),
    );

    snapshot.obv = faults.series(&Obv::new(), candles);
    snapshot.vwap = faults.series(&Vwap::new(), candles);

    let ichimoku = config
        .ichimoku
        .indicator()
        .compute(candles)
        .map(|lines| IchimokuSeries {
            tenkan: to_series(&lines.tenkan),
            kijun: to_series(&lines.kijun),
            senkou_a: to_series(&lines.senkou_a),
            senkou_b: to_series(&lines.senkou_b),
            chikou: to_series(&lines.chikou),
        });
    snapshot.ichimoku = faults.isolate("ichimoku".to_string(), ichimoku, unavailable_ichimoku(n));

    let fib = &config.fibonacci;
    let fibonacci = Fibonacci::new(fib.period, fib.levels.clone())
        .compute(candles)
        .map(|grid| FibonacciSeries {
            period: fib.period,
            direction: grid.direction,
            high: to_scalar(grid.high),
            low: to_scalar(grid.low),
            levels: grid
                .levels
                .iter()
                .map(|l| FibonacciLevelSeries {
                    level: l.level,
                    uptrend: to_series(&l.uptrend),
                    downtrend: to_series(&l.downtrend),
                })
                .collect(),
        });
    snapshot.fibonacci = faults.isolate(
        "fibonacci".to_string(),
        fibonacci,
        unavailable_fibonacci(config, n),
    );

    let trend = TrendStatus::new(config.trend.fast, config.trend.slow)
        .compute(candles)
        .map(|status| TrendSeries {
            current: status.current,
            sma50_gt_sma200: status.fast_above_slow,
            details: status.details,
        });
    snapshot.trend = faults.isolate("trend".to_string(), trend, unavailable_trend(n));

    let vol_period = config.volatility_atr_period;
    let atr_percentage = faults.series(&VolatilityPct::new(vol_period), candles);
    snapshot.volatility = VolatilitySeries {
        period: vol_period,
        current_atr_percentage: last_value(&atr_percentage),
        atr_percentage,
    };

    snapshot.faults = faults.0;
    snapshot
}
