//! Ichimoku Kinko Hyo.
//!
//! - tenkan = midpoint of the rolling high/low over `tenkan` candles
//! - kijun = midpoint over `kijun` candles
//! - senkou A = (tenkan + kijun) / 2, displaced forward by `displacement`
//! - senkou B = midpoint over `senkou_b` candles, displaced forward
//! - chikou = close shifted backward by `chikou`
//!
//! Forward displacement drops values that would land past the window end,
//! so every series stays aligned 1:1 with the candles. Chikou reads later
//! closes by definition; the last `chikou` positions are unavailable.

use super::{closes, highs, lows, rolling_midpoint, shift_backward, shift_forward};
use crate::components::indicator::{check_period, IndicatorError};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Ichimoku {
    pub tenkan: usize,
    pub kijun: usize,
    pub senkou_b: usize,
    pub chikou: usize,
    pub displacement: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IchimokuLines {
    pub tenkan: Vec<f64>,
    pub kijun: Vec<f64>,
    pub senkou_a: Vec<f64>,
    pub senkou_b: Vec<f64>,
    pub chikou: Vec<f64>,
}

impl Ichimoku {
    pub fn new(
        tenkan: usize,
        kijun: usize,
        senkou_b: usize,
        chikou: usize,
        displacement: usize,
    ) -> Self {
        Self {
            tenkan,
            kijun,
            senkou_b,
            chikou,
            displacement,
        }
    }

    /// Warm-up of the slowest span (senkou B incl. displacement).
    pub fn lookback(&self) -> usize {
        let base = self.tenkan.max(self.kijun).max(self.senkou_b);
        base.saturating_sub(1) + self.displacement
    }

    pub fn compute(&self, candles: &[Candle]) -> Result<IchimokuLines, IndicatorError> {
        check_period("ichimoku", "tenkan", self.tenkan)?;
        check_period("ichimoku", "kijun", self.kijun)?;
        check_period("ichimoku", "senkou_b", self.senkou_b)?;

        let high = highs(candles);
        let low = lows(candles);

        let tenkan = rolling_midpoint(&high, &low, self.tenkan);
        let kijun = rolling_midpoint(&high, &low, self.kijun);
        let base_a: Vec<f64> = tenkan
            .iter()
            .zip(&kijun)
            .map(|(t, k)| (t + k) / 2.0)
            .collect();
        let base_b = rolling_midpoint(&high, &low, self.senkou_b);

        Ok(IchimokuLines {
            senkou_a: shift_forward(&base_a, self.displacement),
            senkou_b: shift_forward(&base_b, self.displacement),
            chikou: shift_backward(&closes(candles), self.chikou),
            tenkan,
            kijun,
        })
    }
}

impl Default for Ichimoku {
    fn default() -> Self {
        Self::new(9, 26, 52, 26, 26)
    }
}
