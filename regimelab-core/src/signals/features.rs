//! Fixed-shape per-bar feature vector handed to upstream signal sources.
//!
//! Every feature for bar `i` is computed from bars `0..=i` and the regime and
//! pattern states of bar `i`. Undefined values (not enough history, division
//! by zero) are reported as 0.

use serde::{Deserialize, Serialize};

use crate::domain::BarSeries;
use crate::gates::PatternState;
use crate::regime::RegimeState;

/// Lookback for momentum, range volatility and the volume ratio.
pub const FEATURE_LOOKBACK: usize = 5;

/// Number of features in `FeatureVector::to_array`.
pub const FEATURE_COUNT: usize = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub ha_open: f64,
    pub ha_high: f64,
    pub ha_low: f64,
    pub ha_close: f64,
    /// `|ha_close - ha_open|`.
    pub ha_body: f64,
    /// `ha_high - ha_low`.
    pub ha_range: f64,
    /// Fractional change of `ha_close` from the previous bar.
    pub ha_close_change: f64,
    /// `ha_close[i] - ha_close[i - 5]`.
    pub ha_momentum: f64,
    /// Sample std of `ha_range` over the last 5 bars.
    pub ha_volatility: f64,
    /// Regime density in percent.
    pub cluster_density: f64,
    pub consecutive_up: f64,
    pub consecutive_down: f64,
    pub volume: f64,
    /// Fractional change of volume from the previous bar.
    pub volume_change: f64,
    /// Volume over its 5-bar mean.
    pub volume_ratio: f64,
}

impl FeatureVector {
    /// Features in the order upstream models are trained on.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.ha_open,
            self.ha_high,
            self.ha_low,
            self.ha_close,
            self.ha_body,
            self.ha_range,
            self.ha_close_change,
            self.ha_momentum,
            self.ha_volatility,
            self.cluster_density,
            self.consecutive_up,
            self.consecutive_down,
            self.volume,
            self.volume_change,
            self.volume_ratio,
        ]
    }

    /// Features for bar `index`. Panics only if `index` is out of range.
    pub fn at(
        series: &BarSeries,
        index: usize,
        regime: &RegimeState,
        pattern: &PatternState,
    ) -> Self {
        let bars = series.bars();
        let bar = &bars[index];
        let prev = index.checked_sub(1).map(|p| &bars[p]);

        let ha_close_change = prev.map_or(0.0, |p| pct_change(p.ha_close, bar.ha_close));
        let ha_momentum = index
            .checked_sub(FEATURE_LOOKBACK)
            .map_or(0.0, |p| bar.ha_close - bars[p].ha_close);

        let (ha_volatility, volume_ratio) = if index + 1 >= FEATURE_LOOKBACK {
            let recent = &bars[index + 1 - FEATURE_LOOKBACK..=index];
            let ranges: Vec<f64> = recent.iter().map(|b| b.ha_range()).collect();
            let mean_volume =
                recent.iter().map(|b| b.volume).sum::<f64>() / FEATURE_LOOKBACK as f64;
            (sample_std(&ranges), finite_or_zero(bar.volume / mean_volume))
        } else {
            (0.0, 0.0)
        };

        Self {
            ha_open: bar.ha_open,
            ha_high: bar.ha_high,
            ha_low: bar.ha_low,
            ha_close: bar.ha_close,
            ha_body: bar.ha_body(),
            ha_range: bar.ha_range(),
            ha_close_change,
            ha_momentum,
            ha_volatility,
            cluster_density: regime.density.map_or(0.0, |d| d * 100.0),
            consecutive_up: pattern.consecutive_up as f64,
            consecutive_down: pattern.consecutive_down as f64,
            volume: bar.volume,
            volume_change: prev.map_or(0.0, |p| pct_change(p.volume, bar.volume)),
            volume_ratio,
        }
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

fn pct_change(prev: f64, current: f64) -> f64 {
    finite_or_zero((current - prev) / prev)
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}
