//! Rolling regime classification.
//!
//! For bar `i >= window`, the `window` bars `[i - window, i)` are standardized
//! (scaler fit on that window only), clustered with seeded k-means, and bar `i`
//! is assigned to the nearest centroid. Its regime density is the share of
//! window bars in that cluster. Bars before the window is full are invalid.
//!
//! Each bar's classification reads only its own trailing slice and draws its
//! randomness from a hash-derived seed for `(seed, bar_index, restart)`, so
//! bars can be classified in any order, or in parallel, with identical results.

pub mod kmeans;
pub mod scaler;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::BarSeries;
use crate::rng::RngHierarchy;

pub use kmeans::KMeansFit;
pub use scaler::StandardScaler;

/// Number of features per bar: HA open, high, low, close.
pub const REGIME_FEATURES: usize = 4;

const RNG_STREAM: &str = "regime";

/// Invalid classifier configuration. Reported before any bar is processed.
#[derive(Debug, Error, PartialEq)]
pub enum RegimeError {
    #[error("regime window must be at least 1")]
    ZeroWindow,

    #[error("cluster count must be at least 1")]
    ZeroClusters,

    #[error("regime window ({window}) is smaller than the cluster count ({clusters})")]
    WindowBelowClusters { window: usize, clusters: usize },

    #[error("k-means restarts and iterations must be at least 1")]
    ZeroIterations,

    #[error("min_density must be within [0, 1], got {0}")]
    InvalidMinDensity(f64),

    #[error("regime window ({window}) must be shorter than the series ({len} bars)")]
    WindowExceedsSeries { window: usize, len: usize },
}

/// Classifier parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Trailing window length W.
    pub window: usize,
    /// Number of k-means clusters.
    pub clusters: usize,
    /// Seeded k-means++ restarts per window; the lowest inertia wins.
    pub n_init: usize,
    pub max_iterations: usize,
    /// Density threshold for `valid`. 0.0 makes every post-warmup bar valid.
    pub min_density: f64,
    pub seed: u64,
    /// Classify bars on the rayon pool.
    pub parallel: bool,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            window: 252,
            clusters: 3,
            n_init: 3,
            max_iterations: 300,
            min_density: 0.0,
            seed: 42,
            parallel: true,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<(), RegimeError> {
        if self.window == 0 {
            return Err(RegimeError::ZeroWindow);
        }
        if self.clusters == 0 {
            return Err(RegimeError::ZeroClusters);
        }
        if self.window < self.clusters {
            return Err(RegimeError::WindowBelowClusters {
                window: self.window,
                clusters: self.clusters,
            });
        }
        if self.n_init == 0 || self.max_iterations == 0 {
            return Err(RegimeError::ZeroIterations);
        }
        if !(0.0..=1.0).contains(&self.min_density) {
            return Err(RegimeError::InvalidMinDensity(self.min_density));
        }
        Ok(())
    }
}

/// Regime classification of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    /// `None` during warmup.
    pub cluster_id: Option<usize>,
    /// Share of window bars in the current bar's cluster; `None` during warmup.
    pub density: Option<f64>,
    pub valid: bool,
}

impl RegimeState {
    /// State for a bar whose trailing window is not yet full.
    pub fn warmup() -> Self {
        Self {
            cluster_id: None,
            density: None,
            valid: false,
        }
    }
}

/// Causal rolling-window regime classifier.
#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    config: RegimeConfig,
    rng: RngHierarchy,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Result<Self, RegimeError> {
        config.validate()?;
        let rng = RngHierarchy::new(config.seed);
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Bars needed before the first valid classification.
    pub fn warmup(&self) -> usize {
        self.config.window
    }

    /// Reject series too short for any post-warmup bar.
    pub fn check_series(&self, len: usize) -> Result<(), RegimeError> {
        if self.config.window >= len {
            return Err(RegimeError::WindowExceedsSeries {
                window: self.config.window,
                len,
            });
        }
        Ok(())
    }

    /// Classify bar `index` from the trailing window `[index - W, index)`.
    ///
    /// Out-of-range and warmup indices return `RegimeState::warmup()`.
    pub fn classify_at(&self, series: &BarSeries, index: usize) -> RegimeState {
        let w = self.config.window;
        if index < w || index >= series.len() {
            return RegimeState::warmup();
        }

        let bars = &series.bars()[index - w..index];
        let window: Vec<[f64; REGIME_FEATURES]> = bars.iter().map(|b| b.ha_features()).collect();
        let scaler = StandardScaler::fit(&window);
        let scaled = scaler.transform_all(&window);

        let fit = kmeans::fit_best(
            &scaled,
            self.config.clusters,
            self.config.n_init,
            self.config.max_iterations,
            |restart| self.rng.rng_for(RNG_STREAM, index as u64, restart),
        );

        let current = scaler.transform(&series.bars()[index].ha_features());
        let cluster = fit.predict(&current);
        let density = fit.cluster_size(cluster) as f64 / w as f64;

        RegimeState {
            cluster_id: Some(cluster),
            density: Some(density),
            valid: density >= self.config.min_density,
        }
    }

    /// Classify every bar sequentially.
    pub fn classify_all(&self, series: &BarSeries) -> Vec<RegimeState> {
        (0..series.len()).map(|i| self.classify_at(series, i)).collect()
    }

    /// Classify every bar on the rayon pool. Output is identical to `classify_all`.
    pub fn classify_all_parallel(&self, series: &BarSeries) -> Vec<RegimeState> {
        (0..series.len())
            .into_par_iter()
            .map(|i| self.classify_at(series, i))
            .collect()
    }

    /// Dispatch on `config.parallel`.
    pub fn classify(&self, series: &BarSeries) -> Vec<RegimeState> {
        let states = if self.config.parallel {
            self.classify_all_parallel(series)
        } else {
            self.classify_all(series)
        };
        tracing::debug!(
            bars = series.len(),
            window = self.config.window,
            valid = states.iter().filter(|s| s.valid).count(),
            "regime classification complete"
        );
        states
    }
}
