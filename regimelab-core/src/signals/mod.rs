//! Upstream signal boundary: per-bar feature vectors and signal sources.
//!
//! The engine normally consumes a precomputed `SignalSeries`. When a
//! `SignalSource` is supplied instead, features for each bar are built from
//! causal data only and the source is queried once per bar.

pub mod features;
pub mod source;

pub use features::{FeatureVector, FEATURE_COUNT, FEATURE_LOOKBACK};
pub use source::{ConstantSource, Ensemble, SignalSource};

use crate::domain::{BarSeries, SignalSeries};
use crate::gates::PatternState;
use crate::regime::RegimeState;

impl SignalSeries {
    /// Query `source` once per bar with that bar's causal feature vector.
    ///
    /// `regimes` and `patterns` must be aligned with `series`; bars beyond
    /// either slice get no signal.
    pub fn from_source(
        series: &BarSeries,
        regimes: &[RegimeState],
        patterns: &[PatternState],
        source: &dyn SignalSource,
    ) -> Self {
        let signals = (0..series.len())
            .map(|i| match (regimes.get(i), patterns.get(i)) {
                (Some(regime), Some(pattern)) => {
                    let features = FeatureVector::at(series, i, regime, pattern);
                    Some(source.predict(&features))
                }
                _ => None,
            })
            .collect();
        Self::new(signals)
    }
}
