//! Upstream signal sources and majority-vote ensembles.

use crate::domain::{Direction, Signal};

use super::features::FeatureVector;

/// Synchronous request/response boundary to an upstream model.
///
/// # Architecture invariant
/// A source sees only the bar's feature vector. It has no access to the
/// bar series, the simulator or any later bar.
pub trait SignalSource: Send + Sync {
    /// Human-readable name (e.g., "random_forest", "ensemble").
    fn name(&self) -> &str;

    fn predict(&self, features: &FeatureVector) -> Signal;
}

/// Source that always returns the same signal.
#[derive(Debug, Clone, Copy)]
pub struct ConstantSource {
    pub signal: Signal,
}

impl SignalSource for ConstantSource {
    fn name(&self) -> &str {
        "constant"
    }

    fn predict(&self, _features: &FeatureVector) -> Signal {
        self.signal
    }
}

/// Majority vote over member sources.
///
/// Members answering Flat abstain. Among the remaining votes, Long wins when it
/// holds at least half, otherwise Short wins; confidence is the winning share.
/// With no votes the result is Flat with confidence 0.
pub struct Ensemble {
    members: Vec<Box<dyn SignalSource>>,
}

impl Ensemble {
    pub fn new(members: Vec<Box<dyn SignalSource>>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Combine already collected directions.
    pub fn vote(directions: &[Direction]) -> Signal {
        let bullish = directions.iter().filter(|&&d| d == Direction::Long).count();
        let bearish = directions.iter().filter(|&&d| d == Direction::Short).count();
        let votes = bullish + bearish;
        if votes == 0 {
            return Signal::flat();
        }

        let votes = votes as f64;
        if bullish as f64 >= votes / 2.0 {
            Signal::new(Direction::Long, bullish as f64 / votes)
        } else {
            Signal::new(Direction::Short, bearish as f64 / votes)
        }
    }
}

impl SignalSource for Ensemble {
    fn name(&self) -> &str {
        "ensemble"
    }

    fn predict(&self, features: &FeatureVector) -> Signal {
        let directions: Vec<Direction> = self
            .members
            .iter()
            .map(|m| m.predict(features).direction)
            .collect();
        Self::vote(&directions)
    }
}
