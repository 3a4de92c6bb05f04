//! Externally supplied directional signals and their per-bar alignment.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::position::PositionSide;
use super::series::BarSeries;

/// Signal direction: -1, 0 or +1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Short,
    #[default]
    Flat,
    Long,
}

impl Direction {
    /// Map any number to its sign. NaN and zero map to `Flat`.
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            Direction::Long
        } else if value < 0.0 {
            Direction::Short
        } else {
            Direction::Flat
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Short => -1,
            Direction::Flat => 0,
            Direction::Long => 1,
        }
    }

    /// Position side this direction would open, if any.
    pub fn side(self) -> Option<PositionSide> {
        match self {
            Direction::Long => Some(PositionSide::Long),
            Direction::Short => Some(PositionSide::Short),
            Direction::Flat => None,
        }
    }

    pub fn is_flat(self) -> bool {
        self == Direction::Flat
    }
}

/// Per-bar directional signal with confidence in `[0, 1]`.
///
/// Produced upstream at or before the bar's close; the engine never re-derives it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub confidence: f64,
}

impl Signal {
    /// Build a signal, clamping confidence into `[0, 1]` (NaN becomes 0).
    pub fn new(direction: Direction, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            direction,
            confidence,
        }
    }

    pub fn flat() -> Self {
        Self::new(Direction::Flat, 0.0)
    }
}

/// Outcome counters from joining timestamped signals onto a bar series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    /// Bars that received a signal.
    pub matched: usize,
    /// Signals whose timestamp matches no bar.
    pub unmatched: usize,
    /// Signal rows dropped because a later row had the same timestamp.
    pub duplicates: usize,
}

/// Signals aligned one-to-one with a bar series. `None` means no signal for that bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSeries {
    signals: Vec<Option<Signal>>,
}

impl SignalSeries {
    pub fn new(signals: Vec<Option<Signal>>) -> Self {
        Self { signals }
    }

    /// A series with no signal on any of `len` bars.
    pub fn empty(len: usize) -> Self {
        Self {
            signals: vec![None; len],
        }
    }

    /// Left-join timestamped signals onto `bars` by exact timestamp.
    ///
    /// Bars without a matching signal get `None`. When several signals share
    /// a timestamp the last one wins.
    pub fn left_join(bars: &BarSeries, signals: &[(NaiveDateTime, Signal)]) -> (Self, JoinStats) {
        let mut by_time: BTreeMap<NaiveDateTime, Signal> = BTreeMap::new();
        let mut stats = JoinStats::default();
        for &(ts, signal) in signals {
            if by_time.insert(ts, signal).is_some() {
                stats.duplicates += 1;
            }
        }

        let mut aligned = Vec::with_capacity(bars.len());
        for bar in bars.iter() {
            match by_time.remove(&bar.timestamp) {
                Some(signal) => {
                    stats.matched += 1;
                    aligned.push(Some(signal));
                }
                None => aligned.push(None),
            }
        }
        stats.unmatched = by_time.len();

        (Self { signals: aligned }, stats)
    }

    pub fn get(&self, index: usize) -> Option<Signal> {
        self.signals.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Number of bars carrying a non-flat signal.
    pub fn directional_count(&self) -> usize {
        self.signals
            .iter()
            .flatten()
            .filter(|s| !s.direction.is_flat())
            .count()
    }
}
