//! Signal gate: external direction AND regime AND pattern AND volume.

use serde::{Deserialize, Serialize};

use crate::domain::Signal;

/// Outcome of gating one bar's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateVerdict {
    /// All gates open and a non-flat direction: actionable entry.
    Passed,
    /// No signal, or a flat one.
    NoSignal,
    FilteredByRegime,
    FilteredByPattern,
    FilteredByVolume,
}

impl GateVerdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Gate states and verdict for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub regime: bool,
    pub pattern: bool,
    pub volume: bool,
    pub verdict: GateVerdict,
}

impl GateSnapshot {
    /// All three gates open, regardless of signal.
    pub fn all_open(&self) -> bool {
        self.regime && self.pattern && self.volume
    }
}

/// Combine the three gates with the bar's signal. Pure and stateless.
///
/// When several gates are closed the verdict names the first in
/// regime, pattern, volume order.
pub fn evaluate(
    signal: Option<Signal>,
    regime: bool,
    pattern: bool,
    volume: bool,
) -> GateSnapshot {
    let verdict = match signal {
        None => GateVerdict::NoSignal,
        Some(s) if s.direction.is_flat() => GateVerdict::NoSignal,
        Some(_) if !regime => GateVerdict::FilteredByRegime,
        Some(_) if !pattern => GateVerdict::FilteredByPattern,
        Some(_) if !volume => GateVerdict::FilteredByVolume,
        Some(_) => GateVerdict::Passed,
    };
    GateSnapshot {
        regime,
        pattern,
        volume,
        verdict,
    }
}

/// Per-run gate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub bars: usize,
    pub regime_valid: usize,
    pub pattern_valid: usize,
    pub volume_valid: usize,
    pub all_valid: usize,
    pub signals: usize,
    pub actionable: usize,
    pub filtered_by_regime: usize,
    pub filtered_by_pattern: usize,
    pub filtered_by_volume: usize,
    /// Actionable bars ignored because a position was already open.
    pub skipped_while_open: usize,
    /// Entries refused by the daily trade limit. Next-bar entries are refused on their fill bar.
    pub skipped_daily_limit: usize,
}

impl GateStats {
    pub fn record(&mut self, snapshot: &GateSnapshot) {
        self.bars += 1;
        self.regime_valid += snapshot.regime as usize;
        self.pattern_valid += snapshot.pattern as usize;
        self.volume_valid += snapshot.volume as usize;
        self.all_valid += snapshot.all_open() as usize;
        match snapshot.verdict {
            GateVerdict::NoSignal => {}
            GateVerdict::Passed => {
                self.signals += 1;
                self.actionable += 1;
            }
            GateVerdict::FilteredByRegime => {
                self.signals += 1;
                self.filtered_by_regime += 1;
            }
            GateVerdict::FilteredByPattern => {
                self.signals += 1;
                self.filtered_by_pattern += 1;
            }
            GateVerdict::FilteredByVolume => {
                self.signals += 1;
                self.filtered_by_volume += 1;
            }
        }
    }

    /// Percentage of bars where `count` held. 0 for an empty run.
    pub fn pct(&self, count: usize) -> f64 {
        if self.bars == 0 {
            0.0
        } else {
            count as f64 / self.bars as f64 * 100.0
        }
    }
}
