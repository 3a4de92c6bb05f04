//! Entry gates: pattern streaks, volume confirmation, and their combination
//! with the external signal.

pub mod pattern;
pub mod signal_gate;
pub mod volume;

use thiserror::Error;

pub use pattern::{PatternDetector, PatternState};
pub use signal_gate::{evaluate, GateSnapshot, GateStats, GateVerdict};
pub use volume::{VolumeGate, VolumeMode};

#[derive(Debug, Error, PartialEq)]
pub enum GateError {
    #[error("pattern threshold must be at least 1")]
    ZeroPatternThreshold,
}
