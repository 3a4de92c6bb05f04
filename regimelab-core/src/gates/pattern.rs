//! Consecutive directional-close streaks.

use serde::{Deserialize, Serialize};

use super::GateError;

/// Streak counters for one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternState {
    pub consecutive_up: u32,
    pub consecutive_down: u32,
    pub valid: bool,
}

/// Tracks up/down close streaks in O(1) state per bar.
///
/// A higher close extends the up streak and zeroes the down streak, a lower
/// close does the reverse, and an unchanged close zeroes both. Bar 0 has no
/// predecessor and starts both streaks at zero.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    threshold: u32,
    prev_close: Option<f64>,
    up: u32,
    down: u32,
}

impl PatternDetector {
    pub const DEFAULT_THRESHOLD: u32 = 3;

    pub fn new(threshold: u32) -> Result<Self, GateError> {
        if threshold == 0 {
            return Err(GateError::ZeroPatternThreshold);
        }
        Ok(Self {
            threshold,
            prev_close: None,
            up: 0,
            down: 0,
        })
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Feed the next close and return the state for that bar.
    pub fn update(&mut self, close: f64) -> PatternState {
        if let Some(prev) = self.prev_close {
            if close > prev {
                self.up += 1;
                self.down = 0;
            } else if close < prev {
                self.down += 1;
                self.up = 0;
            } else {
                self.up = 0;
                self.down = 0;
            }
        }
        self.prev_close = Some(close);

        PatternState {
            consecutive_up: self.up,
            consecutive_down: self.down,
            valid: self.up >= self.threshold || self.down >= self.threshold,
        }
    }

    /// Run a fresh detector over a whole close series.
    pub fn detect(threshold: u32, closes: &[f64]) -> Result<Vec<PatternState>, GateError> {
        let mut detector = Self::new(threshold)?;
        Ok(closes.iter().map(|&c| detector.update(c)).collect())
    }
}
