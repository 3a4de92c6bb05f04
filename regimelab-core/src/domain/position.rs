//! Position: the single live trade owned by the simulator.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

/// Open position.
///
/// Created on entry, consumed into a `Trade` on exit. Never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_index: usize,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub side: PositionSide,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub confidence: f64,
}

impl Position {
    /// Absolute stop-loss and take-profit prices for an entry.
    ///
    /// Long: stop below, target above. Short: inverted.
    pub fn bracket(
        side: PositionSide,
        entry_price: f64,
        stop_distance: f64,
        target_distance: f64,
    ) -> (f64, f64) {
        match side {
            PositionSide::Long => (entry_price - stop_distance, entry_price + target_distance),
            PositionSide::Short => (entry_price + stop_distance, entry_price - target_distance),
        }
    }

    /// `(exit - entry) * sign * size * multiplier`.
    pub fn pnl_at(&self, exit_price: f64, contract_multiplier: f64) -> f64 {
        (exit_price - self.entry_price) * self.side.sign() * self.size * contract_multiplier
    }

    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }
}
