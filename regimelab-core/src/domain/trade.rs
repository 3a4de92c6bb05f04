//! Trade: a closed position with its exit details.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::position::{Position, PositionSide};

/// How a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitType {
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "TP")]
    TakeProfit,
    /// Forced close at the end of the bar sequence.
    #[serde(rename = "END")]
    End,
}

impl ExitType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitType::StopLoss => "SL",
            ExitType::TakeProfit => "TP",
            ExitType::End => "END",
        }
    }
}

impl std::fmt::Display for ExitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record appended to the trade log when a position closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_index: usize,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub side: PositionSide,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub confidence: f64,

    // ── Exit ──
    pub exit_index: usize,
    pub exit_price: f64,
    pub exit_type: ExitType,
    pub exit_time: NaiveDateTime,

    // ── Result ──
    pub pnl: f64,
    pub bars_open: usize,
    /// Calendar dates between entry and exit (overnight counts as 1).
    pub days_open: f64,
}

impl Trade {
    /// Close `position` at `exit_price` on bar `exit_index`.
    pub fn close(
        position: Position,
        exit_index: usize,
        exit_time: NaiveDateTime,
        exit_price: f64,
        exit_type: ExitType,
        contract_multiplier: f64,
    ) -> Self {
        let pnl = position.pnl_at(exit_price, contract_multiplier);
        let days_open = (exit_time.date() - position.entry_time.date()).num_days() as f64;
        Self {
            entry_index: position.entry_index,
            entry_price: position.entry_price,
            entry_time: position.entry_time,
            side: position.side,
            size: position.size,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
            confidence: position.confidence,
            exit_index,
            exit_price,
            exit_type,
            exit_time,
            pnl,
            bars_open: exit_index.saturating_sub(position.entry_index),
            days_open,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
