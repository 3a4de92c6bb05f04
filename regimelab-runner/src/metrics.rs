//! Performance metrics: pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity curve and/or trade log in, scalar out.
//! Percent-valued metrics (win rate, drawdown, ROI) are reported in percent,
//! not fractions.

use serde::{Deserialize, Serialize};

use regimelab_core::domain::Trade;
use regimelab_core::engine::{RiskParameters, StreakTracker};

/// Aggregate performance report for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of trades with pnl > 0.
    pub win_rate: f64,
    /// Sum of winning pnl.
    pub total_profit: f64,
    /// Absolute sum of losing pnl.
    pub total_loss: f64,
    pub net_profit: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    /// Absolute mean of losing pnl.
    pub avg_loss: f64,
    /// Negative percent of the running peak, or 0.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub roi: f64,
    pub avg_bars_open: f64,
    pub avg_days_open: f64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    /// Compute the full report from a trade log and its equity curve.
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[f64],
        risk: &RiskParameters,
        annualization_factor: f64,
    ) -> Self {
        let initial_balance = risk.initial_balance;
        let final_balance = equity_curve.last().copied().unwrap_or(initial_balance);
        let total_profit = total_profit(trades);
        let total_loss = total_loss(trades);
        let streaks = StreakTracker::from_trades(trades);
        Self {
            total_trades: trades.len(),
            winning_trades: trades.iter().filter(|t| t.pnl > 0.0).count(),
            losing_trades: trades.iter().filter(|t| t.pnl < 0.0).count(),
            win_rate: win_rate(trades),
            total_profit,
            total_loss,
            net_profit: total_profit - total_loss,
            profit_factor: profit_factor(trades),
            avg_win: mean_f64(&pnls(trades, |p| p > 0.0)),
            avg_loss: mean_f64(&pnls(trades, |p| p < 0.0)).abs(),
            max_drawdown: max_drawdown(equity_curve),
            sharpe_ratio: sharpe_ratio(equity_curve, annualization_factor),
            roi: roi(initial_balance, final_balance),
            avg_bars_open: mean_f64(&trades.iter().map(|t| t.bars_open as f64).collect::<Vec<_>>()),
            avg_days_open: mean_f64(&trades.iter().map(|t| t.days_open).collect::<Vec<_>>()),
            initial_balance,
            final_balance,
            max_consecutive_wins: streaks.max_wins,
            max_consecutive_losses: streaks.max_losses,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Win rate in percent. 0 for an empty log.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

pub fn total_profit(trades: &[Trade]) -> f64 {
    pnls(trades, |p| p > 0.0).iter().sum()
}

pub fn total_loss(trades: &[Trade]) -> f64 {
    pnls(trades, |p| p < 0.0).iter().sum::<f64>().abs()
}

/// Gross profit / gross loss. 0 when there are no losses, so the value is
/// always finite.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let loss = total_loss(trades);
    if loss <= 0.0 {
        return 0.0;
    }
    total_profit(trades) / loss
}

/// Deepest decline from the running peak, as a negative percent.
///
/// Returns 0.0 if equity never dips below its peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak * 100.0);
        }
    }
    max_dd
}

/// Annualized Sharpe ratio of per-update equity returns.
///
/// Sharpe = mean(returns) / std(returns) * sqrt(factor), population std.
/// Returns 0.0 with fewer than 2 equity points or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64], annualization_factor: f64) -> f64 {
    let returns = step_returns(equity_curve);
    if returns.is_empty() {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * annualization_factor.sqrt()
}

/// Return on the initial balance, in percent.
pub fn roi(initial_balance: f64, final_balance: f64) -> f64 {
    if initial_balance <= 0.0 {
        return 0.0;
    }
    (final_balance - initial_balance) / initial_balance * 100.0
}

/// Fractional change between consecutive equity points.
pub fn step_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

fn pnls(trades: &[Trade], keep: impl Fn(f64) -> bool) -> Vec<f64> {
    trades.iter().map(|t| t.pnl).filter(|&p| keep(p)).collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
