//! PositionSimulator: FLAT/OPEN state machine with bracket exits.
//!
//! Per bar the simulator:
//! 1. fills a queued next-bar-open entry, if any
//! 2. checks the open position's stop and target
//! 3. considers a new entry, only when flat and nothing is queued
//!
//! Every closed trade appends one equity point and updates the win/loss
//! streaks. The simulator never fails once constructed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, ExitType, Position, PositionSide, Signal, Trade};

use super::config::{ConfigError, EntryTiming, ExecutionSettings, ExitTrigger, RiskParameters};

/// What happened to an actionable entry signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryDecision {
    Opened,
    /// Queued for the next bar's open.
    Queued,
    SkippedWhileOpen,
    SkippedDailyLimit,
}

/// Running and maximum consecutive win/loss counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakTracker {
    pub current_wins: usize,
    pub current_losses: usize,
    pub max_wins: usize,
    pub max_losses: usize,
}

impl StreakTracker {
    /// `pnl > 0` is a win; anything else is a loss.
    pub fn record(&mut self, pnl: f64) {
        if pnl > 0.0 {
            self.current_wins += 1;
            self.current_losses = 0;
            self.max_wins = self.max_wins.max(self.current_wins);
        } else {
            self.current_losses += 1;
            self.current_wins = 0;
            self.max_losses = self.max_losses.max(self.current_losses);
        }
    }

    /// Replay a closed-trade log.
    pub fn from_trades(trades: &[Trade]) -> Self {
        let mut streaks = Self::default();
        for t in trades {
            streaks.record(t.pnl);
        }
        streaks
    }
}

/// Entries per calendar day, reset when the fill bar's date changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTradeCounter {
    limit: u32,
    day: Option<NaiveDate>,
    count: u32,
}

impl DailyTradeCounter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            day: None,
            count: 0,
        }
    }

    /// Whether another entry is allowed on `day`.
    pub fn allows(&mut self, day: NaiveDate) -> bool {
        if self.day != Some(day) {
            self.day = Some(day);
            self.count = 0;
        }
        self.count < self.limit
    }

    pub fn record(&mut self, day: NaiveDate) {
        if self.day != Some(day) {
            self.day = Some(day);
            self.count = 0;
        }
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    side: PositionSide,
    confidence: f64,
}

/// Everything the simulator produced over a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub trades: Vec<Trade>,
    /// Initial balance, then one point per closed trade.
    pub equity_curve: Vec<f64>,
    pub streaks: StreakTracker,
    /// Entries refused by the daily trade limit, at signal or at fill time.
    pub skipped_daily_limit: usize,
}

/// At most one open position; owns the trade log and equity curve.
#[derive(Debug, Clone)]
pub struct PositionSimulator {
    risk: RiskParameters,
    execution: ExecutionSettings,
    position: Option<Position>,
    pending: Option<PendingEntry>,
    balance: f64,
    trades: Vec<Trade>,
    equity_curve: Vec<f64>,
    streaks: StreakTracker,
    daily: Option<DailyTradeCounter>,
    skipped_daily_limit: usize,
}

impl PositionSimulator {
    pub fn new(risk: RiskParameters, execution: ExecutionSettings) -> Result<Self, ConfigError> {
        risk.validate()?;
        execution.validate()?;
        let balance = risk.initial_balance;
        Ok(Self {
            daily: execution.max_trades_per_day.map(DailyTradeCounter::new),
            risk,
            execution,
            position: None,
            pending: None,
            balance,
            trades: Vec::new(),
            equity_curve: vec![balance],
            streaks: StreakTracker::default(),
            skipped_daily_limit: 0,
        })
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none() && self.pending.is_none()
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[f64] {
        &self.equity_curve
    }

    /// Fill a queued entry and check exits for bar `index`.
    ///
    /// Returns the trade closed on this bar, if any.
    pub fn process_exits(&mut self, index: usize, bar: &Bar) -> Option<Trade> {
        if let Some(pending) = self.pending.take() {
            if self.charge_daily(index, bar) {
                let price = bar.open_of(self.execution.price_field);
                self.open(index, bar, price, pending.side, pending.confidence);
            }
        }

        let position = self.position.as_ref()?;
        let (exit_price, exit_type) = self.exit_for(position, bar)?;
        let position = self.position.take()?;
        Some(self.close(position, index, bar, exit_price, exit_type))
    }

    /// Consider an actionable entry on bar `index`. Call after `process_exits`.
    pub fn process_entry(
        &mut self,
        index: usize,
        bar: &Bar,
        signal: Signal,
    ) -> Option<EntryDecision> {
        let side = signal.direction.side()?;
        if !self.is_flat() {
            return Some(EntryDecision::SkippedWhileOpen);
        }

        match self.execution.entry_timing {
            EntryTiming::SignalClose => {
                if !self.charge_daily(index, bar) {
                    return Some(EntryDecision::SkippedDailyLimit);
                }
                let price = bar.close_of(self.execution.price_field);
                self.open(index, bar, price, side, signal.confidence);
                Some(EntryDecision::Opened)
            }
            // The daily limit is charged on the fill bar.
            EntryTiming::NextBarOpen => {
                self.pending = Some(PendingEntry {
                    side,
                    confidence: signal.confidence,
                });
                Some(EntryDecision::Queued)
            }
        }
    }

    /// Force-close any open position at the last bar's price and return the run's output.
    ///
    /// A queued entry that never reached a fill bar is dropped.
    pub fn finish(mut self, last_index: usize, last_bar: &Bar) -> SimulationOutcome {
        if self.pending.take().is_some() {
            tracing::debug!(bar = last_index, "dropping entry queued on final bar");
        }
        if let Some(position) = self.position.take() {
            let price = last_bar.close_of(self.execution.price_field);
            self.close(position, last_index, last_bar, price, ExitType::End);
        }
        SimulationOutcome {
            trades: self.trades,
            equity_curve: self.equity_curve,
            streaks: self.streaks,
            skipped_daily_limit: self.skipped_daily_limit,
        }
    }

    // ── Internals ──

    /// Count an entry filling on `bar` against the daily limit. False when refused.
    fn charge_daily(&mut self, index: usize, bar: &Bar) -> bool {
        let Some(daily) = self.daily.as_mut() else {
            return true;
        };
        let day = bar.timestamp.date();
        if !daily.allows(day) {
            tracing::debug!(bar = index, %day, "daily trade limit reached");
            self.skipped_daily_limit += 1;
            return false;
        }
        daily.record(day);
        true
    }

    fn open(&mut self, index: usize, bar: &Bar, price: f64, side: PositionSide, confidence: f64) {
        let size = self.risk.position_size(self.balance);
        let (stop_loss, take_profit) = Position::bracket(
            side,
            price,
            self.risk.stop_loss_distance,
            self.risk.take_profit_distance,
        );
        tracing::debug!(bar = index, ?side, price, size, "entry");
        self.position = Some(Position {
            entry_index: index,
            entry_price: price,
            entry_time: bar.timestamp,
            side,
            size,
            stop_loss,
            take_profit,
            confidence,
        });
    }

    fn close(
        &mut self,
        position: Position,
        index: usize,
        bar: &Bar,
        price: f64,
        exit_type: ExitType,
    ) -> Trade {
        let trade = Trade::close(
            position,
            index,
            bar.timestamp,
            price,
            exit_type,
            self.risk.contract_multiplier,
        );
        tracing::debug!(bar = index, %exit_type, price, pnl = trade.pnl, "exit");
        self.balance += trade.pnl;
        self.equity_curve.push(self.balance);
        self.streaks.record(trade.pnl);
        self.trades.push(trade.clone());
        trade
    }

    /// Stop or target hit on this bar. The stop is checked first.
    fn exit_for(&self, position: &Position, bar: &Bar) -> Option<(f64, ExitType)> {
        let field = self.execution.price_field;
        let (adverse, favourable) = match self.execution.exit_trigger {
            ExitTrigger::Close => (bar.close_of(field), bar.close_of(field)),
            ExitTrigger::Range => match position.side {
                PositionSide::Long => (bar.low_of(field), bar.high_of(field)),
                PositionSide::Short => (bar.high_of(field), bar.low_of(field)),
            },
        };

        let (stop_hit, target_hit) = match position.side {
            PositionSide::Long => (
                adverse <= position.stop_loss,
                favourable >= position.take_profit,
            ),
            PositionSide::Short => (
                adverse >= position.stop_loss,
                favourable <= position.take_profit,
            ),
        };

        if stop_hit {
            Some((position.stop_loss, ExitType::StopLoss))
        } else if target_hit {
            Some((position.take_profit, ExitType::TakeProfit))
        } else {
            None
        }
    }
}
