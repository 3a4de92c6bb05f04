//! Risk parameters, execution conventions and full simulation configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PriceField;
use crate::regime::RegimeConfig;

/// Invalid risk or execution parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("stop_loss_distance must be positive, got {0}")]
    InvalidStopLoss(f64),

    #[error("take_profit_distance must be positive, got {0}")]
    InvalidTakeProfit(f64),

    #[error("position size bounds invalid: min_size={min}, max_size={max}")]
    InvalidSizeBounds { min: f64, max: f64 },

    #[error("initial_balance must be positive, got {0}")]
    InvalidBalance(f64),

    #[error("risk_percent must be in (0, 100], got {0}")]
    InvalidRiskPercent(f64),

    #[error("contract_multiplier must be positive, got {0}")]
    InvalidMultiplier(f64),

    #[error("max_trades_per_day must be at least 1")]
    ZeroDailyLimit,
}

fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

/// Position sizing and bracket distances.
///
/// Distances are in price units (0.01 = 100 pips on a 4-digit FX quote).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParameters {
    pub stop_loss_distance: f64,
    pub take_profit_distance: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub initial_balance: f64,
    /// Percent of current equity risked per trade.
    pub risk_percent: f64,
    /// Currency per unit of price move per unit of size.
    pub contract_multiplier: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            stop_loss_distance: 0.01,
            take_profit_distance: 0.03,
            min_size: 0.5,
            max_size: 1.2,
            initial_balance: 10_000.0,
            risk_percent: 2.0,
            contract_multiplier: 10_000.0,
        }
    }
}

impl RiskParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !positive(self.stop_loss_distance) {
            return Err(ConfigError::InvalidStopLoss(self.stop_loss_distance));
        }
        if !positive(self.take_profit_distance) {
            return Err(ConfigError::InvalidTakeProfit(self.take_profit_distance));
        }
        let bounds_ok = positive(self.min_size)
            && self.max_size.is_finite()
            && self.min_size <= self.max_size;
        if !bounds_ok {
            return Err(ConfigError::InvalidSizeBounds {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if !positive(self.initial_balance) {
            return Err(ConfigError::InvalidBalance(self.initial_balance));
        }
        if !(self.risk_percent > 0.0 && self.risk_percent <= 100.0) {
            return Err(ConfigError::InvalidRiskPercent(self.risk_percent));
        }
        if !positive(self.contract_multiplier) {
            return Err(ConfigError::InvalidMultiplier(self.contract_multiplier));
        }
        Ok(())
    }

    /// `clip(equity * risk% / stop_distance, min_size, max_size)`.
    pub fn position_size(&self, equity: f64) -> f64 {
        let risk_amount = equity * self.risk_percent / 100.0;
        let raw = risk_amount / self.stop_loss_distance;
        if raw.is_nan() {
            return self.min_size;
        }
        raw.clamp(self.min_size, self.max_size)
    }
}

/// When an actionable signal is filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryTiming {
    /// Fill at the signal bar's price. Exits are checked from the next bar.
    #[default]
    SignalClose,
    /// Fill at the next bar's open. Exits are checked from the fill bar.
    NextBarOpen,
}

/// Which prices are compared against the stop and target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitTrigger {
    /// The bar's price only.
    #[default]
    Close,
    /// Adverse extreme for the stop, favourable extreme for the target.
    /// If both are touched in one bar the stop wins.
    Range,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub price_field: PriceField,
    pub entry_timing: EntryTiming,
    pub exit_trigger: ExitTrigger,
    pub max_trades_per_day: Option<u32>,
}

impl ExecutionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_trades_per_day == Some(0) {
            return Err(ConfigError::ZeroDailyLimit);
        }
        Ok(())
    }
}

/// Everything a simulation run needs besides data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub risk: RiskParameters,
    pub execution: ExecutionSettings,
    pub regime: RegimeConfig,
    /// Consecutive-close streak length that opens the pattern gate.
    pub pattern_threshold: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            risk: RiskParameters::default(),
            execution: ExecutionSettings::default(),
            regime: RegimeConfig::default(),
            pattern_threshold: 3,
        }
    }
}
