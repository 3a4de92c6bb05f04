//! TOML backtest configuration.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! [data]
//! bars = "data/eurusd_m15.csv"
//! signals = "data/ensemble_signals.csv"
//! start = "2024-01-01"
//! end = "2024-12-31"
//!
//! [risk]
//! stop_loss_distance = 0.01
//! take_profit_distance = 0.03
//!
//! [regime]
//! window = 252
//! min_density = 0.2
//!
//! [pattern]
//! threshold = 3
//!
//! [execution]
//! entry_timing = "next_bar_open"
//!
//! [report]
//! output_dir = "results"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::engine::{self, ExecutionSettings, RiskParameters, SimulationConfig};
use regimelab_core::gates::{GateError, PatternDetector};
use regimelab_core::regime::{RegimeConfig, RegimeError};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors loading or validating a backtest configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to fingerprint config: {0}")]
    Fingerprint(#[from] serde_json::Error),

    #[error("start date {start} is after end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },

    #[error("annualization_factor must be positive, got {0}")]
    InvalidAnnualization(f64),

    #[error("no bars file given (set [data].bars or pass --bars)")]
    MissingBars,

    #[error(transparent)]
    Risk(#[from] engine::ConfigError),

    #[error(transparent)]
    Regime(#[from] RegimeError),

    #[error(transparent)]
    Pattern(#[from] GateError),
}

/// Input files and the date range to backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// OHLCV bars CSV.
    pub bars: Option<PathBuf>,
    /// Per-bar ensemble signals CSV. Without one, no bar is actionable.
    pub signals: Option<PathBuf>,
    /// Inclusive first date.
    pub start: Option<NaiveDate>,
    /// Inclusive last date.
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub threshold: u32,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            threshold: PatternDetector::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// Periods per year used to annualize the Sharpe ratio.
    pub annualization_factor: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            annualization_factor: 252.0,
        }
    }
}

/// Full configuration of one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub risk: RiskParameters,
    pub regime: RegimeConfig,
    pub pattern: PatternConfig,
    pub execution: ExecutionSettings,
    pub report: ReportConfig,
}

impl BacktestConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section. Input file presence is checked by the runner.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.data.start, self.data.end) {
            if start > end {
                return Err(ConfigError::InvertedDateRange { start, end });
            }
        }
        self.risk.validate()?;
        self.execution.validate()?;
        self.regime.validate()?;
        PatternDetector::new(self.pattern.threshold)?;
        let factor = self.report.annualization_factor;
        if !(factor.is_finite() && factor > 0.0) {
            return Err(ConfigError::InvalidAnnualization(factor));
        }
        Ok(())
    }

    /// Engine view of this configuration.
    pub fn to_simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            risk: self.risk.clone(),
            execution: self.execution,
            regime: self.regime.clone(),
            pattern_threshold: self.pattern.threshold,
        }
    }

    /// Deterministic BLAKE3 fingerprint of the canonical JSON form.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
