//! Backtest runner: wires together data loading, the engine, and metrics.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads bars and signals from the configured CSVs, then runs. Used by the CLI.
//! - `run_backtest_from_data()`: takes pre-loaded data. No I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::domain::{JoinStats, Trade};
use regimelab_core::engine::{run_simulation, EngineError, RunResult};
use regimelab_core::gates::{GateStats, VolumeMode};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_data, LoadError, LoadOptions, LoadedData};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub gate_stats: GateStats,
    pub volume_mode: VolumeMode,
    pub join: JoinStats,
    pub start_time: String,
    pub end_time: String,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub warmup_bars: usize,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a single backtest from a BacktestConfig, reading its input files.
pub fn run_single_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    let (result, _) = run_with_diagnostics(config)?;
    Ok(result)
}

/// Like `run_single_backtest`, also returning the engine's per-bar output.
pub fn run_with_diagnostics(
    config: &BacktestConfig,
) -> Result<(BacktestResult, RunResult), RunError> {
    config.validate()?;
    let bars = config.data.bars.as_deref().ok_or(ConfigError::MissingBars)?;
    let opts = LoadOptions {
        start: config.data.start,
        end: config.data.end,
    };
    let data = load_data(bars, config.data.signals.as_deref(), &opts)?;
    run_backtest_from_data(config, &data)
}

/// Run a backtest on pre-loaded data without I/O.
pub fn run_backtest_from_data(
    config: &BacktestConfig,
    data: &LoadedData,
) -> Result<(BacktestResult, RunResult), RunError> {
    let run_id = config.run_id()?;
    let sim_config = config.to_simulation_config();
    let run = run_simulation(&data.series, &data.signals, &sim_config)?;

    let metrics = PerformanceMetrics::compute(
        &run.trades,
        &run.equity_curve,
        &config.risk,
        config.report.annualization_factor,
    );
    tracing::info!(
        run_id = %run_id.get(..12).unwrap_or(&run_id),
        trades = metrics.total_trades,
        net_profit = metrics.net_profit,
        roi = metrics.roi,
        "backtest complete"
    );

    let bars = data.series.bars();
    let start_time = bars.first().map(|b| b.timestamp.to_string()).unwrap_or_default();
    let end_time = bars.last().map(|b| b.timestamp.to_string()).unwrap_or_default();

    let result = BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        metrics,
        trades: run.trades.clone(),
        equity_curve: run.equity_curve.clone(),
        gate_stats: run.gate_stats,
        volume_mode: run.volume_mode,
        join: data.join,
        start_time,
        end_time,
        dataset_hash: data.dataset_hash.clone(),
        bar_count: run.bar_count,
        warmup_bars: run.warmup_bars,
    };
    Ok((result, run))
}
