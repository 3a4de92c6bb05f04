//! RegimeLab Runner: backtest orchestration, metrics, and artifacts.
//!
//! This crate builds on `regimelab-core` to provide:
//! - TOML backtest configuration with run fingerprinting
//! - CSV bar and signal loading with a timestamp left-join
//! - Single-backtest runner
//! - Performance metrics
//! - JSON/CSV/text artifact export and the gate condition report

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;

pub use config::{BacktestConfig, ConfigError, DataConfig, PatternConfig, ReportConfig, RunId};
pub use data_loader::{load_bars, load_data, load_signals, LoadError, LoadOptions, LoadedData};
pub use export::{
    export_heiken_ashi_csv, generate_conditions_report, generate_summary, load_artifacts,
    save_artifacts,
};
pub use metrics::PerformanceMetrics;
pub use runner::{
    run_backtest_from_data, run_single_backtest, run_with_diagnostics, BacktestResult, RunError,
    SCHEMA_VERSION,
};
