//! Integration tests for the runner: CSV files on disk through to artifacts.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regimelab_core::domain::ExitType;
use regimelab_core::engine::EngineError;
use regimelab_core::regime::RegimeError;
use regimelab_runner::config::BacktestConfig;
use regimelab_runner::export::{load_artifacts, save_artifacts};
use regimelab_runner::runner::{run_single_backtest, run_with_diagnostics, RunError};
use regimelab_runner::SCHEMA_VERSION;
use tempfile::TempDir;

const BARS: usize = 60;

fn bar_time(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(i as i64)
}

/// Hourly uptrend with rising volume, spanning 2025-06-02 to 2025-06-04.
fn write_bars(dir: &Path) -> PathBuf {
    let mut csv = String::from("Time,Open,High,Low,Close,Volume\n");
    for i in 0..BARS {
        let close = 1.0 + 0.002 * i as f64;
        let open = close - 0.001;
        let _ = writeln!(
            csv,
            "{},{:.6},{:.6},{:.6},{:.6},{}",
            bar_time(i).format("%Y-%m-%d %H:%M:%S"),
            open,
            close + 0.001,
            open - 0.001,
            close,
            100 + i
        );
    }
    let path = dir.join("bars.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

/// Long on every bar, plus one duplicate row and one row matching no bar.
fn write_signals(dir: &Path) -> PathBuf {
    let mut csv = String::from("time,ensemble,confidence\n");
    for i in 0..BARS {
        let _ = writeln!(csv, "{},1,0.8", bar_time(i).format("%Y-%m-%d %H:%M:%S"));
    }
    let _ = writeln!(csv, "{},-1,0.4", bar_time(0).format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(csv, "2030-01-01 00:00:00,1,0.9");
    let path = dir.join("signals.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn write_config(dir: &Path, extra: &str) -> BacktestConfig {
    let toml = format!(
        "[data]\nbars = \"{}\"\nsignals = \"{}\"\n{extra}\n\n[regime]\nwindow = 20\n\n[report]\noutput_dir = \"{}\"\n",
        write_bars(dir).display(),
        write_signals(dir).display(),
        dir.join("results").display(),
    );
    let path = dir.join("config.toml");
    std::fs::write(&path, toml).unwrap();
    BacktestConfig::from_file(&path).unwrap()
}

#[test]
fn end_to_end_uptrend() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let result = run_single_backtest(&config).unwrap();

    assert_eq!(result.schema_version, SCHEMA_VERSION);
    assert_eq!(result.bar_count, BARS);
    assert_eq!(result.warmup_bars, 20);
    assert_eq!(result.join.matched, BARS);
    assert_eq!(result.join.duplicates, 1);
    assert_eq!(result.join.unmatched, 1);

    assert!(!result.trades.is_empty());
    assert_eq!(result.trades[0].entry_index, 20);
    assert_eq!(result.trades[0].exit_type, ExitType::TakeProfit);
    assert_eq!(result.equity_curve.len(), result.trades.len() + 1);
    assert_eq!(result.metrics.total_trades, result.trades.len());
    assert!(result.metrics.net_profit > 0.0);
    assert_eq!(result.metrics.profit_factor, 0.0, "no losers, so 0 by convention");
    assert!((result.metrics.final_balance - *result.equity_curve.last().unwrap()).abs() < 1e-9);
}

#[test]
fn date_range_limits_bars() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "start = \"2025-06-03\"\nend = \"2025-06-04\"");
    let result = run_single_backtest(&config).unwrap();
    assert_eq!(result.bar_count, BARS - 24);
    assert!(result.start_time.starts_with("2025-06-03"));
}

#[test]
fn window_longer_than_data_fails_before_simulating() {
    let dir = TempDir::new().unwrap();
    let mut config = write_config(dir.path(), "");
    config.regime.window = BARS;
    let err = run_single_backtest(&config).unwrap_err();
    assert!(matches!(
        err,
        RunError::Engine(EngineError::Regime(RegimeError::WindowExceedsSeries { .. }))
    ));
}

#[test]
fn reruns_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let a = run_single_backtest(&config).unwrap();
    let b = run_single_backtest(&config).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn artifacts_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let result = run_single_backtest(&config).unwrap();

    let run_dir = save_artifacts(&result, &config.report.output_dir).unwrap();
    for name in ["result.json", "trades.csv", "equity.csv", "summary.txt"] {
        assert!(run_dir.join(name).exists(), "missing {name}");
    }
    let trades_csv = std::fs::read_to_string(run_dir.join("trades.csv")).unwrap();
    assert_eq!(trades_csv.lines().count(), result.trades.len() + 1);

    // Float fields such as take_profit must survive JSON bit-for-bit.
    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.metrics, result.metrics);
    assert_eq!(loaded.trades, result.trades);
    assert_eq!(loaded.config, result.config);
}

#[test]
fn diagnostics_cover_every_bar() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let (result, run) = run_with_diagnostics(&config).unwrap();
    assert_eq!(run.gates.len(), BARS);
    assert_eq!(run.gate_stats.bars, BARS);
    assert_eq!(result.gate_stats, run.gate_stats);
    assert_eq!(run.gate_stats.filtered_by_regime, 20);
    assert_eq!(result.metrics.max_consecutive_wins, run.max_consecutive_wins);
    assert_eq!(result.metrics.max_consecutive_losses, run.max_consecutive_losses);
}
