//! Reporting and export: JSON, CSV, and plain-text artifacts.
//!
//! - **JSON**: full `BacktestResult` with schema versioning
//! - **CSV**: trade log, equity curve, and Heiken-Ashi candle files
//! - **Text**: run summary and gate condition report for the terminal
//!
//! Unknown schema versions are rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use regimelab_core::domain::{BarSeries, Trade};
use regimelab_core::gates::{GateStats, VolumeMode};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade log, one row per closed trade.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "entry_index",
        "entry_time",
        "side",
        "entry_price",
        "size",
        "stop_loss",
        "take_profit",
        "confidence",
        "exit_index",
        "exit_time",
        "exit_price",
        "exit_type",
        "pnl",
        "bars_open",
        "days_open",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_index.to_string(),
            &t.entry_time.to_string(),
            &format!("{:?}", t.side),
            &format!("{:.6}", t.entry_price),
            &format!("{:.4}", t.size),
            &format!("{:.6}", t.stop_loss),
            &format!("{:.6}", t.take_profit),
            &format!("{:.4}", t.confidence),
            &t.exit_index.to_string(),
            &t.exit_time.to_string(),
            &format!("{:.6}", t.exit_price),
            &t.exit_type.to_string(),
            &format!("{:.2}", t.pnl),
            &t.bars_open.to_string(),
            &format!("{:.4}", t.days_open),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the equity curve. Row 0 is the initial balance; row k is the
/// balance after trade k, stamped with that trade's exit time.
pub fn export_equity_csv(equity_curve: &[f64], trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "exit_time", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        let time = i
            .checked_sub(1)
            .and_then(|k| trades.get(k))
            .map(|t| t.exit_time.to_string())
            .unwrap_or_default();
        wtr.write_record([&i.to_string(), &time, &format!("{:.2}", eq)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export raw OHLCV with the derived Heiken-Ashi candle.
pub fn export_heiken_ashi_csv(series: &BarSeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "time", "open", "high", "low", "close", "volume", "ha_open", "ha_high", "ha_low",
        "ha_close",
    ])?;
    for b in series.iter() {
        wtr.write_record([
            b.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
            b.ha_open.to_string(),
            b.ha_high.to_string(),
            b.ha_low.to_string(),
            b.ha_close.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `run_{run_id prefix}/` under `output_dir` containing:
/// - `result.json`: the full `BacktestResult`
/// - `trades.csv`: trade log
/// - `equity.csv`: balance after each trade
/// - `summary.txt`: the text summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix = result.run_id.get(..12).unwrap_or(&result.run_id);
    let run_dir = output_dir.join(format!("run_{prefix}"));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let write = |name: &str, content: &str| -> Result<()> {
        let path = run_dir.join(name);
        std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))
    };
    write("result.json", &export_json(result)?)?;
    write("trades.csv", &export_trades_csv(&result.trades)?)?;
    write(
        "equity.csv",
        &export_equity_csv(&result.equity_curve, &result.trades)?,
    )?;
    write("summary.txt", &generate_summary(result))?;

    tracing::info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's result.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Text reports ───────────────────────────────────────────────────

/// Human-readable run summary.
pub fn generate_summary(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let mut out = String::with_capacity(1536);

    let _ = writeln!(out, "BACKTEST RESULTS");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "Run ID:            {}", result.run_id);
    let _ = writeln!(out, "Period:            {} to {}", result.start_time, result.end_time);
    let _ = writeln!(
        out,
        "Bars:              {} ({} warmup)",
        result.bar_count, result.warmup_bars
    );
    let _ = writeln!(out, "Dataset hash:      {}", result.dataset_hash);
    let _ = writeln!(
        out,
        "Signals joined:    {} ({} unmatched, {} duplicates)",
        result.join.matched, result.join.unmatched, result.join.duplicates
    );
    if result.volume_mode == VolumeMode::Degraded {
        let _ = writeln!(out, "Volume gate:       DEGRADED (no volume data)");
    }

    let _ = writeln!(out, "\nSummary");
    let _ = writeln!(out, "  Initial balance:     {:.2}", m.initial_balance);
    let _ = writeln!(out, "  Final balance:       {:.2}", m.final_balance);
    let _ = writeln!(out, "  Net profit/loss:     {:.2}", m.net_profit);
    let _ = writeln!(out, "  ROI:                 {:.2}%", m.roi);

    let _ = writeln!(out, "\nTrades");
    let _ = writeln!(out, "  Total trades:        {}", m.total_trades);
    let _ = writeln!(out, "  Winning trades:      {}", m.winning_trades);
    let _ = writeln!(out, "  Losing trades:       {}", m.losing_trades);
    let _ = writeln!(out, "  Win rate:            {:.2}%", m.win_rate);
    let _ = writeln!(out, "  Profit factor:       {:.2}", m.profit_factor);
    let _ = writeln!(out, "  Total profit:        {:.2}", m.total_profit);
    let _ = writeln!(out, "  Total loss:          {:.2}", m.total_loss);
    let _ = writeln!(out, "  Avg win:             {:.2}", m.avg_win);
    let _ = writeln!(out, "  Avg loss:            {:.2}", m.avg_loss);

    let _ = writeln!(out, "\nDuration");
    let _ = writeln!(out, "  Avg bars open:       {:.1}", m.avg_bars_open);
    let _ = writeln!(out, "  Avg days open:       {:.1}", m.avg_days_open);
    let _ = writeln!(out, "  Max consec. wins:    {}", m.max_consecutive_wins);
    let _ = writeln!(out, "  Max consec. losses:  {}", m.max_consecutive_losses);

    let _ = writeln!(out, "\nRisk");
    let _ = writeln!(out, "  Max drawdown:        {:.2}%", m.max_drawdown);
    let _ = writeln!(out, "  Sharpe ratio:        {:.2}", m.sharpe_ratio);

    out
}

/// Per-gate condition counts with percentages of all bars.
pub fn generate_conditions_report(stats: &GateStats, volume_mode: VolumeMode) -> String {
    let mut out = String::with_capacity(1024);
    let line = |out: &mut String, label: &str, count: usize| {
        let _ = writeln!(out, "  {label:<26}{count:>8}  ({:>6.2}%)", stats.pct(count));
    };

    let _ = writeln!(out, "ENTRY CONDITIONS ({} bars)", stats.bars);
    let _ = writeln!(out, "{}", "=".repeat(60));
    line(&mut out, "Regime valid:", stats.regime_valid);
    line(&mut out, "Pattern valid:", stats.pattern_valid);
    line(&mut out, "Volume valid:", stats.volume_valid);
    line(&mut out, "All gates open:", stats.all_valid);
    if volume_mode == VolumeMode::Degraded {
        let _ = writeln!(out, "  (volume gate degraded: no volume data)");
    }

    let _ = writeln!(out, "\nSignals");
    line(&mut out, "Signals present:", stats.signals);
    line(&mut out, "Actionable:", stats.actionable);
    line(&mut out, "Filtered by regime:", stats.filtered_by_regime);
    line(&mut out, "Filtered by pattern:", stats.filtered_by_pattern);
    line(&mut out, "Filtered by volume:", stats.filtered_by_volume);
    line(&mut out, "Skipped (position open):", stats.skipped_while_open);
    line(&mut out, "Skipped (daily limit):", stats.skipped_daily_limit);

    out
}
