//! RegimeLab CLI: backtest, condition report, and Heiken-Ashi conversion.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config and write artifacts
//! - `conditions`: report how often each entry gate was open, without writing artifacts
//! - `convert`: write an OHLCV CSV back out with its Heiken-Ashi candle

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use regimelab_runner::{
    export_heiken_ashi_csv, generate_conditions_report, generate_summary, load_bars,
    run_single_backtest, run_with_diagnostics, save_artifacts, BacktestConfig, LoadOptions,
};

#[derive(Parser)]
#[command(
    name = "regimelab",
    about = "RegimeLab CLI: causal Heiken-Ashi regime backtester"
)]
struct Cli {
    /// Log at info level.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    /// Log at debug level (per-trade entries and exits).
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Input selection shared by `run` and `conditions`. Flags override the config file.
#[derive(Args)]
struct DataArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// OHLCV bars CSV.
    #[arg(long)]
    bars: Option<PathBuf>,

    /// Ensemble signals CSV.
    #[arg(long)]
    signals: Option<PathBuf>,

    /// First date to include (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last date to include (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest and save result.json, trades.csv, equity.csv and summary.txt.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Output directory for artifacts. Overrides [report].output_dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the full result as JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print per-gate condition statistics for a configuration.
    Conditions {
        #[command(flatten)]
        data: DataArgs,

        /// Print the statistics as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Convert an OHLCV CSV to one carrying Heiken-Ashi columns.
    Convert {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Run {
            data,
            output_dir,
            json,
        } => run_backtest_cmd(data, output_dir, json),
        Commands::Conditions { data, json } => run_conditions_cmd(data, json),
        Commands::Convert { input, output } => run_convert_cmd(input, output),
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let default = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn build_config(data: DataArgs) -> Result<BacktestConfig> {
    let mut config = match &data.config {
        Some(path) => BacktestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BacktestConfig::default(),
    };
    if data.bars.is_some() {
        config.data.bars = data.bars;
    }
    if data.signals.is_some() {
        config.data.signals = data.signals;
    }
    if data.start.is_some() {
        config.data.start = data.start;
    }
    if data.end.is_some() {
        config.data.end = data.end;
    }
    config.validate()?;
    tracing::debug!(
        bars = ?config.data.bars,
        signals = ?config.data.signals,
        window = config.regime.window,
        "configuration resolved"
    );
    Ok(config)
}

fn run_backtest_cmd(data: DataArgs, output_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let mut config = build_config(data)?;
    if let Some(dir) = output_dir {
        config.report.output_dir = dir;
    }

    let result = run_single_backtest(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", generate_summary(&result));
    }

    let run_dir = save_artifacts(&result, &config.report.output_dir)?;
    eprintln!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_conditions_cmd(data: DataArgs, json: bool) -> Result<()> {
    let config = build_config(data)?;
    let (_, run) = run_with_diagnostics(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run.gate_stats)?);
    } else {
        print!(
            "{}",
            generate_conditions_report(&run.gate_stats, run.volume_mode)
        );
    }
    Ok(())
}

fn run_convert_cmd(input: PathBuf, output: PathBuf) -> Result<()> {
    let series = load_bars(&input, &LoadOptions::default())?;
    let csv = export_heiken_ashi_csv(&series)?;
    std::fs::write(&output, csv)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Converted {} bars: {} -> {}",
        series.len(),
        input.display(),
        output.display()
    );
    Ok(())
}
