//! Bar-by-bar simulation loop: the heart of the backtesting engine.
//!
//! Setup (all fallible, all before bar 0):
//! 1. Validate risk, execution, regime and pattern configuration
//! 2. Classify regimes, detect patterns, evaluate the volume gate
//!
//! Then, for each bar (infallible):
//! 1. Fill queued entries and check exits
//! 2. Gate the bar's signal
//! 3. Offer actionable signals to the simulator
//!
//! After the last bar any open position is closed with exit type END.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BarSeries, SignalSeries, Trade};
use crate::gates::{
    self, GateError, GateSnapshot, GateStats, PatternDetector, PatternState, VolumeGate,
    VolumeMode,
};
use crate::regime::{RegimeClassifier, RegimeError, RegimeState};
use crate::signals::SignalSource;

use super::config::{ConfigError, SimulationConfig};
use super::simulator::{EntryDecision, PositionSimulator};

/// Setup-time failures. Nothing is simulated when one is returned.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid risk/execution config: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid regime config: {0}")]
    Regime(#[from] RegimeError),

    #[error("invalid pattern config: {0}")]
    Gate(#[from] GateError),

    #[error("signal series has {signals} entries but the bar series has {bars}")]
    SignalLengthMismatch { bars: usize, signals: usize },
}

/// Per-bar gate inputs computed before the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct GateInputs {
    pub regimes: Vec<RegimeState>,
    pub patterns: Vec<PatternState>,
    pub volume: VolumeGate,
}

/// Result of a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub regimes: Vec<RegimeState>,
    pub patterns: Vec<PatternState>,
    pub gates: Vec<GateSnapshot>,
    pub gate_stats: GateStats,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub volume_mode: VolumeMode,
    /// Bars before the first possible regime classification.
    pub warmup_bars: usize,
    pub bar_count: usize,
}

impl RunResult {
    pub fn final_balance(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(0.0)
    }
}

/// Validate `config` against `series` and compute every gate input.
pub fn prepare_gates(
    series: &BarSeries,
    config: &SimulationConfig,
) -> Result<GateInputs, EngineError> {
    let classifier = RegimeClassifier::new(config.regime.clone())?;
    classifier.check_series(series.len())?;
    let closes = series.closes(config.execution.price_field);
    let patterns = PatternDetector::detect(config.pattern_threshold, &closes)?;

    let volume = VolumeGate::evaluate(&series.volumes());
    if volume.mode == VolumeMode::Degraded {
        tracing::warn!("series has no volume data; volume confirmation disabled");
    }

    let regimes = classifier.classify(series);
    Ok(GateInputs {
        regimes,
        patterns,
        volume,
    })
}

/// Run the full pipeline with a precomputed, bar-aligned signal series.
pub fn run_simulation(
    series: &BarSeries,
    signals: &SignalSeries,
    config: &SimulationConfig,
) -> Result<RunResult, EngineError> {
    if signals.len() != series.len() {
        return Err(EngineError::SignalLengthMismatch {
            bars: series.len(),
            signals: signals.len(),
        });
    }
    let simulator = PositionSimulator::new(config.risk.clone(), config.execution)?;
    let inputs = prepare_gates(series, config)?;
    Ok(simulate(series, signals, inputs, simulator, config))
}

/// Run the full pipeline, querying `source` for each bar's signal.
pub fn run_simulation_with_source(
    series: &BarSeries,
    source: &dyn SignalSource,
    config: &SimulationConfig,
) -> Result<RunResult, EngineError> {
    let simulator = PositionSimulator::new(config.risk.clone(), config.execution)?;
    let inputs = prepare_gates(series, config)?;
    let signals = SignalSeries::from_source(series, &inputs.regimes, &inputs.patterns, source);
    tracing::debug!(
        source = source.name(),
        directional = signals.directional_count(),
        "signals generated"
    );
    Ok(simulate(series, &signals, inputs, simulator, config))
}

fn simulate(
    series: &BarSeries,
    signals: &SignalSeries,
    inputs: GateInputs,
    mut simulator: PositionSimulator,
    config: &SimulationConfig,
) -> RunResult {
    let mut gate_log = Vec::with_capacity(series.len());
    let mut stats = GateStats::default();

    for (i, bar) in series.iter().enumerate() {
        simulator.process_exits(i, bar);

        let signal = signals.get(i);
        let snapshot = gates::evaluate(
            signal,
            inputs.regimes[i].valid,
            inputs.patterns[i].valid,
            inputs.volume.is_valid(i),
        );
        stats.record(&snapshot);

        if let (true, Some(signal)) = (snapshot.verdict.is_passed(), signal) {
            if let Some(EntryDecision::SkippedWhileOpen) = simulator.process_entry(i, bar, signal) {
                stats.skipped_while_open += 1;
            }
        }
        gate_log.push(snapshot);
    }

    let last_index = series.len() - 1;
    let outcome = simulator.finish(last_index, series.last());
    stats.skipped_daily_limit = outcome.skipped_daily_limit;

    tracing::info!(
        bars = series.len(),
        trades = outcome.trades.len(),
        actionable = stats.actionable,
        final_balance = outcome.equity_curve.last().copied().unwrap_or_default(),
        "simulation complete"
    );

    RunResult {
        trades: outcome.trades,
        equity_curve: outcome.equity_curve,
        regimes: inputs.regimes,
        patterns: inputs.patterns,
        gates: gate_log,
        gate_stats: stats,
        max_consecutive_wins: outcome.streaks.max_wins,
        max_consecutive_losses: outcome.streaks.max_losses,
        volume_mode: inputs.volume.mode,
        warmup_bars: config.regime.window,
        bar_count: series.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, RawBar, Signal};
    use crate::regime::RegimeConfig;
    use chrono::{Duration, NaiveDate};

    fn zigzag_series(n: usize) -> BarSeries {
        let base = NaiveDate::from_ymd_opt(2025, 5, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let raw = (0..n)
            .map(|i| {
                let c = 1.10 + (i as f64 * 0.4).sin() * 0.02;
                RawBar {
                    timestamp: base + Duration::minutes(15 * i as i64),
                    open: c - 0.001,
                    high: c + 0.002,
                    low: c - 0.002,
                    close: c,
                    volume: 100.0 + (i % 7) as f64 * 10.0,
                }
            })
            .collect();
        BarSeries::from_raw(raw).unwrap()
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            regime: RegimeConfig {
                window: 20,
                parallel: false,
                ..RegimeConfig::default()
            },
            ..SimulationConfig::default()
        }
    }

    fn always(direction: Direction, n: usize) -> SignalSeries {
        SignalSeries::new(vec![Some(Signal::new(direction, 0.8)); n])
    }

    #[test]
    fn equity_has_one_point_per_trade_plus_initial() {
        let series = zigzag_series(200);
        let result = run_simulation(&series, &always(Direction::Long, 200), &config()).unwrap();
        assert_eq!(result.equity_curve.len(), result.trades.len() + 1);
        assert_eq!(result.gates.len(), 200);
        assert_eq!(result.regimes.len(), 200);
    }

    #[test]
    fn no_entries_during_regime_warmup() {
        let series = zigzag_series(120);
        let result = run_simulation(&series, &always(Direction::Short, 120), &config()).unwrap();
        assert!(result.trades.iter().all(|t| t.entry_index >= 20));
        assert!(result.gates[..20].iter().all(|g| !g.verdict.is_passed()));
    }

    #[test]
    fn no_signals_means_no_trades() {
        let series = zigzag_series(80);
        let result = run_simulation(&series, &SignalSeries::empty(80), &config()).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve, vec![10_000.0]);
        assert_eq!(result.gate_stats.signals, 0);
    }

    #[test]
    fn signal_length_must_match() {
        let series = zigzag_series(50);
        let err = run_simulation(&series, &SignalSeries::empty(49), &config()).unwrap_err();
        assert_eq!(
            err,
            EngineError::SignalLengthMismatch {
                bars: 50,
                signals: 49
            }
        );
    }

    #[test]
    fn window_not_shorter_than_series_is_rejected() {
        let series = zigzag_series(20);
        let err = run_simulation(&series, &SignalSeries::empty(20), &config()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Regime(RegimeError::WindowExceedsSeries { .. })
        ));
    }

    #[test]
    fn invalid_risk_fails_before_simulation() {
        let series = zigzag_series(50);
        let mut cfg = config();
        cfg.risk.risk_percent = 0.0;
        let err = run_simulation(&series, &SignalSeries::empty(50), &cfg).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn rerun_is_identical() {
        let series = zigzag_series(150);
        let signals = always(Direction::Long, 150);
        let a = run_simulation(&series, &signals, &config()).unwrap();
        let b = run_simulation(&series, &signals, &config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn source_driven_run_matches_equivalent_series() {
        let series = zigzag_series(100);
        let source = crate::signals::ConstantSource {
            signal: Signal::new(Direction::Long, 0.8),
        };
        let from_source = run_simulation_with_source(&series, &source, &config()).unwrap();
        let from_series = run_simulation(&series, &always(Direction::Long, 100), &config()).unwrap();
        assert_eq!(from_source.trades, from_series.trades);
    }
}
