//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Single position: trades never overlap in time
//! 2. Trade/equity consistency: one equity point per trade plus the initial balance
//! 3. PnL sign: target exits win, stop exits lose
//! 4. Idempotence: identical inputs give identical results
//! 5. Parallel regime classification equals sequential

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use regimelab_core::domain::{
    BarSeries, Direction, ExitType, RawBar, Signal, SignalSeries,
};
use regimelab_core::engine::{
    run_simulation, EntryTiming, ExecutionSettings, ExitTrigger, SimulationConfig,
};
use regimelab_core::gates::PatternDetector;
use regimelab_core::regime::{RegimeClassifier, RegimeConfig};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random-walk bars from a vector of per-bar moves.
fn bars_from_moves(moves: &[(f64, f64)]) -> BarSeries {
    let base = NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut price = 1.2;
    let raw = moves
        .iter()
        .enumerate()
        .map(|(i, &(step, vol))| {
            let open = price;
            price = (price + step).max(0.1);
            RawBar {
                timestamp: base + Duration::minutes(30 * i as i64),
                open,
                high: open.max(price) + 0.002,
                low: open.min(price) - 0.002,
                close: price,
                volume: vol,
            }
        })
        .collect();
    BarSeries::from_raw(raw).unwrap()
}

fn arb_moves(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-0.01..0.01_f64, 0.0..500.0_f64), len)
}

fn arb_direction() -> impl Strategy<Value = Option<Signal>> {
    prop_oneof![
        Just(None),
        (0.0..1.0_f64).prop_map(|c| Some(Signal::new(Direction::Long, c))),
        (0.0..1.0_f64).prop_map(|c| Some(Signal::new(Direction::Short, c))),
        Just(Some(Signal::flat())),
    ]
}

fn arb_execution() -> impl Strategy<Value = ExecutionSettings> {
    (
        prop::bool::ANY,
        prop::bool::ANY,
        prop::option::of(1..4_u32),
    )
        .prop_map(|(next_open, range, limit)| ExecutionSettings {
            entry_timing: if next_open {
                EntryTiming::NextBarOpen
            } else {
                EntryTiming::SignalClose
            },
            exit_trigger: if range {
                ExitTrigger::Range
            } else {
                ExitTrigger::Close
            },
            max_trades_per_day: limit,
            ..ExecutionSettings::default()
        })
}

fn config(execution: ExecutionSettings) -> SimulationConfig {
    SimulationConfig {
        regime: RegimeConfig {
            window: 12,
            n_init: 1,
            parallel: false,
            ..RegimeConfig::default()
        },
        execution,
        pattern_threshold: 2,
        ..SimulationConfig::default()
    }
}

fn signals_for(raw: &[Option<Signal>], n: usize) -> SignalSeries {
    SignalSeries::new((0..n).map(|i| raw[i % raw.len()]).collect())
}

// ── 1-3. Position and equity invariants ──────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Trades never overlap and equity tracks the trade log exactly.
    #[test]
    fn single_position_and_equity_consistency(
        moves in arb_moves(20..80),
        raw_signals in prop::collection::vec(arb_direction(), 1..10),
        execution in arb_execution(),
    ) {
        let series = bars_from_moves(&moves);
        let signals = signals_for(&raw_signals, series.len());
        let result = run_simulation(&series, &signals, &config(execution)).unwrap();

        prop_assert_eq!(result.equity_curve.len(), result.trades.len() + 1);
        for pair in result.trades.windows(2) {
            prop_assert!(pair[1].entry_index >= pair[0].exit_index);
        }
        for (k, trade) in result.trades.iter().enumerate() {
            let step = result.equity_curve[k + 1] - result.equity_curve[k];
            prop_assert!((step - trade.pnl).abs() < 1e-6);
            prop_assert!(trade.exit_index >= trade.entry_index);
            prop_assert!(trade.entry_index >= 12);
        }
        let ends = result.trades.iter().filter(|t| t.exit_type == ExitType::End).count();
        prop_assert!(ends <= 1);
    }

    /// Take-profit exits are winners and stop-loss exits are losers.
    #[test]
    fn pnl_sign_follows_exit_type(
        moves in arb_moves(20..80),
        raw_signals in prop::collection::vec(arb_direction(), 1..10),
        execution in arb_execution(),
    ) {
        let series = bars_from_moves(&moves);
        let signals = signals_for(&raw_signals, series.len());
        let result = run_simulation(&series, &signals, &config(execution)).unwrap();
        for trade in &result.trades {
            match trade.exit_type {
                ExitType::TakeProfit => prop_assert!(trade.pnl > 0.0),
                ExitType::StopLoss => prop_assert!(trade.pnl < 0.0),
                ExitType::End => {}
            }
        }
    }
}

// ── 4-5. Determinism ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Re-running on identical inputs gives byte-identical serialized output.
    #[test]
    fn rerun_is_idempotent(
        moves in arb_moves(20..60),
        raw_signals in prop::collection::vec(arb_direction(), 1..6),
    ) {
        let series = bars_from_moves(&moves);
        let signals = signals_for(&raw_signals, series.len());
        let cfg = config(ExecutionSettings::default());
        let a = run_simulation(&series, &signals, &cfg).unwrap();
        let b = run_simulation(&series, &signals, &cfg).unwrap();
        prop_assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    /// Rayon classification is identical to the sequential pass.
    #[test]
    fn parallel_regimes_match_sequential(moves in arb_moves(15..50)) {
        let series = bars_from_moves(&moves);
        let clf = RegimeClassifier::new(RegimeConfig {
            window: 10,
            ..RegimeConfig::default()
        })
        .unwrap();
        prop_assert_eq!(clf.classify_all(&series), clf.classify_all_parallel(&series));
    }

    /// Pattern validity is exactly "either streak reached the threshold".
    #[test]
    fn pattern_validity_matches_counters(
        closes in prop::collection::vec(0.0..10.0_f64, 1..60),
        threshold in 1..5_u32,
    ) {
        let states = PatternDetector::detect(threshold, &closes).unwrap();
        for s in &states {
            prop_assert!(s.consecutive_up == 0 || s.consecutive_down == 0);
            prop_assert_eq!(
                s.valid,
                s.consecutive_up >= threshold || s.consecutive_down >= threshold
            );
        }
    }
}
