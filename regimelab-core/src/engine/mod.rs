//! Backtesting engine: position simulation and the bar-by-bar loop.
//!
//! The engine consumes a `BarSeries` and a bar-aligned `SignalSeries` (or a
//! `SignalSource` queried per bar), computes regime, pattern and volume gates
//! up front, then walks the bars once:
//!
//! 1. Exits: fill queued entries, check stop and target
//! 2. Gating: signal AND regime AND pattern AND volume
//! 3. Entries: only when flat
//! 4. End of data: force-close with exit type END

pub mod config;
pub mod loop_runner;
pub mod simulator;

pub use config::{
    ConfigError, EntryTiming, ExecutionSettings, ExitTrigger, RiskParameters, SimulationConfig,
};
pub use loop_runner::{
    prepare_gates, run_simulation, run_simulation_with_source, EngineError, GateInputs, RunResult,
};
pub use simulator::{
    DailyTradeCounter, EntryDecision, PositionSimulator, SimulationOutcome, StreakTracker,
};
