//! Domain types for RegimeLab

pub mod bar;
pub mod position;
pub mod series;
pub mod signal;
pub mod trade;

pub use bar::{Bar, PriceField, RawBar};
pub use position::{Position, PositionSide};
pub use series::{heiken_ashi, BarSeries, SeriesError};
pub use signal::{Direction, JoinStats, Signal, SignalSeries};
pub use trade::{ExitType, Trade};
