//! Bar: the fundamental market data unit.
//!
//! A `RawBar` is one OHLCV observation as ingested. A `Bar` is the same
//! observation plus its Heiken-Ashi candle, derived by `BarSeries`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLCV observation for a single time interval, before derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl RawBar {
    /// Returns true if every OHLCV field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// OHLCV bar with its Heiken-Ashi candle.
///
/// The HA fields for bar `i` depend only on raw bars `0..=i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub ha_open: f64,
    pub ha_high: f64,
    pub ha_low: f64,
    pub ha_close: f64,
}

/// Which candle drives pattern detection, fills and exit checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// Raw OHLC.
    Close,
    /// Heiken-Ashi candle.
    #[default]
    HaClose,
}

impl Bar {
    /// Basic sanity check on the raw candle: high >= low, high/low bracket open and close.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// Closing price of the candle selected by `field`.
    pub fn close_of(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Close => self.close,
            PriceField::HaClose => self.ha_close,
        }
    }

    /// Opening price of the candle selected by `field`.
    pub fn open_of(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Close => self.open,
            PriceField::HaClose => self.ha_open,
        }
    }

    pub fn high_of(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Close => self.high,
            PriceField::HaClose => self.ha_high,
        }
    }

    pub fn low_of(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Close => self.low,
            PriceField::HaClose => self.ha_low,
        }
    }

    /// HA candle as the regime feature vector `[open, high, low, close]`.
    pub fn ha_features(&self) -> [f64; 4] {
        [self.ha_open, self.ha_high, self.ha_low, self.ha_close]
    }

    /// Absolute HA body size.
    pub fn ha_body(&self) -> f64 {
        (self.ha_close - self.ha_open).abs()
    }

    /// HA high-low range.
    pub fn ha_range(&self) -> f64 {
        self.ha_high - self.ha_low
    }
}
