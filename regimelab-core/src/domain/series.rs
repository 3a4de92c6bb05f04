//! BarSeries: ordered, immutable bar sequence with derived Heiken-Ashi fields.

use chrono::NaiveDateTime;
use thiserror::Error;

use super::bar::{Bar, PriceField, RawBar};

/// Errors building a bar series. All are setup-time failures.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("bar series is empty")]
    Empty,

    #[error("bar {index} has a non-finite OHLCV value")]
    NonFinite { index: usize },

    #[error("bar {index} timestamp {current} is not after previous timestamp {previous}")]
    OutOfOrder {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },
}

/// Ordered bar sequence. Timestamps are strictly increasing; never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate raw bars and derive the Heiken-Ashi candle for each.
    pub fn from_raw(raw: Vec<RawBar>) -> Result<Self, SeriesError> {
        if raw.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (index, bar) in raw.iter().enumerate() {
            if !bar.is_finite() {
                return Err(SeriesError::NonFinite { index });
            }
            if index > 0 && bar.timestamp <= raw[index - 1].timestamp {
                return Err(SeriesError::OutOfOrder {
                    index,
                    previous: raw[index - 1].timestamp,
                    current: bar.timestamp,
                });
            }
        }
        Ok(Self {
            bars: heiken_ashi(&raw),
        })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false: construction rejects empty input.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    /// Closing price series of the selected candle.
    pub fn closes(&self, field: PriceField) -> Vec<f64> {
        self.bars.iter().map(|b| b.close_of(field)).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    /// First `len` bars as a new series (clamped to `1..=self.len()`).
    ///
    /// HA fields are prefix-stable, so the truncated bars are identical to
    /// the corresponding bars of `self`.
    pub fn truncated(&self, len: usize) -> Self {
        let len = len.clamp(1, self.bars.len());
        Self {
            bars: self.bars[..len].to_vec(),
        }
    }
}

/// Derive Heiken-Ashi candles from raw OHLC.
///
/// ```text
/// ha_close[i] = (open + high + low + close) / 4
/// ha_open[0]  = (open[0] + close[0]) / 2
/// ha_open[i]  = (ha_open[i-1] + ha_close[i-1]) / 2
/// ha_high[i]  = max(high, ha_open, ha_close)
/// ha_low[i]   = min(low, ha_open, ha_close)
/// ```
pub fn heiken_ashi(raw: &[RawBar]) -> Vec<Bar> {
    let mut bars: Vec<Bar> = Vec::with_capacity(raw.len());

    for (i, r) in raw.iter().enumerate() {
        let ha_close = (r.open + r.high + r.low + r.close) / 4.0;
        let ha_open = if i == 0 {
            (r.open + r.close) / 2.0
        } else {
            let prev = &bars[i - 1];
            (prev.ha_open + prev.ha_close) / 2.0
        };
        bars.push(Bar {
            timestamp: r.timestamp,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
            ha_open,
            ha_high: r.high.max(ha_open).max(ha_close),
            ha_low: r.low.min(ha_open).min(ha_close),
            ha_close,
        });
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(15 * i)
    }

    fn raw(i: i64, open: f64, high: f64, low: f64, close: f64) -> RawBar {
        RawBar {
            timestamp: ts(i),
            open,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn first_bar_ha_open_is_mean_of_open_close() {
        let series = BarSeries::from_raw(vec![raw(0, 10.0, 12.0, 9.0, 11.0)]).unwrap();
        let bar = &series.bars()[0];
        assert!((bar.ha_open - 10.5).abs() < 1e-12);
        assert!((bar.ha_close - 10.5).abs() < 1e-12);
        assert_eq!(bar.ha_high, 12.0);
        assert_eq!(bar.ha_low, 9.0);
    }

    #[test]
    fn ha_open_recurses_on_previous_candle() {
        let series = BarSeries::from_raw(vec![
            raw(0, 10.0, 12.0, 9.0, 11.0),
            raw(1, 11.0, 14.0, 10.0, 13.0),
        ])
        .unwrap();
        let b1 = &series.bars()[1];
        // ha_open[1] = (10.5 + 10.5) / 2, ha_close[1] = 48 / 4
        assert!((b1.ha_open - 10.5).abs() < 1e-12);
        assert!((b1.ha_close - 12.0).abs() < 1e-12);
        assert_eq!(b1.ha_high, 14.0);
        assert!((b1.ha_low - 10.0).abs() < 1e-12);
    }

    #[test]
    fn ha_low_can_come_from_ha_open() {
        // Gap up: the recursive ha_open sits below the raw low.
        let series = BarSeries::from_raw(vec![
            raw(0, 10.0, 10.5, 9.5, 10.0),
            raw(1, 20.0, 21.0, 19.0, 20.0),
        ])
        .unwrap();
        let b1 = &series.bars()[1];
        assert!((b1.ha_open - 10.0).abs() < 1e-12);
        assert!((b1.ha_low - 10.0).abs() < 1e-12);
    }

    #[test]
    fn empty_series_rejected() {
        assert_eq!(BarSeries::from_raw(vec![]), Err(SeriesError::Empty));
    }

    #[test]
    fn out_of_order_rejected() {
        let err = BarSeries::from_raw(vec![
            raw(1, 10.0, 11.0, 9.0, 10.0),
            raw(0, 10.0, 11.0, 9.0, 10.0),
        ])
        .unwrap_err();
        assert!(matches!(err, SeriesError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let err = BarSeries::from_raw(vec![
            raw(0, 10.0, 11.0, 9.0, 10.0),
            raw(0, 10.0, 11.0, 9.0, 10.0),
        ])
        .unwrap_err();
        assert!(matches!(err, SeriesError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn non_finite_rejected() {
        let err = BarSeries::from_raw(vec![
            raw(0, 10.0, 11.0, 9.0, 10.0),
            raw(1, 10.0, f64::INFINITY, 9.0, 10.0),
        ])
        .unwrap_err();
        assert_eq!(err, SeriesError::NonFinite { index: 1 });
    }

    #[test]
    fn truncation_preserves_prefix() {
        let bars: Vec<RawBar> = (0..20)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                raw(i, c - 0.5, c + 1.0, c - 1.0, c)
            })
            .collect();
        let full = BarSeries::from_raw(bars).unwrap();
        let short = full.truncated(8);
        assert_eq!(short.len(), 8);
        assert_eq!(short.bars(), &full.bars()[..8]);
    }

    #[test]
    fn closes_follow_price_field() {
        let series = BarSeries::from_raw(vec![
            raw(0, 10.0, 12.0, 9.0, 11.0),
            raw(1, 11.0, 14.0, 10.0, 13.0),
        ])
        .unwrap();
        assert_eq!(series.closes(PriceField::Close), vec![11.0, 13.0]);
        assert_eq!(series.closes(PriceField::HaClose), vec![10.5, 12.0]);
    }
}
