//! CSV ingestion for bars and ensemble signals.
//!
//! Bars: `time, open, high, low, close[, volume]`, header names matched
//! case-insensitively with a few common aliases. A missing volume column is
//! read as zero volume, which puts the volume gate in degraded mode.
//!
//! Signals: `time, ensemble|signal|direction[, confidence]`. The direction
//! cell is read as a number and reduced to its sign. An empty direction cell
//! means "no signal for this bar".
//!
//! Bars are filtered to the inclusive `[start, end]` date range before the
//! series is built, then signals are left-joined onto them by exact timestamp.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use regimelab_core::domain::{
    BarSeries, Direction, JoinStats, RawBar, SeriesError, Signal, SignalSeries,
};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: malformed CSV: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: no '{column}' column in header", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("{}: no bars in the requested date range", path.display())]
    NoBarsInRange { path: PathBuf },

    #[error("{}: {source}", path.display())]
    Series {
        path: PathBuf,
        #[source]
        source: SeriesError,
    },
}

/// Inclusive date range applied to bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl LoadOptions {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let date = ts.date();
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Bars and bar-aligned signals ready for the engine.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub series: BarSeries,
    pub signals: SignalSeries,
    pub join: JoinStats,
    /// BLAKE3 over every bar's timestamp and OHLCV values.
    pub dataset_hash: String,
}

const TIME_COLUMNS: &[&str] = &["time", "datetime", "date", "timestamp"];
const VOLUME_COLUMNS: &[&str] = &["volume", "vol", "tickvol", "tick_volume"];
const DIRECTION_COLUMNS: &[&str] = &["ensemble", "signal", "direction"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M",
];

/// Parse the timestamp forms found in broker exports. A bare date is midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ── Column lookup ────────────────────────────────────────────────────

struct Columns<'a> {
    path: &'a Path,
    headers: Vec<String>,
}

impl<'a> Columns<'a> {
    fn new(path: &'a Path, headers: &csv::StringRecord) -> Self {
        Self {
            path,
            headers: headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
        }
    }

    fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.headers.iter().position(|h| h == alias))
    }

    fn require(&self, column: &'static str, aliases: &[&str]) -> Result<usize, LoadError> {
        self.find(aliases).ok_or_else(|| LoadError::MissingColumn {
            path: self.path.to_path_buf(),
            column,
        })
    }
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

fn line_of(record: &csv::StringRecord, row: usize) -> u64 {
    record
        .position()
        .map(|p| p.line())
        .unwrap_or(row as u64 + 2)
}

fn parse_error(path: &Path, line: u64, message: String) -> LoadError {
    LoadError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    }
}

fn cell<'r>(record: &'r csv::StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("")
}

fn number(
    path: &Path,
    line: u64,
    record: &csv::StringRecord,
    index: usize,
    column: &str,
) -> Result<f64, LoadError> {
    let raw = cell(record, index);
    raw.parse::<f64>()
        .map_err(|_| parse_error(path, line, format!("invalid {column} value '{raw}'")))
}

// ── Bars ─────────────────────────────────────────────────────────────

/// Read raw bars from any CSV source. `path` labels errors only.
pub fn parse_bars<R: Read>(reader: R, path: &Path) -> Result<Vec<RawBar>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv_reader(reader);
    let columns = Columns::new(path, rdr.headers().map_err(csv_err)?);
    let time = columns.require("time", TIME_COLUMNS)?;
    let open = columns.require("open", &["open"])?;
    let high = columns.require("high", &["high"])?;
    let low = columns.require("low", &["low"])?;
    let close = columns.require("close", &["close"])?;
    let volume = columns.find(VOLUME_COLUMNS);

    let mut bars = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let line = line_of(&record, row);
        let ts_raw = cell(&record, time);
        let timestamp = parse_timestamp(ts_raw)
            .ok_or_else(|| parse_error(path, line, format!("invalid timestamp '{ts_raw}'")))?;
        let volume = match volume {
            Some(idx) if !cell(&record, idx).is_empty() => {
                number(path, line, &record, idx, "volume")?
            }
            _ => 0.0,
        };
        bars.push(RawBar {
            timestamp,
            open: number(path, line, &record, open, "open")?,
            high: number(path, line, &record, high, "high")?,
            low: number(path, line, &record, low, "low")?,
            close: number(path, line, &record, close, "close")?,
            volume,
        });
    }
    Ok(bars)
}

/// Load bars from `path`, filter to the date range and build the series.
pub fn load_bars(path: &Path, opts: &LoadOptions) -> Result<BarSeries, LoadError> {
    let raw: Vec<RawBar> = parse_bars(open(path)?, path)?
        .into_iter()
        .filter(|b| opts.contains(b.timestamp))
        .collect();
    if raw.is_empty() {
        return Err(LoadError::NoBarsInRange {
            path: path.to_path_buf(),
        });
    }
    let series = BarSeries::from_raw(raw).map_err(|source| LoadError::Series {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        bars = series.len(),
        path = %path.display(),
        "bars loaded"
    );
    Ok(series)
}

// ── Signals ──────────────────────────────────────────────────────────

/// Read timestamped signals from any CSV source. Rows with an empty
/// direction cell are skipped.
pub fn parse_signals<R: Read>(
    reader: R,
    path: &Path,
) -> Result<Vec<(NaiveDateTime, Signal)>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv_reader(reader);
    let columns = Columns::new(path, rdr.headers().map_err(csv_err)?);
    let time = columns.require("time", TIME_COLUMNS)?;
    let direction = columns.require("direction", DIRECTION_COLUMNS)?;
    let confidence = columns.find(&["confidence"]);

    let mut signals = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let line = line_of(&record, row);
        if cell(&record, direction).is_empty() {
            continue;
        }
        let ts_raw = cell(&record, time);
        let timestamp = parse_timestamp(ts_raw)
            .ok_or_else(|| parse_error(path, line, format!("invalid timestamp '{ts_raw}'")))?;
        let value = number(path, line, &record, direction, "direction")?;
        let confidence = match confidence {
            Some(idx) if !cell(&record, idx).is_empty() => {
                number(path, line, &record, idx, "confidence")?
            }
            _ => 0.0,
        };
        signals.push((timestamp, Signal::new(Direction::from_value(value), confidence)));
    }
    Ok(signals)
}

pub fn load_signals(path: &Path) -> Result<Vec<(NaiveDateTime, Signal)>, LoadError> {
    parse_signals(open(path)?, path)
}

// ── Assembly ─────────────────────────────────────────────────────────

/// BLAKE3 over every bar's timestamp and raw OHLCV values.
pub fn dataset_hash(series: &BarSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in series.iter() {
        hasher.update(bar.timestamp.to_string().as_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&v.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Join already-loaded bars and signals, logging join anomalies.
pub fn assemble(series: BarSeries, signals: &[(NaiveDateTime, Signal)]) -> LoadedData {
    let (aligned, join) = SignalSeries::left_join(&series, signals);
    if join.duplicates > 0 {
        tracing::warn!(
            duplicates = join.duplicates,
            "duplicate signal timestamps; the last row for each was kept"
        );
    }
    if join.unmatched > 0 {
        tracing::debug!(unmatched = join.unmatched, "signals with no matching bar");
    }
    let dataset_hash = dataset_hash(&series);
    LoadedData {
        series,
        signals: aligned,
        join,
        dataset_hash,
    }
}

/// Load bars and, when given, signals. Without a signals file every bar is
/// non-actionable.
pub fn load_data(
    bars: &Path,
    signals: Option<&Path>,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    let series = load_bars(bars, opts)?;
    let rows = match signals {
        Some(path) => load_signals(path)?,
        None => {
            tracing::warn!("no signals file; no bar will be actionable");
            Vec::new()
        }
    };
    Ok(assemble(series, &rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("test.csv")
    }

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        for s in [
            "2024-03-01 14:30:00",
            "2024-03-01T14:30:00",
            "2024-03-01 14:30",
            "2024.03.01 14:30",
            " 2024-03-01 14:30:00.000 ",
        ] {
            assert_eq!(parse_timestamp(s), Some(expected), "{s}");
        }
        assert_eq!(
            parse_timestamp("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("03/01/2024"), None);
    }

    #[test]
    fn bars_with_aliases() {
        let csv = "Time,OPEN,High,low,Close,TickVol\n\
                   2024-01-02 00:00:00,1.1,1.2,1.0,1.15,100\n\
                   2024-01-02 00:15:00,1.15,1.25,1.1,1.2,\n";
        let bars = parse_bars(csv.as_bytes(), &path()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].volume, 100.0);
        assert_eq!(bars[1].volume, 0.0);
        assert_eq!(bars[1].close, 1.2);
    }

    #[test]
    fn bars_without_volume_column() {
        let csv = "date,open,high,low,close\n2024-01-02,1,2,0.5,1.5\n";
        let bars = parse_bars(csv.as_bytes(), &path()).unwrap();
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn missing_price_column_rejected() {
        let csv = "time,open,high,close\n2024-01-02,1,2,1.5\n";
        let err = parse_bars(csv.as_bytes(), &path()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column: "low", .. }));
    }

    #[test]
    fn bad_value_reports_line() {
        let csv = "time,open,high,low,close\n\
                   2024-01-02,1,2,0.5,1.5\n\
                   2024-01-03,1,abc,0.5,1.5\n";
        match parse_bars(csv.as_bytes(), &path()).unwrap_err() {
            LoadError::Parse { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("high"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn signals_sign_and_confidence() {
        let csv = "time,ensemble,confidence\n\
                   2024-01-02 00:00:00,1,0.8\n\
                   2024-01-02 00:15:00,-2,1.7\n\
                   2024-01-02 00:30:00,,0.5\n\
                   2024-01-02 00:45:00,0,\n";
        let signals = parse_signals(csv.as_bytes(), &path()).unwrap();
        assert_eq!(signals.len(), 3);
        assert_eq!(signals[0].1, Signal::new(Direction::Long, 0.8));
        assert_eq!(signals[1].1.direction, Direction::Short);
        assert_eq!(signals[1].1.confidence, 1.0);
        assert_eq!(signals[2].1, Signal::flat());
    }

    #[test]
    fn date_range_filter_is_inclusive() {
        let opts = LoadOptions {
            start: NaiveDate::from_ymd_opt(2024, 1, 2),
            end: NaiveDate::from_ymd_opt(2024, 1, 3),
        };
        let at = |d: u32, h: u32| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        assert!(!opts.contains(at(1, 23)));
        assert!(opts.contains(at(2, 0)));
        assert!(opts.contains(at(3, 23)));
        assert!(!opts.contains(at(4, 0)));
        assert!(LoadOptions::default().contains(at(1, 0)));
    }

    #[test]
    fn dataset_hash_tracks_values() {
        let csv = "time,open,high,low,close,volume\n2024-01-02,1,2,0.5,1.5,10\n";
        let a = BarSeries::from_raw(parse_bars(csv.as_bytes(), &path()).unwrap()).unwrap();
        let csv_b = "time,open,high,low,close,volume\n2024-01-02,1,2,0.5,1.5,11\n";
        let b = BarSeries::from_raw(parse_bars(csv_b.as_bytes(), &path()).unwrap()).unwrap();
        assert_eq!(dataset_hash(&a), dataset_hash(&a.clone()));
        assert_ne!(dataset_hash(&a), dataset_hash(&b));
    }

    #[test]
    fn assemble_left_joins() {
        let csv = "time,open,high,low,close,volume\n\
                   2024-01-02 00:00,1,2,0.5,1.5,10\n\
                   2024-01-02 00:15,1,2,0.5,1.5,11\n";
        let series = BarSeries::from_raw(parse_bars(csv.as_bytes(), &path()).unwrap()).unwrap();
        let ts = series.bars()[1].timestamp;
        let data = assemble(series, &[(ts, Signal::new(Direction::Long, 0.6))]);
        assert_eq!(data.signals.get(0), None);
        assert_eq!(data.signals.get(1).map(|s| s.direction), Some(Direction::Long));
        assert_eq!(data.join.matched, 1);
    }
}
