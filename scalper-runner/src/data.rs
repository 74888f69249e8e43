//! Bar loading — CSV files in, validated one-minute bars out.
//!
//! Expected columns: `timestamp,open,high,low,close,volume`. Timestamps are
//! RFC 3339 or `%Y-%m-%d %H:%M:%S` (read as UTC); `datetime` is accepted as
//! the header of the first column. Rows must arrive in non-decreasing time
//! order; anything else is a load error, never silently re-sorted.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use scalper_core::domain::Bar;
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: timestamp {timestamp} precedes {previous}")]
    NonMonotonic {
        row: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },

    #[error("no bars in {0}")]
    Empty(PathBuf),
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    #[serde(alias = "datetime")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load every bar from a CSV file.
pub fn load_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_bars(file)?;
    if bars.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    info!(
        path = %path.display(),
        bars = bars.len(),
        first = %bars[0].timestamp,
        last = %bars[bars.len() - 1].timestamp,
        "bars loaded"
    );
    Ok(bars)
}

/// Parse bars from any CSV reader.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut bars: Vec<Bar> = Vec::new();
    let mut insane = 0usize;

    for (i, row) in rdr.deserialize::<CsvBar>().enumerate() {
        let row = row?;
        let line = i + 2; // header is line 1
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: line,
            value: row.timestamp.clone(),
        })?;
        if let Some(previous) = bars.last().map(|b| b.timestamp) {
            if timestamp < previous {
                return Err(LoadError::NonMonotonic {
                    row: line,
                    timestamp,
                    previous,
                });
            }
        }
        let bar = Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !bar.is_sane() {
            insane += 1;
        }
        bars.push(bar);
    }

    if insane > 0 {
        warn!(count = insane, "bars failed the OHLC sanity check");
    }
    Ok(bars)
}

/// RFC 3339 first, then the naive `%Y-%m-%d %H:%M:%S` form read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Write bars as CSV with RFC 3339 timestamps.
pub fn write_bars<W: Write>(writer: W, bars: &[Bar]) -> Result<(), LoadError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for b in bars {
        wtr.write_record([
            b.timestamp.to_rfc3339(),
            format!("{:.3}", b.open),
            format!("{:.3}", b.high),
            format!("{:.3}", b.low),
            format!("{:.3}", b.close),
            format!("{:.0}", b.volume),
        ])?;
    }
    wtr.flush().map_err(|e| LoadError::Csv(e.into()))?;
    Ok(())
}

/// Write bars to a file, creating parent directories.
pub fn save_bars(path: &Path, bars: &[Bar]) -> Result<(), LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = std::fs::File::create(path).map_err(io_err)?;
    write_bars(file, bars)
}
