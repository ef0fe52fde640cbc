//! Signal table import/export.
//!
//! One row per signal with the columns in [`SIGNAL_COLUMNS`] order. Missing
//! forward values are empty cells. Floats are written in their shortest
//! round-trip form, so a table read back yields identical signals.

use crate::domain::error::{DataError, ScanError};
use crate::domain::signal::Signal;
use std::path::Path;
use tracing::info;

pub const SIGNAL_COLUMNS: [&str; 18] = [
    "symbol",
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "next_open",
    "next_close",
    "next_day_return",
    "next_open_change_pct",
    "next_intraday_change_pct",
    "day3_close",
    "day3_change_pct",
    "day5_close",
    "day5_change_pct",
    "day10_close",
    "day10_change_pct",
];

fn report_err(path: &Path, e: impl std::fmt::Display) -> ScanError {
    ScanError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

pub fn export_signals(signals: &[Signal], path: &Path) -> Result<(), ScanError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
    if signals.is_empty() {
        wtr.write_record(SIGNAL_COLUMNS)
            .map_err(|e| report_err(path, e))?;
    }
    for signal in signals {
        wtr.serialize(signal).map_err(|e| report_err(path, e))?;
    }
    wtr.flush()?;
    info!(path = %path.display(), signals = signals.len(), "signal table written");
    Ok(())
}

pub fn import_signals(path: &Path) -> Result<Vec<Signal>, DataError> {
    if !path.is_file() {
        return Err(DataError::MissingFile {
            path: path.display().to_string(),
        });
    }
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::Io {
            reason: format!("failed to open {}: {}", path.display(), e),
        })?;

    let headers = rdr.headers().map_err(|e| DataError::Malformed {
        line: 1,
        reason: e.to_string(),
    })?;
    if let Some(missing) = SIGNAL_COLUMNS
        .iter()
        .find(|col| !headers.iter().any(|h| h == **col))
    {
        return Err(DataError::MissingRequiredColumn {
            column: missing.to_string(),
        });
    }

    let mut signals = Vec::new();
    for result in rdr.deserialize::<Signal>() {
        let signal = result.map_err(|e| DataError::Malformed {
            line: e.position().map(|p| p.line() as usize).unwrap_or(0),
            reason: e.to_string(),
        })?;
        signals.push(signal);
    }
    info!(path = %path.display(), signals = signals.len(), "signal table loaded");
    Ok(signals)
}
