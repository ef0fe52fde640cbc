//! CSV series source.
//!
//! Reads `<root>/stock_<symbol>_data/<symbol>_daily_history.csv`, falling
//! back to `<root>/<symbol>.csv`. Columns are located by header name, so
//! their order is free and extra columns are ignored.

use crate::domain::bar::{Bar, MovingAverages, Window};
use crate::domain::error::DataError;
use crate::domain::series::{MIN_HISTORY_BARS, SymbolSeries};
use crate::ports::data_port::SeriesSource;
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DIR_PREFIX: &str = "stock_";
const DIR_SUFFIX: &str = "_data";
const FILE_SUFFIX: &str = "_daily_history.csv";

pub struct CsvSeriesSource {
    root: PathBuf,
}

impl CsvSeriesSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where a symbol's history lives in the nested layout.
    pub fn nested_path(&self, symbol: &str) -> PathBuf {
        self.root
            .join(format!("{DIR_PREFIX}{symbol}{DIR_SUFFIX}"))
            .join(format!("{symbol}{FILE_SUFFIX}"))
    }

    fn flat_path(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("{symbol}.csv"))
    }

    fn resolve(&self, symbol: &str) -> Result<PathBuf, DataError> {
        let nested = self.nested_path(symbol);
        if nested.is_file() {
            return Ok(nested);
        }
        let flat = self.flat_path(symbol);
        if flat.is_file() {
            return Ok(flat);
        }
        Err(DataError::MissingFile {
            path: nested.display().to_string(),
        })
    }
}

/// Column positions for one file.
struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    close_ma: Vec<(Window, usize)>,
    volume_ma: Vec<(Window, usize)>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, DataError> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        let find = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| DataError::MissingRequiredColumn {
                    column: name.to_string(),
                })
        };

        let date = find("datetime").or_else(|_| find("date")).map_err(|_| {
            DataError::MissingRequiredColumn {
                column: "datetime".to_string(),
            }
        })?;

        let mut close_ma = Vec::with_capacity(Window::ALL.len());
        let mut volume_ma = Vec::with_capacity(Window::ALL.len());
        let open = find("open")?;
        let high = find("high")?;
        let low = find("low")?;
        let close = find("close")?;
        let volume = find("volume")?;
        for w in Window::ALL {
            close_ma.push((w, find(&w.close_column())?));
        }
        for w in Window::ALL {
            volume_ma.push((w, find(&w.volume_column())?));
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            close_ma,
            volume_ma,
        })
    }
}

fn line_of(record: &StringRecord) -> usize {
    record.position().map(|p| p.line() as usize).unwrap_or(0)
}

fn cell<'r>(record: &'r StringRecord, idx: usize, line: usize) -> Result<&'r str, DataError> {
    record.get(idx).map(str::trim).ok_or_else(|| DataError::Malformed {
        line,
        reason: format!("missing field {}", idx + 1),
    })
}

/// Accepts `YYYY-MM-DD` with an optional time part.
fn parse_date(raw: &str, line: usize) -> Result<NaiveDate, DataError> {
    let day = raw.split([' ', 'T']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| DataError::Malformed {
        line,
        reason: format!("invalid date '{raw}': {e}"),
    })
}

fn parse_price(raw: &str, name: &str, line: usize) -> Result<f64, DataError> {
    raw.parse::<f64>().map_err(|_| DataError::Malformed {
        line,
        reason: format!("invalid {name} value '{raw}'"),
    })
}

/// Indicator cells may be blank; blanks load as NaN.
fn parse_indicator(raw: &str, name: &str, line: usize) -> Result<f64, DataError> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    parse_price(raw, name, line)
}

fn parse_bar(record: &StringRecord, cols: &Columns) -> Result<Bar, DataError> {
    let line = line_of(record);

    let mut close_ma = MovingAverages::missing();
    for &(w, idx) in &cols.close_ma {
        close_ma.set(w, parse_indicator(cell(record, idx, line)?, &w.close_column(), line)?);
    }
    let mut volume_ma = MovingAverages::missing();
    for &(w, idx) in &cols.volume_ma {
        volume_ma.set(w, parse_indicator(cell(record, idx, line)?, &w.volume_column(), line)?);
    }

    Ok(Bar {
        date: parse_date(cell(record, cols.date, line)?, line)?,
        open: parse_price(cell(record, cols.open, line)?, "open", line)?,
        high: parse_price(cell(record, cols.high, line)?, "high", line)?,
        low: parse_price(cell(record, cols.low, line)?, "low", line)?,
        close: parse_price(cell(record, cols.close, line)?, "close", line)?,
        volume: parse_price(cell(record, cols.volume, line)?, "volume", line)?,
        close_ma,
        volume_ma,
        derived: None,
    })
}

/// Parses one history file into bars sorted by date with duplicates dropped.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, DataError> {
    let shown = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::Io {
            reason: format!("failed to open {shown}: {e}"),
        })?;

    let headers = rdr.headers().map_err(|e| DataError::Malformed {
        line: 1,
        reason: e.to_string(),
    })?;
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(DataError::EmptyFile { path: shown });
    }
    let cols = Columns::locate(headers)?;

    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| DataError::Malformed {
            line: e.position().map(|p| p.line() as usize).unwrap_or(0),
            reason: e.to_string(),
        })?;
        bars.push(parse_bar(&record, &cols)?);
    }
    if bars.is_empty() {
        return Err(DataError::EmptyFile { path: shown });
    }

    bars.sort_by_key(|b| b.date);
    let before = bars.len();
    bars.dedup_by_key(|b| b.date);
    if bars.len() < before {
        debug!(path = %shown, dropped = before - bars.len(), "dropped duplicate dates");
    }
    Ok(bars)
}

impl SeriesSource for CsvSeriesSource {
    fn load(&self, symbol: &str) -> Result<SymbolSeries, DataError> {
        let path = self.resolve(symbol)?;
        let bars = read_bars(&path)?;
        if bars.len() < MIN_HISTORY_BARS {
            return Err(DataError::InsufficientHistory {
                bars: bars.len(),
                minimum: MIN_HISTORY_BARS,
            });
        }
        debug!(symbol, bars = bars.len(), path = %path.display(), "loaded series");
        Ok(SymbolSeries::new(symbol.to_string(), bars))
    }

    fn list_symbols(&self) -> Result<Vec<String>, DataError> {
        let entries = fs::read_dir(&self.root).map_err(|e| DataError::Io {
            reason: format!("failed to read directory {}: {}", self.root.display(), e),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Io {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let path = entry.path();

            if path.is_dir() {
                let symbol = name
                    .strip_prefix(DIR_PREFIX)
                    .and_then(|rest| rest.strip_suffix(DIR_SUFFIX))
                    .filter(|s| !s.is_empty())
                    .filter(|s| path.join(format!("{s}{FILE_SUFFIX}")).is_file());
                if let Some(symbol) = symbol {
                    symbols.push(symbol.to_string());
                }
            } else if let Some(stem) = name.strip_suffix(".csv") {
                if !stem.is_empty() {
                    symbols.push(stem.to_string());
                }
            }
        }

        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}
