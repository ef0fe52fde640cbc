#![allow(dead_code)]

use chrono::NaiveDate;
use sigscan::domain::bar::{Bar, MovingAverages, Window};
use sigscan::domain::error::DataError;
use sigscan::domain::series::SymbolSeries;
use sigscan::ports::data_port::SeriesSource;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct MockSeriesSource {
    pub series: HashMap<String, SymbolSeries>,
    pub errors: HashMap<String, DataError>,
}

impl MockSeriesSource {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.series
            .insert(symbol.to_string(), SymbolSeries::new(symbol.to_string(), bars));
        self
    }

    pub fn with_error(mut self, symbol: &str, error: DataError) -> Self {
        self.errors.insert(symbol.to_string(), error);
        self
    }
}

impl SeriesSource for MockSeriesSource {
    fn load(&self, symbol: &str) -> Result<SymbolSeries, DataError> {
        if let Some(err) = self.errors.get(symbol) {
            return Err(err.clone());
        }
        self.series
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::MissingFile {
                path: format!("{symbol}.csv"),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, DataError> {
        let mut symbols: Vec<String> = self
            .series
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub const START: (i32, u32, u32) = (2023, 1, 2);

pub fn start_date() -> NaiveDate {
    date(START.0, START.1, START.2)
}

fn averages(value: f64) -> MovingAverages {
    MovingAverages {
        ma5: value,
        ma10: value,
        ma20: value,
        ma30: value,
        ma60: value,
    }
}

/// A quiet uptrend that satisfies every standard condition except the
/// breakout, plus a breakout bar at each index in `signal_at`.
///
/// Regular bars close exactly on their rising averages and close below
/// their open, so they can never break out. Breakout bars close well above
/// the preceding highs. Keep breakout indices at least four apart.
pub fn scenario_bars(len: usize, signal_at: &[usize]) -> Vec<Bar> {
    (0..len)
        .map(|i| {
            let base = 10.0 + 0.01 * i as f64;
            let (open, high, low, close) = if signal_at.contains(&i) {
                (base + 0.15, base + 0.65, base + 0.05, base + 0.55)
            } else {
                (base + 0.05, base + 0.15, base - 0.1, base)
            };
            Bar {
                date: start_date() + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
                close_ma: averages(base),
                volume_ma: averages(1000.0),
                derived: None,
            }
        })
        .collect()
}

pub fn scenario_series(symbol: &str, len: usize, signal_at: &[usize]) -> SymbolSeries {
    SymbolSeries::new(symbol.to_string(), scenario_bars(len, signal_at))
}

fn cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn header(skip: Option<&str>) -> Vec<String> {
    let mut columns: Vec<String> = ["datetime", "open", "high", "low", "close", "volume"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    columns.extend(Window::ALL.iter().map(|w| w.close_column()));
    columns.extend(Window::ALL.iter().map(|w| w.volume_column()));
    columns.retain(|c| Some(c.as_str()) != skip);
    columns
}

/// Renders bars in the history file format, optionally without one column.
pub fn history_csv(bars: &[Bar], skip_column: Option<&str>) -> String {
    let columns = header(skip_column);
    let mut out = columns.join(",") + "\n";
    for bar in bars {
        let mut values: Vec<(String, String)> = vec![
            ("datetime".into(), bar.date.to_string()),
            ("open".into(), cell(bar.open)),
            ("high".into(), cell(bar.high)),
            ("low".into(), cell(bar.low)),
            ("close".into(), cell(bar.close)),
            ("volume".into(), cell(bar.volume)),
        ];
        for w in Window::ALL {
            values.push((w.close_column(), cell(bar.close_ma.get(w))));
        }
        for w in Window::ALL {
            values.push((w.volume_column(), cell(bar.volume_ma.get(w))));
        }
        let row: Vec<String> = values
            .into_iter()
            .filter(|(name, _)| columns.contains(name))
            .map(|(_, v)| v)
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Writes `<root>/stock_<symbol>_data/<symbol>_daily_history.csv`.
pub fn write_history(root: &Path, symbol: &str, bars: &[Bar], skip_column: Option<&str>) -> PathBuf {
    let dir = root.join(format!("stock_{symbol}_data"));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{symbol}_daily_history.csv"));
    fs::write(&path, history_csv(bars, skip_column)).unwrap();
    path
}
