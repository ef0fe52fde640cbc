//! Resolved run parameters for a scan.

use crate::domain::config_validation::{read_date, read_float, read_int};
use crate::domain::error::ScanError;
use crate::domain::orchestrator::ScanOptions;
use crate::domain::report::ReportSettings;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_POSITION_SIZE: f64 = 0.1;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub data_root: Option<PathBuf>,
    pub workers: usize,
    pub limit: Option<usize>,
    pub options: ScanOptions,
    pub initial_capital: f64,
    pub position_size: f64,
    pub output_dir: PathBuf,
    pub top_n: usize,
    pub format: ReportFormat,
    pub save_signals: bool,
    /// Next-open gap (percent) above which flat next sessions are dropped
    /// before analysis. `None` keeps every signal.
    pub gap_up_filter: Option<f64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            workers: DEFAULT_WORKERS,
            limit: None,
            options: ScanOptions::default(),
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            position_size: DEFAULT_POSITION_SIZE,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            top_n: DEFAULT_TOP_N,
            format: ReportFormat::Text,
            save_signals: true,
            gap_up_filter: None,
        }
    }
}

fn millis(value: Option<i64>, default: Duration) -> Duration {
    value
        .map(|ms| Duration::from_millis(ms.max(0) as u64))
        .unwrap_or(default)
}

fn path(config: &dyn ConfigPort, section: &str, key: &str) -> Option<PathBuf> {
    config.get_value(section, key).map(PathBuf::from)
}

impl ScanConfig {
    /// Reads every known key, falling back to defaults for absent ones.
    /// Run `validate_scan_config` first for range checks.
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, ScanError> {
        let defaults = Self::default();
        let default_options = ScanOptions::default();

        let options = ScanOptions {
            start_date: read_date(config, "scan", "start_date")?,
            end_date: read_date(config, "scan", "end_date")?,
            pop_timeout: millis(
                read_int(config, "scan", "pop_timeout_ms")?,
                default_options.pop_timeout,
            ),
            result_grace: millis(
                read_int(config, "scan", "result_grace_ms")?,
                default_options.result_grace,
            ),
            shutdown_grace: millis(
                read_int(config, "scan", "shutdown_grace_ms")?,
                default_options.shutdown_grace,
            ),
            log_dir: path(config, "scan", "log_dir"),
        };

        let format = match config.get_value("report", "format") {
            Some(s) => s.parse().map_err(|reason| ScanError::ConfigInvalid {
                section: "report".to_string(),
                key: "format".to_string(),
                reason,
            })?,
            None => defaults.format,
        };

        Ok(Self {
            data_root: path(config, "data", "root"),
            workers: read_int(config, "scan", "workers")?
                .map(|n| n.max(0) as usize)
                .unwrap_or(defaults.workers),
            limit: read_int(config, "scan", "limit")?.map(|n| n.max(0) as usize),
            options,
            initial_capital: read_float(config, "portfolio", "initial_capital")?
                .unwrap_or(defaults.initial_capital),
            position_size: read_float(config, "portfolio", "position_size")?
                .unwrap_or(defaults.position_size),
            output_dir: path(config, "report", "output_dir").unwrap_or(defaults.output_dir),
            top_n: read_int(config, "report", "top_n")?
                .map(|n| n.max(0) as usize)
                .unwrap_or(defaults.top_n),
            format,
            save_signals: config.get_bool("report", "save_signals", defaults.save_signals),
            gap_up_filter: read_float(config, "report", "gap_up_filter")?,
        })
    }

    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            initial_capital: self.initial_capital,
            position_size: self.position_size,
            top_n: self.top_n,
            gap_up_filter: self.gap_up_filter,
        }
    }

    /// Range checks on the resolved values, after command-line overrides.
    /// A zero worker count is rejected by the orchestrator, not here.
    pub fn validate(&self) -> Result<(), ScanError> {
        let invalid = |section: &str, key: &str, reason: &str| ScanError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if self.limit == Some(0) {
            return Err(invalid("scan", "limit", "limit must be at least 1"));
        }
        if let (Some(start), Some(end)) = (self.options.start_date, self.options.end_date) {
            if start > end {
                return Err(invalid("scan", "start_date", "start_date must not be after end_date"));
            }
        }
        if self.initial_capital.is_nan() || self.initial_capital <= 0.0 {
            return Err(invalid("portfolio", "initial_capital", "initial_capital must be positive"));
        }
        if self.position_size.is_nan() || self.position_size <= 0.0 || self.position_size > 1.0 {
            return Err(invalid("portfolio", "position_size", "position_size must be in (0, 1]"));
        }
        if self.top_n == 0 {
            return Err(invalid("report", "top_n", "top_n must be at least 1"));
        }
        if self.gap_up_filter.is_some_and(|g| g.is_nan() || g < 0.0) {
            return Err(invalid("report", "gap_up_filter", "gap_up_filter must be non-negative"));
        }
        Ok(())
    }
}
