//! Everything a finished run reports, independent of the output format.

use crate::domain::analyzer::{self, SignalSummary};
use crate::domain::orchestrator::BatchOutcome;
use crate::domain::portfolio::{self, PortfolioReport};
use crate::domain::signal::{Horizon, Signal};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Single,
    Batch,
    All,
    Analyze,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Single => "single",
            ScanMode::Batch => "batch",
            ScanMode::All => "all",
            ScanMode::Analyze => "analyze",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub symbol: String,
    pub reason: String,
}

/// Bookkeeping of a multi-symbol scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub requested: usize,
    pub scanned: usize,
    pub skipped: Vec<SkippedEntry>,
    pub cancelled: bool,
    pub missing_results: usize,
    pub abandoned_workers: usize,
    pub elapsed_secs: f64,
}

impl From<&BatchOutcome> for RunStats {
    fn from(outcome: &BatchOutcome) -> Self {
        Self {
            requested: outcome.requested,
            scanned: outcome.scanned,
            skipped: outcome
                .skipped
                .iter()
                .map(|s| SkippedEntry {
                    symbol: s.symbol.clone(),
                    reason: s.reason.to_string(),
                })
                .collect(),
            cancelled: outcome.cancelled,
            missing_results: outcome.missing_results,
            abandoned_workers: outcome.abandoned_workers,
            elapsed_secs: outcome.elapsed.as_secs_f64(),
        }
    }
}

/// Knobs for [`ScanReport::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub initial_capital: f64,
    pub position_size: f64,
    pub top_n: usize,
    /// Drop locked gap-ups above this next-open gap before analysis.
    pub gap_up_filter: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub mode: ScanMode,
    pub generated_at: String,
    pub strategy: String,
    pub run: Option<RunStats>,
    pub gap_up_filtered: usize,
    pub summary: SignalSummary,
    pub top_signals: Vec<Signal>,
    pub portfolio: PortfolioReport,
}

impl ScanReport {
    pub fn build(
        mode: ScanMode,
        signals: &[Signal],
        strategy: String,
        run: Option<RunStats>,
        settings: &ReportSettings,
    ) -> Self {
        let (analysed, gap_up_filtered) = match settings.gap_up_filter {
            Some(threshold) => analyzer::filter_flat_gap_ups(signals, threshold),
            None => (signals.to_vec(), 0),
        };

        Self {
            mode,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            strategy,
            run,
            gap_up_filtered,
            summary: analyzer::analyze(&analysed, settings.top_n),
            top_signals: analyzer::top_signals(&analysed, settings.top_n, Horizon::Day1),
            portfolio: portfolio::simulate_portfolio(
                &analysed,
                settings.initial_capital,
                settings.position_size,
            ),
        }
    }
}

/// `<mode>_report_<timestamp>.<ext>`
pub fn report_file_name(mode: ScanMode, timestamp: &str, extension: &str) -> String {
    format!("{mode}_report_{timestamp}.{extension}")
}

/// `<mode>_signals_<timestamp>.csv`
pub fn signals_file_name(mode: ScanMode, timestamp: &str) -> String {
    format!("{mode}_signals_{timestamp}.csv")
}

/// Local time stamp used in output file names.
pub fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
