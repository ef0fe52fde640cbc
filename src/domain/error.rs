//! Domain error types.

use crate::domain::universe::UniverseError;

/// Per-symbol data problems. Always recoverable at symbol granularity: the
/// symbol is skipped and the batch carries on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("data file not found: {path}")]
    MissingFile { path: String },

    #[error("data file is empty: {path}")]
    EmptyFile { path: String },

    #[error("missing required column: {column}")]
    MissingRequiredColumn { column: String },

    #[error("insufficient history: have {bars} bars, need {minimum}")]
    InsufficientHistory { bars: usize, minimum: usize },

    #[error("inconsistent OHLC data: {invalid} of {total} recent bars have non-positive prices")]
    InconsistentOhlc { invalid: usize, total: usize },

    #[error("irregular dates: {gaps} of {total} recent gaps exceed 30 days")]
    IrregularDates { gaps: usize, total: usize },

    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("i/o error: {reason}")]
    Io { reason: String },
}

/// Fatal problems setting up or running the worker pool. A batch that hits
/// one of these produces no report at all.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestrationError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("failed to spawn worker: {reason}")]
    WorkerSpawn { reason: String },

    #[error("failed to open worker log {path}: {reason}")]
    WorkerLog { path: String, reason: String },
}

/// Top-level error type for sigscan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error("no bar dated {date} for {symbol}")]
    DateNotFound { symbol: String, date: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ScanError> for std::process::ExitCode {
    fn from(err: &ScanError) -> Self {
        let code: u8 = match err {
            ScanError::Io(_) | ScanError::Report { .. } => 1,
            ScanError::ConfigParse { .. }
            | ScanError::ConfigMissing { .. }
            | ScanError::ConfigInvalid { .. }
            | ScanError::Universe(_) => 2,
            ScanError::Orchestration(_) => 3,
            ScanError::Data(_) | ScanError::DateNotFound { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
