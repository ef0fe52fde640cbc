//! Configuration validation.
//!
//! Validates every config field before a scan runs. All keys are optional;
//! a key that is present must parse and be in range.

use crate::domain::error::ScanError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), ScanError> {
    validate_data_root(config)?;
    validate_workers(config)?;
    validate_limit(config)?;
    validate_dates(config)?;
    validate_timeouts(config)?;
    validate_portfolio(config)?;
    validate_report(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ScanError {
    ScanError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, ScanError> {
    config
        .get_value(section, key)
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| invalid(section, key, format!("'{s}' is not an integer")))
        })
        .transpose()
}

pub(crate) fn read_float(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, ScanError> {
    config
        .get_value(section, key)
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(section, key, format!("'{s}' is not a number")))
        })
        .transpose()
}

pub(crate) fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, ScanError> {
    config
        .get_value(section, key)
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
                invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD"))
            })
        })
        .transpose()
}

fn validate_data_root(config: &dyn ConfigPort) -> Result<(), ScanError> {
    match config.get_string("data", "root") {
        Some(s) if s.trim().is_empty() => Err(ScanError::ConfigMissing {
            section: "data".to_string(),
            key: "root".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Zero is left to the orchestrator, which owns the worker pool.
fn validate_workers(config: &dyn ConfigPort) -> Result<(), ScanError> {
    match read_int(config, "scan", "workers")? {
        Some(n) if n < 0 => Err(invalid("scan", "workers", "workers must not be negative")),
        _ => Ok(()),
    }
}

fn validate_limit(config: &dyn ConfigPort) -> Result<(), ScanError> {
    match read_int(config, "scan", "limit")? {
        Some(n) if n < 1 => Err(invalid("scan", "limit", "limit must be at least 1")),
        _ => Ok(()),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), ScanError> {
    let start = read_date(config, "scan", "start_date")?;
    let end = read_date(config, "scan", "end_date")?;
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(invalid(
            "scan",
            "start_date",
            "start_date must not be after end_date",
        )),
        _ => Ok(()),
    }
}

fn validate_timeouts(config: &dyn ConfigPort) -> Result<(), ScanError> {
    if matches!(read_int(config, "scan", "pop_timeout_ms")?, Some(ms) if ms < 1) {
        return Err(invalid("scan", "pop_timeout_ms", "pop_timeout_ms must be positive"));
    }
    for key in ["result_grace_ms", "shutdown_grace_ms"] {
        if matches!(read_int(config, "scan", key)?, Some(ms) if ms < 0) {
            return Err(invalid("scan", key, format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_portfolio(config: &dyn ConfigPort) -> Result<(), ScanError> {
    if matches!(read_float(config, "portfolio", "initial_capital")?, Some(c) if c <= 0.0) {
        return Err(invalid(
            "portfolio",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if matches!(
        read_float(config, "portfolio", "position_size")?,
        Some(size) if size <= 0.0 || size > 1.0
    ) {
        return Err(invalid(
            "portfolio",
            "position_size",
            "position_size must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_report(config: &dyn ConfigPort) -> Result<(), ScanError> {
    if matches!(read_int(config, "report", "top_n")?, Some(n) if n < 1) {
        return Err(invalid("report", "top_n", "top_n must be at least 1"));
    }
    if matches!(read_float(config, "report", "gap_up_filter")?, Some(g) if g < 0.0) {
        return Err(invalid(
            "report",
            "gap_up_filter",
            "gap_up_filter must be non-negative",
        ));
    }
    match config.get_value("report", "format") {
        Some(format) if !matches!(format.to_lowercase().as_str(), "text" | "json") => Err(invalid(
            "report",
            "format",
            format!("unknown format '{format}', expected text or json"),
        )),
        _ => Ok(()),
    }
}
