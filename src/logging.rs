//! Logging initialization.
//!
//! - Text: human-readable lines on stderr, colored when attached to a terminal
//! - Json: structured lines for log aggregation
//!
//! Workers of a batch scan get their own [`Dispatch`] from
//! [`worker_dispatch`], so their output never interleaves with the process
//! log or with each other.

use crate::domain::error::OrchestrationError;
use std::fs::File;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(format: LogFormat, default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

/// Path of the log file for one worker.
pub fn worker_log_path(log_dir: &Path, worker_id: usize) -> PathBuf {
    log_dir.join(format!("worker_{worker_id}.log"))
}

/// Builds the isolated dispatcher for one worker thread.
///
/// With a log directory the worker writes to `worker_<id>.log` inside it;
/// without one its events are discarded.
pub fn worker_dispatch(
    worker_id: usize,
    log_dir: Option<&Path>,
) -> Result<Dispatch, OrchestrationError> {
    let Some(dir) = log_dir else {
        return Ok(Dispatch::none());
    };

    let path = worker_log_path(dir, worker_id);
    let log_err = |e: std::io::Error| OrchestrationError::WorkerLog {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    std::fs::create_dir_all(dir).map_err(log_err)?;
    let file = File::create(&path).map_err(log_err)?;

    let subscriber = fmt::Subscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(Mutex::new(file))
        .finish();

    Ok(Dispatch::new(subscriber))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_log_goes_to_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let dispatch = worker_dispatch(3, Some(dir.path())).unwrap();

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!(symbol = "600000", "scanned");
        });

        let text = std::fs::read_to_string(dir.path().join("worker_3.log")).unwrap();
        assert!(text.contains("scanned"));
        assert!(text.contains("600000"));
    }

    #[test]
    fn missing_log_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("run1");
        worker_dispatch(0, Some(&nested)).unwrap();
        assert!(nested.join("worker_0.log").exists());
    }

    #[test]
    fn no_log_dir_discards() {
        let dispatch = worker_dispatch(1, None).unwrap();
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("dropped");
        });
    }

    #[test]
    fn unwritable_log_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();

        let err = worker_dispatch(0, Some(&file)).unwrap_err();
        assert!(matches!(err, OrchestrationError::WorkerLog { .. }));
    }

    #[test]
    fn init_twice_is_harmless() {
        init_logging(LogFormat::Text, "warn");
        init_logging(LogFormat::Json, "warn");
    }
}
