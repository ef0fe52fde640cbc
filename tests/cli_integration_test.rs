//! CLI integration tests.
//!
//! Tests cover:
//! - Config resolution with real INI files on disk
//! - Each subcommand end to end against a temporary data root
//! - Exit codes for config, universe, orchestration and data errors

mod common;

use clap::Parser;
use common::*;
use sigscan::adapters::signal_csv::import_signals;
use sigscan::cli::{self, Cli};
use sigscan::domain::scan_config::ReportFormat;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ExitCode has no PartialEq; compare the debug form.
fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

fn run(args: &[&str]) -> ExitCode {
    let cli = Cli::try_parse_from(std::iter::once("sigscan").chain(args.iter().copied())).unwrap();
    cli::run(cli)
}

fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect();
    files.sort();
    files
}

/// Data root with two scannable symbols and one short history.
fn data_root() -> TempDir {
    let root = TempDir::new().unwrap();
    write_history(root.path(), "600000", &scenario_bars(60, &[45]), None);
    write_history(root.path(), "000001", &scenario_bars(60, &[20, 40]), None);
    write_history(root.path(), "300750", &scenario_bars(30, &[20]), None);
    root
}

mod config_loading {
    use super::*;

    const VALID_INI: &str = r#"
[data]
root = /srv/market

[scan]
workers = 6
start_date = 2023-01-01
end_date = 2023-12-31

[portfolio]
initial_capital = 50000
position_size = 0.2

[report]
format = json
top_n = 5
"#;

    #[test]
    fn build_scan_config_from_file() {
        let ini = write_temp_ini(VALID_INI);
        let cli = Cli::try_parse_from(["sigscan", "--config", ini.path().to_str().unwrap(), "describe"])
            .unwrap();
        let config = cli::build_scan_config(&cli).unwrap();

        assert_eq!(config.data_root, Some(PathBuf::from("/srv/market")));
        assert_eq!(config.workers, 6);
        assert_eq!(config.options.start_date, Some(date(2023, 1, 1)));
        assert_eq!(config.initial_capital, 50_000.0);
        assert_eq!(config.format, ReportFormat::Json);
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn invalid_config_exits_with_config_code() {
        let ini = write_temp_ini("[portfolio]\nposition_size = 2\n");
        let code = run(&["--config", ini.path().to_str().unwrap(), "list-symbols"]);
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn missing_config_file_exits_with_config_code() {
        let code = run(&["--config", "/nonexistent/sigscan.ini", "list-symbols"]);
        assert!(same_code(code, ExitCode::from(2)));
    }
}

mod commands {
    use super::*;

    #[test]
    fn describe_succeeds_without_config() {
        assert!(same_code(run(&["describe"]), ExitCode::SUCCESS));
    }

    #[test]
    fn list_symbols_needs_a_data_root() {
        assert!(same_code(run(&["list-symbols"]), ExitCode::from(2)));
        let root = data_root();
        assert!(same_code(
            run(&["--data-root", root.path().to_str().unwrap(), "list-symbols"]),
            ExitCode::SUCCESS
        ));
    }

    #[test]
    fn single_writes_signals_and_report() {
        let root = data_root();
        let out = TempDir::new().unwrap();
        let code = run(&[
            "--data-root",
            root.path().to_str().unwrap(),
            "--output-dir",
            out.path().to_str().unwrap(),
            "single",
            "600000",
        ]);
        assert!(same_code(code, ExitCode::SUCCESS));

        let tables = files_with_prefix(out.path(), "single_signals_");
        assert_eq!(tables.len(), 1);
        let signals = import_signals(&tables[0]).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol, "600000");

        let reports = files_with_prefix(out.path(), "single_report_");
        assert_eq!(reports.len(), 1);
        assert!(reports[0].extension().is_some_and(|e| e == "txt"));
        let text = fs::read_to_string(&reports[0]).unwrap();
        assert!(text.contains("Total signals:        1"));
    }

    #[test]
    fn single_with_short_history_is_a_data_error() {
        let root = data_root();
        let out = TempDir::new().unwrap();
        let code = run(&[
            "--data-root",
            root.path().to_str().unwrap(),
            "--output-dir",
            out.path().to_str().unwrap(),
            "single",
            "300750",
        ]);
        assert!(same_code(code, ExitCode::from(5)));
    }

    #[test]
    fn single_trace_prints_without_writing() {
        let root = data_root();
        let out = TempDir::new().unwrap();
        let code = run(&[
            "--data-root",
            root.path().to_str().unwrap(),
            "--output-dir",
            out.path().to_str().unwrap(),
            "single",
            "600000",
            "--trace",
            "--date",
            "2023-02-16",
        ]);
        assert!(same_code(code, ExitCode::SUCCESS));
        assert!(files_with_prefix(out.path(), "single_").is_empty());
    }

    #[test]
    fn batch_skips_bad_symbols_and_writes_json() {
        let root = data_root();
        let out = TempDir::new().unwrap();
        let code = run(&[
            "--data-root",
            root.path().to_str().unwrap(),
            "--output-dir",
            out.path().to_str().unwrap(),
            "--format",
            "json",
            "--workers",
            "2",
            "batch",
            "600000,1",
            "300750",
        ]);
        assert!(same_code(code, ExitCode::SUCCESS));

        let reports = files_with_prefix(out.path(), "batch_report_");
        assert_eq!(reports.len(), 1);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&reports[0]).unwrap()).unwrap();
        assert_eq!(value["mode"], "batch");
        assert_eq!(value["run"]["requested"], 3);
        assert_eq!(value["run"]["scanned"], 2);
        assert_eq!(value["run"]["skipped"][0]["symbol"], "300750");
        assert_eq!(value["summary"]["total_signals"], 3);
    }

    #[test]
    fn batch_with_duplicate_codes_is_rejected() {
        let root = data_root();
        let code = run(&["--data-root", root.path().to_str().unwrap(), "batch", "1", "000001"]);
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn all_respects_limit_and_skips_table() {
        let root = data_root();
        let out = TempDir::new().unwrap();
        let code = run(&[
            "--data-root",
            root.path().to_str().unwrap(),
            "--output-dir",
            out.path().to_str().unwrap(),
            "--no-save-signals",
            "all",
            "--limit",
            "1",
        ]);
        assert!(same_code(code, ExitCode::SUCCESS));
        assert!(files_with_prefix(out.path(), "all_signals_").is_empty());

        let reports = files_with_prefix(out.path(), "all_report_");
        let text = fs::read_to_string(&reports[0]).unwrap();
        assert!(text.contains("Symbols requested:    1"));
        // "000001" sorts first and has two breakouts.
        assert!(text.contains("Total signals:        2"));
    }

    #[test]
    fn zero_workers_is_an_orchestration_error() {
        let root = data_root();
        let out = TempDir::new().unwrap();
        let code = run(&[
            "--data-root",
            root.path().to_str().unwrap(),
            "--output-dir",
            out.path().to_str().unwrap(),
            "--workers",
            "0",
            "all",
        ]);
        assert!(same_code(code, ExitCode::from(3)));
        // No partial report.
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn analyze_reads_exported_table() {
        let root = data_root();
        let out = TempDir::new().unwrap();
        let root_arg = root.path().to_str().unwrap();
        let out_arg = out.path().to_str().unwrap();
        assert!(same_code(
            run(&["--data-root", root_arg, "--output-dir", out_arg, "all"]),
            ExitCode::SUCCESS
        ));
        let table = files_with_prefix(out.path(), "all_signals_").remove(0);

        let analysis = TempDir::new().unwrap();
        let code = run(&[
            "--output-dir",
            analysis.path().to_str().unwrap(),
            "--end-date",
            "2023-01-31",
            "analyze",
            table.to_str().unwrap(),
        ]);
        assert!(same_code(code, ExitCode::SUCCESS));

        assert!(files_with_prefix(analysis.path(), "analyze_signals_").is_empty());
        let report = files_with_prefix(analysis.path(), "analyze_report_").remove(0);
        let text = fs::read_to_string(report).unwrap();
        // Only the breakout at index 20 falls in January.
        assert!(text.contains("Total signals:        1"));
    }

    #[test]
    fn analyze_missing_table_is_a_data_error() {
        let out = TempDir::new().unwrap();
        let code = run(&[
            "--output-dir",
            out.path().to_str().unwrap(),
            "analyze",
            "/nonexistent/signals.csv",
        ]);
        assert!(same_code(code, ExitCode::from(5)));
    }
}
