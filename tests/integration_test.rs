//! End-to-end tests for the scan pipeline.
//!
//! Tests cover:
//! - Standard strategy on synthetic series (single signal placement)
//! - CSV data root through the orchestrator (skips, worker counts)
//! - Portfolio simulation scenario
//! - Signal table export, re-import and analysis

mod common;

use approx::assert_relative_eq;
use common::*;
use sigscan::adapters::csv_adapter::CsvSeriesSource;
use sigscan::adapters::signal_csv::{export_signals, import_signals};
use sigscan::domain::analyzer::analyze;
use sigscan::domain::error::DataError;
use sigscan::domain::orchestrator::{Orchestrator, ScanOptions, SkipReason};
use sigscan::domain::portfolio::simulate_portfolio;
use sigscan::domain::scanner::Scanner;
use sigscan::domain::series::MIN_HISTORY_BARS;
use sigscan::domain::signal::Signal;
use sigscan::ports::data_port::SeriesSource;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fast_options() -> ScanOptions {
    ScanOptions {
        pop_timeout: Duration::from_millis(100),
        result_grace: Duration::from_millis(1000),
        shutdown_grace: Duration::from_millis(1000),
        ..ScanOptions::default()
    }
}

fn csv_orchestrator(root: &TempDir) -> Orchestrator {
    Orchestrator::new(
        Arc::new(CsvSeriesSource::new(root.path())),
        Scanner::default(),
        fast_options(),
    )
}

mod standard_strategy {
    use super::*;

    #[test]
    fn single_breakout_yields_one_signal() {
        let series = scenario_series("600000", 60, &[45]);
        let signals = Scanner::default().scan(&series);

        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.symbol, "600000");
        assert_eq!(s.date, series.bars[45].date);
        assert_eq!(s.close, series.bars[45].close);
        assert_eq!(s.next_close, Some(series.bars[46].close));
        assert_eq!(s.day10_close, Some(series.bars[55].close));
        assert!(s.next_day_return.is_some());
        assert!(s.day3_change_pct.is_some());
        assert!(s.day5_change_pct.is_some());
        assert!(s.day10_change_pct.is_some());
    }

    #[test]
    fn quiet_trend_yields_nothing() {
        assert!(Scanner::default().scan(&scenario_series("X", 60, &[])).is_empty());
    }

    #[test]
    fn late_breakout_has_partial_forward_fields() {
        let series = scenario_series("X", 60, &[57]);
        let signals = Scanner::default().scan(&series);
        assert_eq!(signals.len(), 1);
        assert!(signals[0].next_day_return.is_some());
        assert!(signals[0].day3_change_pct.is_none());
        assert!(signals[0].day10_close.is_none());
    }

    #[test]
    fn trace_explains_each_condition() {
        let source = MockSeriesSource::new().with_bars("X", scenario_bars(60, &[45]));
        let orch = Orchestrator::new(Arc::new(source), Scanner::default(), fast_options());

        let hit = orch.trace_single("X", Some(start_date() + chrono::Duration::days(45))).unwrap();
        assert!(hit.passed);
        assert_eq!(hit.outcomes.len(), 5);
        assert!(hit.outcomes.iter().all(|o| o.passed));

        let miss = orch.trace_single("X", Some(start_date() + chrono::Duration::days(44))).unwrap();
        assert!(!miss.passed);
        let failed: Vec<usize> = miss
            .outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.position)
            .collect();
        assert_eq!(failed, vec![4]);
    }
}

mod csv_pipeline {
    use super::*;

    #[test]
    fn single_symbol_from_disk() {
        let root = TempDir::new().unwrap();
        write_history(root.path(), "600000", &scenario_bars(60, &[45]), None);

        let signals = csv_orchestrator(&root).test_single("600000").unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].date, start_date() + chrono::Duration::days(45));
    }

    #[test]
    fn short_history_is_rejected_and_skipped() {
        let root = TempDir::new().unwrap();
        write_history(root.path(), "000001", &scenario_bars(40, &[20]), None);
        write_history(root.path(), "000002", &scenario_bars(60, &[20]), None);

        let source = CsvSeriesSource::new(root.path());
        assert_eq!(
            source.load("000001").unwrap_err(),
            DataError::InsufficientHistory {
                bars: 40,
                minimum: MIN_HISTORY_BARS
            }
        );

        let outcome = csv_orchestrator(&root).test_all(2, None).unwrap();
        assert_eq!(outcome.requested, 2);
        assert_eq!(outcome.scanned, 1);
        assert_eq!(outcome.signals.len(), 1);
        assert_eq!(outcome.skipped[0].symbol, "000001");
    }

    #[test]
    fn missing_average_column_skips_only_that_symbol() {
        let root = TempDir::new().unwrap();
        let symbols: Vec<String> = (1..=10).map(|i| format!("{i:06}")).collect();
        for (i, symbol) in symbols.iter().enumerate() {
            let skip = if i == 6 { Some("volume_60d_avg") } else { None };
            write_history(root.path(), symbol, &scenario_bars(60, &[45]), skip);
        }

        let outcome = csv_orchestrator(&root).test_batch(&symbols, 4).unwrap();
        assert_eq!(outcome.requested, 10);
        assert_eq!(outcome.scanned, 9);
        assert_eq!(outcome.signals.len(), 9);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].symbol, "000007");
        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::Data(DataError::MissingRequiredColumn {
                column: "volume_60d_avg".into()
            })
        );
        assert_eq!(outcome.missing_results, 0);
        assert_eq!(outcome.abandoned_workers, 0);
    }

    #[test]
    fn worker_count_does_not_change_signals() {
        let root = TempDir::new().unwrap();
        let mut symbols = Vec::new();
        for i in 0..8usize {
            let symbol = format!("30{i:04}");
            let hits = [15 + i, 30 + i, 50];
            write_history(root.path(), &symbol, &scenario_bars(70, &hits), None);
            symbols.push(symbol);
        }

        let orch = csv_orchestrator(&root);
        let one = orch.test_batch(&symbols, 1).unwrap();
        let many = orch.test_batch(&symbols, 6).unwrap();

        assert_eq!(one.signals.len(), 24);
        assert_eq!(one.signals, many.signals);
        assert!(one.signals.windows(2).all(|w| {
            (w[0].date, w[0].symbol.as_str()) <= (w[1].date, w[1].symbol.as_str())
        }));
    }

    #[test]
    fn date_filter_applies_before_scanning() {
        let root = TempDir::new().unwrap();
        write_history(root.path(), "X", &scenario_bars(120, &[30, 100]), None);

        let mut options = fast_options();
        options.start_date = Some(start_date() + chrono::Duration::days(50));
        let orch = Orchestrator::new(
            Arc::new(CsvSeriesSource::new(root.path())),
            Scanner::default(),
            options,
        );
        let signals = orch.test_single("X").unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].date, start_date() + chrono::Duration::days(100));
    }

    #[test]
    fn empty_data_root_is_an_empty_outcome() {
        let root = TempDir::new().unwrap();
        let outcome = csv_orchestrator(&root).test_all(3, None).unwrap();
        assert_eq!(outcome.requested, 0);
        assert!(outcome.signals.is_empty());
    }
}

mod portfolio {
    use super::*;

    fn with_return(symbol: &str, day: u32, ret: f64) -> Signal {
        let series = scenario_series(symbol, 60, &[45]);
        let mut s = Scanner::default().scan(&series).remove(0);
        s.date = date(2024, 3, day);
        s.next_day_return = Some(ret);
        s
    }

    #[test]
    fn two_trades_compound() {
        let signals = vec![with_return("A", 4, 10.0), with_return("B", 5, -5.0)];
        let report = simulate_portfolio(&signals, 100_000.0, 0.1);
        assert_relative_eq!(report.final_capital, 100_495.0, epsilon = 1e-6);
        assert_relative_eq!(report.win_rate, 0.5);
        assert_eq!(report.total_trades, 2);
    }
}

mod signal_table {
    use super::*;

    #[test]
    fn export_import_analyze_matches() {
        let source = MockSeriesSource::new()
            .with_bars("600000", scenario_bars(80, &[20, 45, 60]))
            .with_bars("000001", scenario_bars(80, &[25, 72]))
            .with_bars("300750", scenario_bars(80, &[45]));
        let orch = Orchestrator::new(Arc::new(source), Scanner::default(), fast_options());
        let outcome = orch.test_all(3, None).unwrap();
        assert_eq!(outcome.signals.len(), 6);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_signals.csv");
        export_signals(&outcome.signals, &path).unwrap();
        let reloaded = import_signals(&path).unwrap();

        assert_eq!(reloaded, outcome.signals);
        assert_eq!(analyze(&reloaded, 10), analyze(&outcome.signals, 10));
        assert_eq!(
            simulate_portfolio(&reloaded, 100_000.0, 0.1),
            simulate_portfolio(&outcome.signals, 100_000.0, 0.1)
        );
    }
}
