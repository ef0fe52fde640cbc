//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use crate::adapters::csv_adapter::CsvSeriesSource;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report::JsonReportAdapter;
use crate::adapters::signal_csv::{export_signals, import_signals};
use crate::adapters::text_report::TextReportAdapter;
use crate::domain::analyzer::filter_by_date;
use crate::domain::condition::ConditionSet;
use crate::domain::config_validation::validate_scan_config;
use crate::domain::error::ScanError;
use crate::domain::orchestrator::Orchestrator;
use crate::domain::report::{
    RunStats, ScanMode, ScanReport, file_timestamp, report_file_name, signals_file_name,
};
use crate::domain::scan_config::{ReportFormat, ScanConfig};
use crate::domain::scanner::Scanner;
use crate::domain::signal::Signal;
use crate::domain::universe::{normalize_code, parse_codes};
use crate::logging::{LogFormat, init_logging};
use crate::ports::data_port::SeriesSource;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "sigscan",
    version,
    about = "Parallel technical-signal scanner and backtester"
)]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory holding the per-symbol history files
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,
    #[arg(long, global = true)]
    pub start_date: Option<NaiveDate>,
    #[arg(long, global = true)]
    pub end_date: Option<NaiveDate>,
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,
    #[arg(long, global = true, value_enum)]
    pub format: Option<ReportFormat>,
    #[arg(long, global = true)]
    pub top_n: Option<usize>,
    #[arg(long, global = true)]
    pub initial_capital: Option<f64>,
    #[arg(long, global = true)]
    pub position_size: Option<f64>,
    /// Drop flat next sessions that gapped up more than this percentage
    #[arg(long, global = true)]
    pub gap_up_filter: Option<f64>,
    /// Do not write the signal table
    #[arg(long, global = true)]
    pub no_save_signals: bool,
    /// Directory for per-worker log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    /// Default filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan one symbol
    Single {
        symbol: String,
        /// Print every condition's result at one bar instead of scanning
        #[arg(long)]
        trace: bool,
        /// Bar to trace (defaults to the latest)
        #[arg(long, requires = "trace")]
        date: Option<NaiveDate>,
    },
    /// Scan a list of symbols (comma-separated or repeated)
    Batch {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Scan every symbol under the data root
    All {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Analyze a previously exported signal table
    Analyze { signals: PathBuf },
    /// List the symbols available under the data root
    ListSymbols,
    /// Print the strategy conditions
    Describe,
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.log_format, &cli.log_level);

    let result = match &cli.command {
        Command::Single {
            symbol,
            trace,
            date,
        } => run_single(&cli, symbol, *trace, *date),
        Command::Batch { codes } => run_batch(&cli, codes),
        Command::All { limit } => run_all(&cli, *limit),
        Command::Analyze { signals } => run_analyze(&cli, signals),
        Command::ListSymbols => run_list_symbols(&cli),
        Command::Describe => {
            println!("{}", ConditionSet::standard().describe());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ScanError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_scan_config(&adapter)?;
    Ok(adapter)
}

/// Config file values (or defaults), overridden by command-line flags.
pub fn build_scan_config(cli: &Cli) -> Result<ScanConfig, ScanError> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::from_port(&load_config(path)?)?,
        None => ScanConfig::default(),
    };

    if let Some(root) = &cli.data_root {
        config.data_root = Some(root.clone());
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if cli.start_date.is_some() {
        config.options.start_date = cli.start_date;
    }
    if cli.end_date.is_some() {
        config.options.end_date = cli.end_date;
    }
    if let Some(dir) = &cli.log_dir {
        config.options.log_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(top_n) = cli.top_n {
        config.top_n = top_n;
    }
    if let Some(capital) = cli.initial_capital {
        config.initial_capital = capital;
    }
    if let Some(size) = cli.position_size {
        config.position_size = size;
    }
    if cli.gap_up_filter.is_some() {
        config.gap_up_filter = cli.gap_up_filter;
    }
    if cli.no_save_signals {
        config.save_signals = false;
    }

    config.validate()?;
    Ok(config)
}

fn open_source(config: &ScanConfig) -> Result<Arc<dyn SeriesSource>, ScanError> {
    let root = config
        .data_root
        .as_ref()
        .ok_or_else(|| ScanError::ConfigMissing {
            section: "data".into(),
            key: "root".into(),
        })?;
    if !root.is_dir() {
        return Err(ScanError::ConfigInvalid {
            section: "data".into(),
            key: "root".into(),
            reason: format!("{} is not a directory", root.display()),
        });
    }
    Ok(Arc::new(CsvSeriesSource::new(root.clone())))
}

fn build_orchestrator(config: &ScanConfig) -> Result<Orchestrator, ScanError> {
    Ok(Orchestrator::new(
        open_source(config)?,
        Scanner::default(),
        config.options.clone(),
    ))
}

fn run_single(
    cli: &Cli,
    symbol: &str,
    trace: bool,
    date: Option<NaiveDate>,
) -> Result<(), ScanError> {
    let config = build_scan_config(cli)?;
    let orchestrator = build_orchestrator(&config)?;
    let symbol = normalize_code(symbol)?;

    if trace {
        let trace = orchestrator.trace_single(&symbol, date)?;
        println!("{trace}");
        return Ok(());
    }

    eprintln!("Scanning {symbol}...");
    let signals = orchestrator.test_single(&symbol)?;
    let strategy = orchestrator.scanner().conditions().describe();
    publish(ScanMode::Single, &signals, strategy, None, &config)
}

fn run_batch(cli: &Cli, codes: &[String]) -> Result<(), ScanError> {
    let config = build_scan_config(cli)?;
    let symbols = parse_codes(codes)?;
    let orchestrator = build_orchestrator(&config)?;

    eprintln!(
        "Scanning {} symbols with {} workers...",
        symbols.len(),
        config.workers
    );
    let outcome = orchestrator.test_batch(&symbols, config.workers)?;
    let strategy = orchestrator.scanner().conditions().describe();
    publish(
        ScanMode::Batch,
        &outcome.signals,
        strategy,
        Some(RunStats::from(&outcome)),
        &config,
    )
}

fn run_all(cli: &Cli, limit: Option<usize>) -> Result<(), ScanError> {
    let mut config = build_scan_config(cli)?;
    if limit.is_some() {
        config.limit = limit;
        config.validate()?;
    }
    let orchestrator = build_orchestrator(&config)?;

    eprintln!("Scanning all symbols with {} workers...", config.workers);
    let outcome = orchestrator.test_all(config.workers, config.limit)?;
    let strategy = orchestrator.scanner().conditions().describe();
    publish(
        ScanMode::All,
        &outcome.signals,
        strategy,
        Some(RunStats::from(&outcome)),
        &config,
    )
}

fn run_analyze(cli: &Cli, path: &Path) -> Result<(), ScanError> {
    let config = build_scan_config(cli)?;
    eprintln!("Loading signals from {}", path.display());
    let signals = import_signals(path)?;
    let signals = filter_by_date(&signals, config.options.start_date, config.options.end_date);
    publish(ScanMode::Analyze, &signals, String::new(), None, &config)
}

fn run_list_symbols(cli: &Cli) -> Result<(), ScanError> {
    let config = build_scan_config(cli)?;
    let symbols = open_source(&config)?.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{symbol}");
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn report_adapter(format: ReportFormat) -> Box<dyn ReportPort> {
    match format {
        ReportFormat::Text => Box::new(TextReportAdapter),
        ReportFormat::Json => Box::new(JsonReportAdapter),
    }
}

/// Writes the signal table and report for a finished run and prints a
/// short summary to stderr.
pub fn publish(
    mode: ScanMode,
    signals: &[Signal],
    strategy: String,
    run: Option<RunStats>,
    config: &ScanConfig,
) -> Result<(), ScanError> {
    fs::create_dir_all(&config.output_dir)?;
    let timestamp = file_timestamp();

    if config.save_signals && mode != ScanMode::Analyze {
        let path = config.output_dir.join(signals_file_name(mode, &timestamp));
        export_signals(signals, &path)?;
        eprintln!("Signals written to: {}", path.display());
    }

    let report = ScanReport::build(mode, signals, strategy, run, &config.report_settings());
    print_summary(&report);

    let adapter = report_adapter(config.format);
    let path = config
        .output_dir
        .join(report_file_name(mode, &timestamp, adapter.extension()));
    adapter.write(&report, &path)?;
    eprintln!("Report written to: {}", path.display());
    Ok(())
}

fn print_summary(report: &ScanReport) {
    let summary = &report.summary;
    let portfolio = &report.portfolio;

    if let Some(run) = &report.run {
        eprintln!(
            "\nScanned {} of {} symbols ({} skipped) in {:.2}s",
            run.scanned,
            run.requested,
            run.skipped.len(),
            run.elapsed_secs
        );
        if run.cancelled {
            eprintln!("warning: scan was cancelled before completion");
        }
    }

    eprintln!("\n=== Signals ===");
    eprintln!("Total signals:    {}", summary.total_signals);
    eprintln!("Symbols:          {}", summary.distinct_symbols);
    if report.gap_up_filtered > 0 {
        eprintln!("Gap-ups removed:  {}", report.gap_up_filtered);
    }
    if let Some(stats) = &summary.returns {
        eprintln!("Mean next-day:    {:+.2}%", stats.mean);
        eprintln!("Next-day up:      {:.1}%", stats.positive_fraction * 100.0);
    }

    eprintln!("\n=== Portfolio ===");
    eprintln!("Final capital:    {:.2}", portfolio.final_capital);
    eprintln!("Total return:     {:+.2}%", portfolio.total_return * 100.0);
    eprintln!("Trades:           {}", portfolio.total_trades);
    eprintln!("Win rate:         {:.1}%", portfolio.win_rate * 100.0);
    eprintln!("Max drawdown:     -{:.1}%", portfolio.max_drawdown * 100.0);
    eprintln!("Sharpe ratio:     {:.2}", portfolio.sharpe_ratio);
}
