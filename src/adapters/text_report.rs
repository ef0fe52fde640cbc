//! Plain-text report adapter implementing ReportPort.
//!
//! Sections, in order: run, basic statistics, next-session return
//! distribution, time distribution, top symbols, detailed breakdown,
//! best signals and portfolio simulation.

use crate::domain::analyzer::{DetailedBreakdown, HorizonUps, SessionPattern, SignalSummary};
use crate::domain::error::ScanError;
use crate::domain::portfolio::PortfolioReport;
use crate::domain::report::{RunStats, ScanReport};
use crate::domain::signal::Signal;
use crate::ports::report_port::ReportPort;
use std::fmt::Write;

const RULE: &str = "============================================================";
const SUB_RULE: &str = "------------------------------------------------------------";

pub struct TextReportAdapter;

impl ReportPort for TextReportAdapter {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, report: &ScanReport) -> Result<String, ScanError> {
        Ok(render_text(report))
    }
}

fn opt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:+.2}%"))
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}\n{SUB_RULE}");
}

pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "sigscan {} report", report.mode);
    let _ = writeln!(out, "Generated: {}", report.generated_at);
    let _ = writeln!(out, "{RULE}");

    if !report.strategy.is_empty() {
        let _ = writeln!(out, "\n{}", report.strategy.trim_end());
    }
    if let Some(run) = &report.run {
        write_run(&mut out, run);
    }
    write_basic(&mut out, &report.summary, report.gap_up_filtered);

    if report.summary.total_signals == 0 {
        let _ = writeln!(out, "\nNo signals found.");
        write_portfolio(&mut out, &report.portfolio);
        return out;
    }

    write_returns(&mut out, &report.summary);
    write_time(&mut out, &report.summary);
    write_symbols(&mut out, &report.summary);
    write_detail(&mut out, &report.summary.detail);
    write_top_signals(&mut out, &report.top_signals);
    write_portfolio(&mut out, &report.portfolio);
    out
}

fn write_run(out: &mut String, run: &RunStats) {
    heading(out, "Run");
    let _ = writeln!(out, "Symbols requested:    {}", run.requested);
    let _ = writeln!(out, "Symbols scanned:      {}", run.scanned);
    let _ = writeln!(out, "Symbols skipped:      {}", run.skipped.len());
    let _ = writeln!(out, "Elapsed:              {:.2}s", run.elapsed_secs);
    if run.cancelled {
        let _ = writeln!(out, "Cancelled before all symbols were dispatched");
    }
    if run.missing_results > 0 {
        let _ = writeln!(out, "Results missing:      {}", run.missing_results);
    }
    if run.abandoned_workers > 0 {
        let _ = writeln!(out, "Workers abandoned:    {}", run.abandoned_workers);
    }
    for skipped in &run.skipped {
        let _ = writeln!(out, "  skipped {}: {}", skipped.symbol, skipped.reason);
    }
}

fn write_basic(out: &mut String, summary: &SignalSummary, gap_up_filtered: usize) {
    heading(out, "Basic statistics");
    let _ = writeln!(out, "Total signals:        {}", summary.total_signals);
    let _ = writeln!(out, "Distinct symbols:     {}", summary.distinct_symbols);
    if let Some((first, last)) = summary.date_range {
        let _ = writeln!(out, "Date range:           {first} to {last}");
    }
    if gap_up_filtered > 0 {
        let _ = writeln!(out, "Locked gap-ups removed: {gap_up_filtered}");
    }
}

fn write_returns(out: &mut String, summary: &SignalSummary) {
    heading(out, "Next-session return distribution");
    let Some(stats) = &summary.returns else {
        let _ = writeln!(out, "No signal has a next-session return.");
        return;
    };
    let _ = writeln!(out, "Signals with return:  {}", stats.count);
    let _ = writeln!(out, "Mean:                 {:+.2}%", stats.mean);
    let _ = writeln!(out, "Median:               {:+.2}%", stats.median);
    let _ = writeln!(out, "Std dev:              {:.2}%", stats.std);
    let _ = writeln!(out, "Min / Max:            {:+.2}% / {:+.2}%", stats.min, stats.max);
    let _ = writeln!(
        out,
        "Up / Down / Flat:     {:.1}% / {:.1}% / {:.1}%",
        stats.positive_fraction * 100.0,
        stats.negative_fraction * 100.0,
        stats.zero_fraction * 100.0
    );
}

fn write_time(out: &mut String, summary: &SignalSummary) {
    heading(out, "Signals by month");
    for month in &summary.by_month {
        let _ = writeln!(out, "  {}: {}", month.period, month.count);
    }
    heading(out, "Signals by weekday");
    for day in &summary.by_weekday {
        let _ = writeln!(out, "  {:<10} {}", day.period, day.count);
    }
}

fn write_symbols(out: &mut String, summary: &SignalSummary) {
    heading(out, "Top symbols");
    for (rank, entry) in summary.top_symbols.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {:<10} {}", rank + 1, entry.symbol, entry.count);
    }
    let _ = writeln!(out, "Symbols with one signal:      {}", summary.single_signal_symbols);
    let _ = writeln!(out, "Symbols with several signals: {}", summary.multi_signal_symbols);
}

fn write_follow_up(out: &mut String, ups: &HorizonUps) {
    let _ = writeln!(
        out,
        "      +3: {}/{} up ({:.1}%)  +5: {}/{} up ({:.1}%)  +10: {}/{} up ({:.1}%)",
        ups.day3_up,
        ups.day3_total,
        ups.day3_pct(),
        ups.day5_up,
        ups.day5_total,
        ups.day5_pct(),
        ups.day10_up,
        ups.day10_total,
        ups.day10_pct()
    );
}

fn write_detail(out: &mut String, detail: &DetailedBreakdown) {
    heading(out, "Detailed breakdown");
    let _ = writeln!(
        out,
        "Next open above signal close:  {} ({:.1}%)",
        detail.next_open_up,
        detail.next_open_up_pct()
    );
    let _ = writeln!(
        out,
        "Next close above signal close: {} ({:.1}%)",
        detail.next_close_up,
        detail.next_close_up_pct()
    );
    let _ = writeln!(out, "Later sessions:");
    write_follow_up(out, &detail.horizons);

    let patterns: [(&str, &SessionPattern); 4] = [
        ("High open, closed up", &detail.high_open_high_close),
        ("High open, closed down", &detail.high_open_low_close),
        ("Low open, closed up", &detail.low_open_high_close),
        ("Low open, closed down", &detail.low_open_low_close),
    ];
    let _ = writeln!(out, "Next-session patterns:");
    for (label, pattern) in patterns {
        let _ = writeln!(
            out,
            "  {label:<24} {} ({:.1}%)",
            pattern.count,
            detail.pattern_pct(pattern)
        );
        if pattern.count > 0 {
            write_follow_up(out, &pattern.follow_up);
        }
    }
}

fn write_top_signals(out: &mut String, signals: &[Signal]) {
    if signals.is_empty() {
        return;
    }
    heading(out, "Best signals by next-session return");
    for s in signals {
        let _ = writeln!(
            out,
            "  {} {:<10} close {:>10.2}  next {:>8}  +3 {:>8}  +5 {:>8}  +10 {:>8}",
            s.date,
            s.symbol,
            s.close,
            opt_pct(s.next_day_return),
            opt_pct(s.day3_change_pct),
            opt_pct(s.day5_change_pct),
            opt_pct(s.day10_change_pct)
        );
    }
}

fn write_portfolio(out: &mut String, p: &PortfolioReport) {
    heading(out, "Portfolio simulation");
    let _ = writeln!(out, "Initial capital:      {:.2}", p.initial_capital);
    let _ = writeln!(out, "Position size:        {:.1}%", p.position_size * 100.0);
    let _ = writeln!(out, "Final capital:        {:.2}", p.final_capital);
    let _ = writeln!(out, "Total return:         {:+.2}%", p.total_return * 100.0);
    let _ = writeln!(out, "Trades:               {}", p.total_trades);
    let _ = writeln!(
        out,
        "Win rate:             {:.1}% ({} won, {} lost)",
        p.win_rate * 100.0,
        p.winning_trades,
        p.losing_trades
    );
    let _ = writeln!(out, "Avg return per trade: {:+.3}%", p.avg_return_per_trade * 100.0);
    let _ = writeln!(out, "Volatility:           {:.3}%", p.volatility * 100.0);
    let _ = writeln!(out, "Max drawdown:         {:.2}%", p.max_drawdown * 100.0);
    let _ = writeln!(out, "Sharpe ratio:         {:.3}", p.sharpe_ratio);
}
