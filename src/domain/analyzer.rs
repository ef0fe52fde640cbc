//! Distribution statistics over a signal corpus.

use crate::domain::signal::{Horizon, Signal};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Open and close closer than this count as equal.
const FLAT_SESSION_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 below two values.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub positive_fraction: f64,
    pub negative_fraction: f64,
    pub zero_fraction: f64,
}

impl ReturnStats {
    /// `None` when `values` is empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len();
        let nf = n as f64;
        let mean = values.iter().sum::<f64>() / nf;
        let std = if n < 2 {
            0.0
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (nf - 1.0)).sqrt()
        };

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        let count_where = |pred: fn(f64) -> bool| values.iter().filter(|&&v| pred(v)).count();
        Some(Self {
            count: n,
            mean,
            median,
            std,
            min: sorted[0],
            max: sorted[n - 1],
            positive_fraction: count_where(|v| v > 0.0) as f64 / nf,
            negative_fraction: count_where(|v| v < 0.0) as f64 / nf,
            zero_fraction: count_where(|v| v == 0.0) as f64 / nf,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodCount {
    pub period: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolCount {
    pub symbol: String,
    pub count: usize,
}

/// Up counts over the +3, +5 and +10 horizons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HorizonUps {
    pub day3_up: usize,
    pub day3_total: usize,
    pub day5_up: usize,
    pub day5_total: usize,
    pub day10_up: usize,
    pub day10_total: usize,
}

impl HorizonUps {
    fn record(&mut self, signal: &Signal) {
        let slots = [
            (Horizon::Day3, &mut self.day3_up, &mut self.day3_total),
            (Horizon::Day5, &mut self.day5_up, &mut self.day5_total),
            (Horizon::Day10, &mut self.day10_up, &mut self.day10_total),
        ];
        for (horizon, up, total) in slots {
            if let Some(r) = signal.forward_return(horizon) {
                *total += 1;
                if r > 0.0 {
                    *up += 1;
                }
            }
        }
    }

    pub fn day3_pct(&self) -> f64 {
        percentage(self.day3_up, self.day3_total)
    }

    pub fn day5_pct(&self) -> f64 {
        percentage(self.day5_up, self.day5_total)
    }

    pub fn day10_pct(&self) -> f64 {
        percentage(self.day10_up, self.day10_total)
    }
}

/// Signals in one next-session open/close pattern and how they did later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionPattern {
    pub count: usize,
    pub follow_up: HorizonUps,
}

impl SessionPattern {
    fn record(&mut self, signal: &Signal) {
        self.count += 1;
        self.follow_up.record(signal);
    }
}

/// Next-session behaviour of the signals.
///
/// Patterns classify by the sign of the next open versus the signal close
/// and of the next close versus the next open. Signals with a zero on either
/// side fall in no pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DetailedBreakdown {
    pub total: usize,
    pub next_open_up: usize,
    pub next_close_up: usize,
    pub high_open_high_close: SessionPattern,
    pub high_open_low_close: SessionPattern,
    pub low_open_high_close: SessionPattern,
    pub low_open_low_close: SessionPattern,
    pub horizons: HorizonUps,
}

impl DetailedBreakdown {
    pub fn compute(signals: &[Signal]) -> Self {
        let mut out = Self {
            total: signals.len(),
            ..Self::default()
        };

        for s in signals {
            let open_change = s.next_open_change_pct;
            let intraday = s.next_intraday_change_pct;
            if open_change.is_some_and(|v| v > 0.0) {
                out.next_open_up += 1;
            }
            if s.next_day_return.is_some_and(|v| v > 0.0) {
                out.next_close_up += 1;
            }
            out.horizons.record(s);

            if let (Some(o), Some(c)) = (open_change, intraday) {
                let pattern = match (o > 0.0, o < 0.0, c > 0.0, c < 0.0) {
                    (true, _, true, _) => Some(&mut out.high_open_high_close),
                    (true, _, _, true) => Some(&mut out.high_open_low_close),
                    (_, true, true, _) => Some(&mut out.low_open_high_close),
                    (_, true, _, true) => Some(&mut out.low_open_low_close),
                    _ => None,
                };
                if let Some(p) = pattern {
                    p.record(s);
                }
            }
        }
        out
    }

    pub fn next_open_up_pct(&self) -> f64 {
        percentage(self.next_open_up, self.total)
    }

    pub fn next_close_up_pct(&self) -> f64 {
        percentage(self.next_close_up, self.total)
    }

    /// Share of all signals falling in `pattern`.
    pub fn pattern_pct(&self, pattern: &SessionPattern) -> f64 {
        percentage(pattern.count, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSummary {
    pub total_signals: usize,
    pub distinct_symbols: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Over signals with a next-session return.
    pub returns: Option<ReturnStats>,
    /// `YYYY-MM`, ascending.
    pub by_month: Vec<PeriodCount>,
    /// Monday first; only weekdays with signals.
    pub by_weekday: Vec<PeriodCount>,
    pub top_symbols: Vec<SymbolCount>,
    pub single_signal_symbols: usize,
    pub multi_signal_symbols: usize,
    pub detail: DetailedBreakdown,
}

/// `numerator / denominator × 100`, or 0 for a zero denominator.
pub fn percentage(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

pub fn analyze(signals: &[Signal], top_n: usize) -> SignalSummary {
    let next_returns: Vec<f64> = signals
        .iter()
        .filter_map(|s| s.next_day_return)
        .filter(|r| r.is_finite())
        .collect();

    let date_range = signals
        .iter()
        .map(|s| s.date)
        .min()
        .zip(signals.iter().map(|s| s.date).max());

    let mut months: BTreeMap<String, usize> = BTreeMap::new();
    let mut weekdays: [usize; 7] = [0; 7];
    let mut per_symbol: HashMap<&str, usize> = HashMap::new();
    for s in signals {
        *months.entry(s.date.format("%Y-%m").to_string()).or_default() += 1;
        weekdays[s.date.weekday().num_days_from_monday() as usize] += 1;
        *per_symbol.entry(s.symbol.as_str()).or_default() += 1;
    }

    let by_weekday = weekdays
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(i, &count)| PeriodCount {
            period: weekday_name(i),
            count,
        })
        .collect();

    let mut ranked: Vec<SymbolCount> = per_symbol
        .iter()
        .map(|(&symbol, &count)| SymbolCount {
            symbol: symbol.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.symbol.cmp(&b.symbol)));
    let single_signal_symbols = ranked.iter().filter(|c| c.count == 1).count();
    let multi_signal_symbols = ranked.len() - single_signal_symbols;
    ranked.truncate(top_n);

    SignalSummary {
        total_signals: signals.len(),
        distinct_symbols: per_symbol.len(),
        date_range,
        returns: ReturnStats::from_values(&next_returns),
        by_month: months
            .into_iter()
            .map(|(period, count)| PeriodCount { period, count })
            .collect(),
        by_weekday,
        top_symbols: ranked,
        single_signal_symbols,
        multi_signal_symbols,
        detail: DetailedBreakdown::compute(signals),
    }
}

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn weekday_name(days_from_monday: usize) -> String {
    WEEKDAY_NAMES[days_from_monday].to_string()
}

/// Keeps signals dated within `[start, end]`; either bound may be absent.
pub fn filter_by_date(
    signals: &[Signal],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<Signal> {
    signals
        .iter()
        .filter(|s| start.is_none_or(|d| s.date >= d) && end.is_none_or(|d| s.date <= d))
        .cloned()
        .collect()
}

/// The `n` best signals by forward return at `horizon`, best first.
/// Signals without that return are dropped.
pub fn top_signals(signals: &[Signal], n: usize, horizon: Horizon) -> Vec<Signal> {
    let mut ranked: Vec<(f64, &Signal)> = signals
        .iter()
        .filter_map(|s| s.forward_return(horizon).filter(|r| r.is_finite()).map(|r| (r, s)))
        .collect();
    ranked.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.date.cmp(&b.1.date))
            .then_with(|| a.1.symbol.cmp(&b.1.symbol))
    });
    ranked.into_iter().take(n).map(|(_, s)| s.clone()).collect()
}

/// Drops signals whose next session gapped up more than `threshold_pct` and
/// then never traded away from the open, which usually means the stock was
/// locked at its limit and could not be bought. Signals missing next-session
/// data are kept. Returns the kept signals and the number dropped.
pub fn filter_flat_gap_ups(signals: &[Signal], threshold_pct: f64) -> (Vec<Signal>, usize) {
    let mut kept = Vec::with_capacity(signals.len());
    let mut dropped = 0usize;

    for s in signals {
        let locked = match (s.next_open_change_pct, s.next_open, s.next_close) {
            (Some(gap), Some(open), Some(close)) => {
                gap > threshold_pct && (open - close).abs() < FLAT_SESSION_EPSILON
            }
            _ => false,
        };
        if locked {
            dropped += 1;
            info!(symbol = %s.symbol, date = %s.date, gap_pct = ?s.next_open_change_pct, "filtered locked gap-up");
        } else {
            kept.push(s.clone());
        }
    }
    (kept, dropped)
}
