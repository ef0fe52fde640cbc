//! Walks a symbol's timeline and emits a Signal at every bar where the
//! condition set holds.

use crate::domain::condition::ConditionSet;
use crate::domain::series::SymbolSeries;
use crate::domain::signal::{Horizon, Signal, pct_change};
use std::sync::Arc;

/// Stateless scanner. Clones share one condition set.
#[derive(Debug, Clone)]
pub struct Scanner {
    conditions: Arc<ConditionSet>,
}

impl Scanner {
    pub fn new(conditions: ConditionSet) -> Self {
        Self {
            conditions: Arc::new(conditions),
        }
    }

    pub fn conditions(&self) -> &ConditionSet {
        &self.conditions
    }

    /// Scans every eligible index.
    pub fn scan(&self, series: &SymbolSeries) -> Vec<Signal> {
        self.scan_range(series, 0, usize::MAX)
    }

    /// Scans `start..=end`, clamped to `[min_index, len - 1]`. Series below
    /// the minimum history never produce signals.
    pub fn scan_range(&self, series: &SymbolSeries, start: usize, end: usize) -> Vec<Signal> {
        if !series.has_min_history() {
            return Vec::new();
        }
        let start = start.max(self.conditions.min_index());
        let end = end.min(series.len() - 1);
        if start > end {
            return Vec::new();
        }

        (start..=end)
            .filter(|&i| self.conditions.check(series, i))
            .map(|i| build_signal(series, i))
            .collect()
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ConditionSet::standard())
    }
}

fn build_signal(series: &SymbolSeries, index: usize) -> Signal {
    let bar = &series.bars[index];
    let close_at = |horizon: Horizon| series.bar(index + horizon.offset()).map(|b| b.close);
    let change_to = |target: Option<f64>| target.and_then(|t| pct_change(bar.close, t));

    let next = series.bar(index + 1);
    let next_open = next.map(|b| b.open);
    let next_close = next.map(|b| b.close);
    let day3_close = close_at(Horizon::Day3);
    let day5_close = close_at(Horizon::Day5);
    let day10_close = close_at(Horizon::Day10);

    Signal {
        symbol: series.symbol.clone(),
        date: bar.date,
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
        next_open,
        next_close,
        next_day_return: change_to(next_close),
        next_open_change_pct: change_to(next_open),
        next_intraday_change_pct: next.and_then(|b| pct_change(b.open, b.close)),
        day3_close,
        day3_change_pct: change_to(day3_close),
        day5_close,
        day5_change_pct: change_to(day5_close),
        day10_close,
        day10_change_pct: change_to(day10_close),
    }
}
