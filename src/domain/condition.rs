//! Strategy conditions and the ordered set that combines them.
//!
//! Each [`Condition`] is a pure predicate over `(series, index)`. A
//! [`ConditionSet`] holds them in order and passes an index only when every
//! condition holds. Conditions fail closed: an index below
//! [`MIN_SCAN_INDEX`], an index past the end of the series, or a NaN anywhere
//! in the compared values all evaluate to `false`.

use crate::domain::bar::{Bar, Window};
use crate::domain::series::SymbolSeries;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// No condition is evaluated below this index.
pub const MIN_SCAN_INDEX: usize = 10;

pub trait Condition: Send + Sync {
    fn check(&self, series: &SymbolSeries, index: usize) -> bool;
    fn description(&self) -> String;

    /// Lowest index this condition can ever pass at.
    fn min_index(&self) -> usize {
        MIN_SCAN_INDEX
    }
}

fn scan_bar(series: &SymbolSeries, index: usize) -> Option<&Bar> {
    if index < MIN_SCAN_INDEX {
        return None;
    }
    series.bar(index)
}

/// close > `min_price` and low > `min_price`.
#[derive(Debug, Clone)]
pub struct PriceFloor {
    pub min_price: f64,
}

impl Default for PriceFloor {
    fn default() -> Self {
        Self { min_price: 1.0 }
    }
}

impl Condition for PriceFloor {
    fn check(&self, series: &SymbolSeries, index: usize) -> bool {
        match scan_bar(series, index) {
            Some(bar) => bar.close > self.min_price && bar.low > self.min_price,
            None => false,
        }
    }

    fn description(&self) -> String {
        format!("close and low above {}", self.min_price)
    }
}

/// Every listed close average rises strictly on each of the last `sessions`
/// sessions, the current one included.
#[derive(Debug, Clone)]
pub struct SustainedTrend {
    pub sessions: usize,
    pub windows: Vec<Window>,
}

impl Default for SustainedTrend {
    fn default() -> Self {
        Self {
            sessions: 10,
            windows: vec![Window::W20, Window::W30, Window::W60],
        }
    }
}

impl Condition for SustainedTrend {
    fn check(&self, series: &SymbolSeries, index: usize) -> bool {
        if scan_bar(series, index).is_none() || self.sessions == 0 || index < self.sessions {
            return false;
        }
        let bars = &series.bars;
        for k in (index + 1 - self.sessions)..=index {
            for &window in &self.windows {
                let prev = bars[k - 1].close_ma.get(window);
                let curr = bars[k].close_ma.get(window);
                // NaN on either side fails here too.
                if !(curr > prev) {
                    return false;
                }
            }
        }
        true
    }

    fn description(&self) -> String {
        let windows: Vec<String> = self
            .windows
            .iter()
            .map(|w| format!("MA{}", w.sessions()))
            .collect();
        format!(
            "{} rising on each of the last {} sessions",
            windows.join("/"),
            self.sessions
        )
    }
}

/// On each of the `lookback` sessions before the current one, the close sits
/// within `tolerance` of at least one of the listed averages.
#[derive(Debug, Clone)]
pub struct MeanReversionProximity {
    pub lookback: usize,
    pub tolerance: f64,
    pub windows: Vec<Window>,
}

impl Default for MeanReversionProximity {
    fn default() -> Self {
        Self {
            lookback: 3,
            tolerance: 0.01,
            windows: vec![Window::W20, Window::W30],
        }
    }
}

impl MeanReversionProximity {
    fn near_average(&self, bar: &Bar) -> bool {
        if !bar.close.is_finite() {
            return false;
        }
        self.windows.iter().any(|&w| {
            let ma = bar.close_ma.get(w);
            ma.is_finite() && ma != 0.0 && (bar.close - ma).abs() <= self.tolerance * ma.abs()
        })
    }
}

impl Condition for MeanReversionProximity {
    fn check(&self, series: &SymbolSeries, index: usize) -> bool {
        if scan_bar(series, index).is_none() || index < self.lookback {
            return false;
        }
        series.bars[index - self.lookback..index]
            .iter()
            .all(|bar| self.near_average(bar))
    }

    fn description(&self) -> String {
        let windows: Vec<String> = self
            .windows
            .iter()
            .map(|w| format!("MA{}", w.sessions()))
            .collect();
        format!(
            "close within {:.0}% of {} on each of the previous {} sessions",
            self.tolerance * 100.0,
            windows.join(" or "),
            self.lookback
        )
    }
}

/// Current bar closes up and above the highest high of the previous
/// `lookback` sessions.
#[derive(Debug, Clone)]
pub struct BreakoutBar {
    pub lookback: usize,
}

impl Default for BreakoutBar {
    fn default() -> Self {
        Self { lookback: 3 }
    }
}

impl Condition for BreakoutBar {
    fn check(&self, series: &SymbolSeries, index: usize) -> bool {
        let bar = match scan_bar(series, index) {
            Some(b) => b,
            None => return false,
        };
        if self.lookback == 0 || index < self.lookback || !bar.is_positive() {
            return false;
        }

        let mut max_high = f64::NEG_INFINITY;
        for prev in &series.bars[index - self.lookback..index] {
            if !prev.high.is_finite() {
                return false;
            }
            max_high = max_high.max(prev.high);
        }
        bar.close > max_high
    }

    fn description(&self) -> String {
        format!(
            "positive bar closing above the highest high of the previous {} sessions",
            self.lookback
        )
    }
}

/// Current volume below `multiplier` × the previous session's volume average.
#[derive(Debug, Clone)]
pub struct VolumeSanity {
    pub multiplier: f64,
    pub window: Window,
}

impl Default for VolumeSanity {
    fn default() -> Self {
        Self {
            multiplier: 1.5,
            window: Window::W10,
        }
    }
}

impl Condition for VolumeSanity {
    fn check(&self, series: &SymbolSeries, index: usize) -> bool {
        let bar = match scan_bar(series, index) {
            Some(b) => b,
            None => return false,
        };
        let avg = series.bars[index - 1].volume_ma.get(self.window);
        bar.volume.is_finite() && avg.is_finite() && bar.volume < self.multiplier * avg
    }

    fn description(&self) -> String {
        format!(
            "volume below {}x the previous session's {}-day volume average",
            self.multiplier,
            self.window.sessions()
        )
    }
}

/// Result of one condition inside a trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionOutcome {
    pub position: usize,
    pub description: String,
    pub passed: bool,
}

/// Verbose evaluation of every condition at one index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionTrace {
    pub symbol: String,
    pub date: Option<NaiveDate>,
    pub index: usize,
    pub outcomes: Vec<ConditionOutcome>,
    pub passed: bool,
}

impl fmt::Display for ConditionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        writeln!(f, "{} @ {} (index {})", self.symbol, date, self.index)?;
        for o in &self.outcomes {
            let mark = if o.passed { "pass" } else { "FAIL" };
            writeln!(f, "  [{}] {}. {}", mark, o.position, o.description)?;
        }
        write!(
            f,
            "  result: {}",
            if self.passed { "SIGNAL" } else { "no signal" }
        )
    }
}

/// Ordered conditions combined with logical AND.
pub struct ConditionSet {
    conditions: Vec<Box<dyn Condition>>,
}

impl ConditionSet {
    pub fn empty() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// The five-condition trend-pullback breakout strategy.
    pub fn standard() -> Self {
        let mut set = Self::empty();
        set.push(Box::new(PriceFloor::default()));
        set.push(Box::new(SustainedTrend::default()));
        set.push(Box::new(MeanReversionProximity::default()));
        set.push(Box::new(BreakoutBar::default()));
        set.push(Box::new(VolumeSanity::default()));
        set
    }

    pub fn push(&mut self, condition: Box<dyn Condition>) {
        self.conditions.push(condition);
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Condition>> {
        if index < self.conditions.len() {
            Some(self.conditions.remove(index))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Lowest index at which every condition can pass.
    pub fn min_index(&self) -> usize {
        self.conditions
            .iter()
            .map(|c| c.min_index())
            .fold(MIN_SCAN_INDEX, usize::max)
    }

    /// Short-circuits on the first failing condition.
    pub fn check(&self, series: &SymbolSeries, index: usize) -> bool {
        if index < self.min_index() || index >= series.len() {
            return false;
        }
        self.conditions.iter().all(|c| c.check(series, index))
    }

    /// Evaluates every condition, without short-circuiting.
    pub fn trace(&self, series: &SymbolSeries, index: usize) -> ConditionTrace {
        let in_range = index >= self.min_index() && index < series.len();
        let outcomes: Vec<ConditionOutcome> = self
            .conditions
            .iter()
            .enumerate()
            .map(|(i, c)| ConditionOutcome {
                position: i + 1,
                description: c.description(),
                passed: in_range && c.check(series, index),
            })
            .collect();
        let passed = in_range && outcomes.iter().all(|o| o.passed);

        ConditionTrace {
            symbol: series.symbol.clone(),
            date: series.bar(index).map(|b| b.date),
            index,
            outcomes,
            passed,
        }
    }

    pub fn describe(&self) -> String {
        let mut lines = vec!["Strategy conditions:".to_string()];
        for (i, c) in self.conditions.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, c.description()));
        }
        lines.join("\n")
    }
}

impl Default for ConditionSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.conditions.iter().map(|c| c.description()))
            .finish()
    }
}
