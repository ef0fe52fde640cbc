//! SymbolSeries: one symbol's ordered bar history.

use crate::domain::bar::Bar;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Minimum number of bars a series must hold before any index is scanned.
pub const MIN_HISTORY_BARS: usize = 41;

#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl SymbolSeries {
    /// Bars must already be ascending with unique dates.
    pub fn new(symbol: String, bars: Vec<Bar>) -> Self {
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol,
            bars,
            date_index,
        }
    }

    /// Rebuilds the series around a new bar list, keeping the symbol.
    pub fn with_bars(&self, bars: Vec<Bar>) -> Self {
        Self::new(self.symbol.clone(), bars)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn has_min_history(&self) -> bool {
        self.bars.len() >= MIN_HISTORY_BARS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::MovingAverages;

    fn make_bar(date: &str, close: f64) -> Bar {
        Bar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000.0,
            close_ma: MovingAverages::missing(),
            volume_ma: MovingAverages::missing(),
            derived: None,
        }
    }

    #[test]
    fn new_builds_date_index() {
        let series = SymbolSeries::new(
            "600000".into(),
            vec![
                make_bar("2024-01-01", 10.0),
                make_bar("2024-01-02", 11.0),
                make_bar("2024-01-03", 12.0),
            ],
        );

        assert_eq!(series.len(), 3);
        assert_eq!(
            series.index_of(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            Some(1)
        );
        assert_eq!(
            series.index_of(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()),
            None
        );
        assert_eq!(
            series.first_date(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2024, 1, 3));
    }

    #[test]
    fn with_bars_keeps_symbol() {
        let series = SymbolSeries::new("000001".into(), vec![make_bar("2024-01-01", 10.0)]);
        let rebuilt = series.with_bars(vec![]);
        assert_eq!(rebuilt.symbol, "000001");
        assert!(rebuilt.is_empty());
        assert!(rebuilt.first_date().is_none());
    }

    #[test]
    fn min_history_threshold() {
        let bars: Vec<Bar> = (0..MIN_HISTORY_BARS)
            .map(|i| {
                let mut b = make_bar("2024-01-01", 10.0);
                b.date += chrono::Duration::days(i as i64);
                b
            })
            .collect();
        let series = SymbolSeries::new("X".into(), bars.clone());
        assert!(series.has_min_history());

        let short = SymbolSeries::new("X".into(), bars[..MIN_HISTORY_BARS - 1].to_vec());
        assert!(!short.has_min_history());
    }
}
