//! Signal records and their forward-return fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Forward horizons measured from the signal close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    Day1,
    Day3,
    Day5,
    Day10,
}

impl Horizon {
    pub const ALL: [Horizon; 4] = [Horizon::Day1, Horizon::Day3, Horizon::Day5, Horizon::Day10];

    /// Sessions ahead of the signal bar.
    pub fn offset(self) -> usize {
        match self {
            Horizon::Day1 => 1,
            Horizon::Day3 => 3,
            Horizon::Day5 => 5,
            Horizon::Day10 => 10,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Horizon::Day1 => "next_day_return",
            Horizon::Day3 => "day3_change_pct",
            Horizon::Day5 => "day5_change_pct",
            Horizon::Day10 => "day10_change_pct",
        }
    }
}

impl std::str::FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "day1" | "next_day_return" => Ok(Horizon::Day1),
            "3" | "day3" | "day3_change_pct" => Ok(Horizon::Day3),
            "5" | "day5" | "day5_change_pct" => Ok(Horizon::Day5),
            "10" | "day10" | "day10_change_pct" => Ok(Horizon::Day10),
            other => Err(format!("unknown horizon '{other}' (expected 1, 3, 5 or 10)")),
        }
    }
}

/// Percentage change from `base` to `target`. `None` when either value is
/// not finite or `base` is zero.
pub fn pct_change(base: f64, target: f64) -> Option<f64> {
    if !base.is_finite() || !target.is_finite() || base == 0.0 {
        return None;
    }
    Some((target - base) / base * 100.0)
}

/// One bar at which every condition held, with what happened afterwards.
///
/// Percentages are in percent units (`10.0` means +10%). Every forward field
/// is `None` when the session it refers to does not exist in the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub next_open: Option<f64>,
    pub next_close: Option<f64>,
    /// close[i] to close[i+1]
    pub next_day_return: Option<f64>,
    /// close[i] to open[i+1]
    pub next_open_change_pct: Option<f64>,
    /// open[i+1] to close[i+1]
    pub next_intraday_change_pct: Option<f64>,
    pub day3_close: Option<f64>,
    pub day3_change_pct: Option<f64>,
    pub day5_close: Option<f64>,
    pub day5_change_pct: Option<f64>,
    pub day10_close: Option<f64>,
    pub day10_change_pct: Option<f64>,
}

impl Signal {
    pub fn forward_return(&self, horizon: Horizon) -> Option<f64> {
        match horizon {
            Horizon::Day1 => self.next_day_return,
            Horizon::Day3 => self.day3_change_pct,
            Horizon::Day5 => self.day5_change_pct,
            Horizon::Day10 => self.day10_change_pct,
        }
    }
}

/// Stable sort by `(date, symbol)`.
pub fn sort_signals(signals: &mut [Signal]) {
    signals.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn signal(symbol: &str, day: u32) -> Signal {
        Signal {
            symbol: symbol.into(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            open: 10.0,
            high: 10.5,
            low: 9.9,
            close: 10.4,
            volume: 1000.0,
            next_open: None,
            next_close: None,
            next_day_return: Some(1.0),
            next_open_change_pct: None,
            next_intraday_change_pct: None,
            day3_close: None,
            day3_change_pct: Some(3.0),
            day5_close: None,
            day5_change_pct: None,
            day10_close: None,
            day10_change_pct: None,
        }
    }

    #[test]
    fn pct_change_rules() {
        assert_relative_eq!(pct_change(10.0, 11.0).unwrap(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(pct_change(10.0, 9.5).unwrap(), -5.0, epsilon = 1e-12);
        assert!(pct_change(0.0, 1.0).is_none());
        assert!(pct_change(f64::NAN, 1.0).is_none());
        assert!(pct_change(1.0, f64::INFINITY).is_none());
    }

    #[test]
    fn forward_return_by_horizon() {
        let s = signal("A", 1);
        assert_eq!(s.forward_return(Horizon::Day1), Some(1.0));
        assert_eq!(s.forward_return(Horizon::Day3), Some(3.0));
        assert_eq!(s.forward_return(Horizon::Day5), None);
    }

    #[test]
    fn sort_by_date_then_symbol() {
        let mut signals = vec![signal("B", 2), signal("C", 1), signal("A", 2), signal("A", 1)];
        sort_signals(&mut signals);
        let keys: Vec<(String, u32)> = signals
            .iter()
            .map(|s| (s.symbol.clone(), chrono::Datelike::day(&s.date)))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("A".into(), 1),
                ("C".into(), 1),
                ("A".into(), 2),
                ("B".into(), 2)
            ]
        );
    }

    #[test]
    fn horizon_parse() {
        assert_eq!("5".parse::<Horizon>().unwrap(), Horizon::Day5);
        assert_eq!("day10".parse::<Horizon>().unwrap(), Horizon::Day10);
        assert!("7".parse::<Horizon>().is_err());
    }
}
