//! Daily bar representation with precomputed moving averages.

use chrono::NaiveDate;

/// Session windows the upstream pipeline precomputes averages for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    W5,
    W10,
    W20,
    W30,
    W60,
}

impl Window {
    pub const ALL: [Window; 5] = [
        Window::W5,
        Window::W10,
        Window::W20,
        Window::W30,
        Window::W60,
    ];

    pub fn sessions(self) -> usize {
        match self {
            Window::W5 => 5,
            Window::W10 => 10,
            Window::W20 => 20,
            Window::W30 => 30,
            Window::W60 => 60,
        }
    }

    /// Column holding the close average for this window, e.g. `close_20d_avg`.
    pub fn close_column(self) -> String {
        format!("close_{}d_avg", self.sessions())
    }

    /// Column holding the volume average for this window, e.g. `volume_10d_avg`.
    pub fn volume_column(self) -> String {
        format!("volume_{}d_avg", self.sessions())
    }
}

/// The five averages for one bar. Missing cells are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverages {
    pub ma5: f64,
    pub ma10: f64,
    pub ma20: f64,
    pub ma30: f64,
    pub ma60: f64,
}

impl MovingAverages {
    pub fn missing() -> Self {
        Self {
            ma5: f64::NAN,
            ma10: f64::NAN,
            ma20: f64::NAN,
            ma30: f64::NAN,
            ma60: f64::NAN,
        }
    }

    pub fn get(&self, window: Window) -> f64 {
        match window {
            Window::W5 => self.ma5,
            Window::W10 => self.ma10,
            Window::W20 => self.ma20,
            Window::W30 => self.ma30,
            Window::W60 => self.ma60,
        }
    }

    pub fn set(&mut self, window: Window, value: f64) {
        match window {
            Window::W5 => self.ma5 = value,
            Window::W10 => self.ma10 = value,
            Window::W20 => self.ma20 = value,
            Window::W30 => self.ma30 = value,
            Window::W60 => self.ma60 = value,
        }
    }
}

/// Per-bar fields filled in by `preprocess::add_derived`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFields {
    pub price_change: f64,
    pub price_change_pct: f64,
    pub prev_close: Option<f64>,
    pub amplitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_ma: MovingAverages,
    pub volume_ma: MovingAverages,
    pub derived: Option<DerivedFields>,
}

impl Bar {
    /// close > open
    pub fn is_positive(&self) -> bool {
        self.close > self.open
    }

    /// All four prices strictly positive (NaN fails).
    pub fn has_positive_prices(&self) -> bool {
        self.open > 0.0 && self.high > 0.0 && self.low > 0.0 && self.close > 0.0
    }

    /// high covers the body from above and low from below.
    pub fn is_consistent(&self) -> bool {
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}
