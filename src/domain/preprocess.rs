//! Series preprocessing: quality checks, cleaning, date filtering and
//! derived per-bar fields.
//!
//! Every function takes the series by reference and returns a new one; the
//! input is never mutated.

use crate::domain::bar::{Bar, DerivedFields};
use crate::domain::error::DataError;
use crate::domain::series::SymbolSeries;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Quality checks only look at this many of the most recent bars.
pub const QUALITY_WINDOW: usize = 1000;
const MAX_INVALID_PRICE_RATIO: f64 = 0.10;
const MAX_GAP_DAYS: i64 = 30;
const MAX_GAP_RATIO: f64 = 0.05;

/// Rejects series whose recent history is mostly unusable.
///
/// - more than 10% of recent bars with a non-positive open or close
/// - more than 5% of recent date gaps longer than 30 calendar days
pub fn validate_quality(series: &SymbolSeries) -> Result<(), DataError> {
    let start = series.len().saturating_sub(QUALITY_WINDOW);
    let recent = &series.bars[start..];
    if recent.is_empty() {
        return Ok(());
    }

    let total = recent.len();
    let invalid = recent
        .iter()
        .filter(|b| !(b.open > 0.0) || !(b.close > 0.0))
        .count();
    if invalid as f64 / total as f64 > MAX_INVALID_PRICE_RATIO {
        return Err(DataError::InconsistentOhlc { invalid, total });
    }

    let gaps = recent
        .windows(2)
        .filter(|w| (w[1].date - w[0].date).num_days() > MAX_GAP_DAYS)
        .count();
    if gaps as f64 / total as f64 > MAX_GAP_RATIO {
        return Err(DataError::IrregularDates { gaps, total });
    }

    Ok(())
}

/// Drops bars with non-positive prices, negative volume, or a high/low that
/// does not enclose the open/close body. Survivors keep their order.
pub fn clean(series: &SymbolSeries) -> SymbolSeries {
    let kept: Vec<Bar> = series
        .bars
        .iter()
        .filter(|b| b.has_positive_prices() && b.volume >= 0.0 && b.is_consistent())
        .cloned()
        .collect();

    let dropped = series.len() - kept.len();
    if dropped > 0 {
        info!(
            symbol = %series.symbol,
            dropped,
            "cleaned invalid bars"
        );
    }

    series.with_bars(kept)
}

/// Keeps bars with `start <= date <= end`. Either bound may be absent.
pub fn filter_by_date_range(
    series: &SymbolSeries,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> SymbolSeries {
    if start.is_none() && end.is_none() {
        return series.clone();
    }

    let kept: Vec<Bar> = series
        .bars
        .iter()
        .filter(|b| start.is_none_or(|s| b.date >= s) && end.is_none_or(|e| b.date <= e))
        .cloned()
        .collect();

    debug!(
        symbol = %series.symbol,
        before = series.len(),
        after = kept.len(),
        "filtered by date range"
    );

    series.with_bars(kept)
}

/// Fills in price change, change %, previous close and amplitude.
pub fn add_derived(series: &SymbolSeries) -> SymbolSeries {
    let mut bars = series.bars.clone();
    let mut prev_close: Option<f64> = None;

    for bar in bars.iter_mut() {
        let price_change = bar.close - bar.open;
        bar.derived = Some(DerivedFields {
            price_change,
            price_change_pct: price_change / bar.open * 100.0,
            prev_close,
            amplitude: (bar.high - bar.low) / bar.open * 100.0,
        });
        prev_close = Some(bar.close);
    }

    series.with_bars(bars)
}
