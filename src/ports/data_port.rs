//! Series access port trait.

use crate::domain::error::DataError;
use crate::domain::series::SymbolSeries;

/// Source of per-symbol bar histories.
///
/// Implementations must be shareable across scan workers.
pub trait SeriesSource: Send + Sync {
    /// Loads one symbol with every required column present and at least
    /// `MIN_HISTORY_BARS` bars, sorted ascending with unique dates.
    fn load(&self, symbol: &str) -> Result<SymbolSeries, DataError>;

    /// Every symbol this source can load, sorted ascending.
    fn list_symbols(&self) -> Result<Vec<String>, DataError>;
}
