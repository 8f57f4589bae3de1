//! Market data port.

use crate::domain::bar::PriceBar;
use crate::domain::error::SwingError;

pub trait DataPort: Send + Sync {
    /// Returns up to `lookback` most recent daily bars for `symbol`, oldest
    /// first. Fails with `DataUnavailable` when the provider has nothing.
    fn get_bars(&self, symbol: &str, lookback: usize) -> Result<Vec<PriceBar>, SwingError>;
}
