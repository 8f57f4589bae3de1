//! Broad market regime from an index's EMA(50) and EMA(200).

use std::fmt;

use crate::domain::bar::PriceBar;
use crate::domain::indicator::ema::calculate_ema;

pub const REGIME_FAST: usize = 50;
pub const REGIME_SLOW: usize = 200;
/// Bars requested for the regime index.
pub const REGIME_LOOKBACK: usize = 260;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Bull,
    Bear,
    Mixed,
    Unknown,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Bull => "BULL",
            Regime::Bear => "BEAR",
            Regime::Mixed => "MIXED",
            Regime::Unknown => "UNKNOWN",
        }
    }

    /// Only a bear market pauses entries.
    pub fn allows_entries(&self) -> bool {
        *self != Regime::Bear
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BULL when close > EMA50 > EMA200, BEAR when close < EMA50 < EMA200,
/// MIXED otherwise. UNKNOWN without enough history.
pub fn classify(bars: &[PriceBar]) -> Regime {
    let (Some(fast), Some(slow), Some(last)) = (
        calculate_ema(bars, REGIME_FAST).latest(),
        calculate_ema(bars, REGIME_SLOW).latest(),
        bars.last(),
    ) else {
        return Regime::Unknown;
    };

    let price = last.close;
    if price > fast && fast > slow {
        Regime::Bull
    } else if price < fast && fast < slow {
        Regime::Bear
    } else {
        Regime::Mixed
    }
}
