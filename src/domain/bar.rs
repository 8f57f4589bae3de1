//! Daily price bar as delivered by the data collaborator.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Checks that a series is chronological with no duplicate dates.
pub fn is_ordered(bars: &[PriceBar]) -> bool {
    bars.windows(2).all(|w| w[0].date < w[1].date)
}

/// Keeps the last `lookback` bars of an ordered series.
pub fn tail(bars: Vec<PriceBar>, lookback: usize) -> Vec<PriceBar> {
    if bars.len() <= lookback {
        return bars;
    }
    let skip = bars.len() - lookback;
    bars.into_iter().skip(skip).collect()
}
