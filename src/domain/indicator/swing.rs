//! Swing pivots and Fibonacci extension targets.

use crate::domain::bar::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingRange {
    pub low: f64,
    pub high: f64,
}

impl SwingRange {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Finds the most recent structural swing low/high within the last `lookback`
/// bars. A pivot is a bar whose high (low) is the extreme of the `pivot_bars`
/// bars on either side. Falls back to the window max/min when no pivot exists.
pub fn find_swing_range(bars: &[PriceBar], lookback: usize, pivot_bars: usize) -> Option<SwingRange> {
    if bars.is_empty() || lookback == 0 {
        return None;
    }
    let start = bars.len().saturating_sub(lookback);
    let window = &bars[start..];

    let mut last_high = None;
    let mut last_low = None;

    if window.len() > 2 * pivot_bars {
        for i in pivot_bars..window.len() - pivot_bars {
            let around = &window[i - pivot_bars..=i + pivot_bars];
            let max_high = around.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let min_low = around.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            if window[i].high >= max_high {
                last_high = Some(window[i].high);
            }
            if window[i].low <= min_low {
                last_low = Some(window[i].low);
            }
        }
    }

    let high = last_high.unwrap_or_else(|| window.iter().map(|b| b.high).fold(f64::MIN, f64::max));
    let low = last_low.unwrap_or_else(|| window.iter().map(|b| b.low).fold(f64::MAX, f64::min));
    Some(SwingRange { low, high })
}

/// Projects take-profit levels above `entry` using extension ratios
/// (e.g. 1.272 and 1.618): `entry + range * (ratio - 1)`.
pub fn extension_targets(entry: f64, swing: SwingRange, ratio1: f64, ratio2: f64) -> Option<(f64, f64)> {
    let range = swing.range();
    if range <= 0.0 {
        return None;
    }
    Some((entry + range * (ratio1 - 1.0), entry + range * (ratio2 - 1.0)))
}
