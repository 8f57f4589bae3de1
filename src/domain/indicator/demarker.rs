//! DeMarker oscillator.
//!
//! DeMax[i] = max(H[i] - H[i-1], 0), DeMin[i] = max(L[i-1] - L[i], 0).
//! DeM[i] = SMA(DeMax, n) / (SMA(DeMax, n) + SMA(DeMin, n)), bounded to [0, 1].
//! Warmup: first n bars are invalid. A flat window (zero denominator) is invalid too.

use crate::domain::bar::PriceBar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn calculate_demarker(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::DeMarker(period));
    }

    let mut de_max = vec![0.0; bars.len()];
    let mut de_min = vec![0.0; bars.len()];
    for i in 1..bars.len() {
        de_max[i] = (bars[i].high - bars[i - 1].high).max(0.0);
        de_min[i] = (bars[i - 1].low - bars[i].low).max(0.0);
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut sum_max = 0.0;
    let mut sum_min = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i >= 1 {
            sum_max += de_max[i];
            sum_min += de_min[i];
        }
        if i > period {
            sum_max -= de_max[i - period];
            sum_min -= de_min[i - period];
        }

        let mut point = IndicatorPoint {
            date: bar.date,
            valid: false,
            value: 0.0,
        };
        if i >= period {
            let avg_max = sum_max / period as f64;
            let avg_min = sum_min / period as f64;
            let denom = avg_max + avg_min;
            if denom > f64::EPSILON {
                point.valid = true;
                point.value = (avg_max / denom).clamp(0.0, 1.0);
            }
        }
        values.push(point);
    }

    IndicatorSeries {
        indicator_type: IndicatorType::DeMarker(period),
        values,
    }
}
