//! Pullback-reclaim signal scanner.
//!
//! A symbol qualifies when its trend is up (close and fast EMA above the slow
//! EMA), the previous close sat at or below the fast EMA, the latest close
//! reclaimed it, and the DeMarker oscillator bounced from below the low
//! threshold to above the high threshold across those two bars.

use chrono::NaiveDate;

use crate::domain::bar::PriceBar;
use crate::domain::indicator::demarker::calculate_demarker;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::swing::{extension_targets, find_swing_range};
use crate::domain::settings::ScannerParams;

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub date: NaiveDate,
    pub trigger_price: f64,
    pub stop_price: f64,
    pub target1_price: f64,
    pub target2_price: f64,
    pub fast_ema: f64,
    pub slow_ema: f64,
    pub oscillator: f64,
    pub swing_low: f64,
    pub swing_high: f64,
}

impl Signal {
    /// (target2 - trigger) / (trigger - stop); zero when the risk is not positive.
    pub fn reward_risk(&self) -> f64 {
        let risk = self.trigger_price - self.stop_price;
        if risk <= 0.0 {
            return 0.0;
        }
        (self.target2_price - self.trigger_price) / risk
    }
}

/// Evaluates the latest bar of an ordered series. Returns `None` when any
/// condition fails or the indicators are still warming up.
pub fn scan(bars: &[PriceBar], params: &ScannerParams) -> Option<Signal> {
    if bars.len() < params.min_bars() {
        return None;
    }

    let fast = calculate_ema(bars, params.fast_period);
    let slow = calculate_ema(bars, params.slow_period);
    let oscillator = calculate_demarker(bars, params.oscillator_period);

    let latest = bars.len() - 1;
    let prior = latest - 1;

    let fast_now = fast.value_at(latest)?;
    let fast_prev = fast.value_at(prior)?;
    let slow_now = slow.value_at(latest)?;
    let osc_now = oscillator.value_at(latest)?;
    let osc_prev = oscillator.value_at(prior)?;

    let close_now = bars[latest].close;
    let close_prev = bars[prior].close;

    let in_trend = close_now > slow_now;
    let aligned = fast_now > slow_now;
    let reclaimed = close_prev <= fast_prev && close_now > fast_now;
    let bounced = osc_prev < params.oscillator_low && osc_now > params.oscillator_high;

    if !(in_trend && aligned && reclaimed && bounced) {
        return None;
    }

    let swing = find_swing_range(bars, params.swing_lookback, params.pivot_bars)?;
    let (target1, target2) = extension_targets(
        close_now,
        swing,
        params.target1_extension,
        params.target2_extension,
    )?;

    Some(Signal {
        symbol: bars[latest].symbol.clone(),
        date: bars[latest].date,
        trigger_price: close_now,
        stop_price: slow_now,
        target1_price: target1,
        target2_price: target2,
        fast_ema: fast_now,
        slow_ema: slow_now,
        oscillator: osc_now,
        swing_low: swing.low,
        swing_high: swing.high,
    })
}

/// Orders candidates best reward-to-risk first, ties by symbol.
pub fn rank_signals(signals: &mut [Signal]) {
    signals.sort_by(|a, b| {
        b.reward_risk()
            .total_cmp(&a.reward_risk())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
