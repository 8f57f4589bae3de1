//! Exit rules for open positions.
//!
//! Priority on every bar: stop, then target 1 (a fraction of the original
//! size), then target 2 (everything left). Rules are re-applied to the same
//! bar until none fires, so a gap through both targets fills both.
//!
//! Stops only move between bars. `ratchet_stop` uses the previous bar's
//! fast EMA and takes effect from the bar after the target 1 fill, so
//! re-running a bar never sees a stop it raised itself.

use chrono::NaiveDate;

use crate::domain::bar::PriceBar;
use crate::domain::execution::round_price;
use crate::domain::position::{ExitReason, Position};
use crate::domain::settings::MonitorParams;

#[derive(Debug, Clone, PartialEq)]
pub struct ExitInstruction {
    pub position_id: u64,
    pub shares: u64,
    pub price: f64,
    pub reason: ExitReason,
    pub bar_date: NaiveDate,
}

/// Exits the bar triggers for `position`. Target 1 sells `target1_fraction`
/// of the original size, at least one share, capped at what is left. A bar
/// that opens below the stop fills the stop at the open.
pub fn evaluate(position: &Position, bar: &PriceBar, params: &MonitorParams) -> Vec<ExitInstruction> {
    let mut exits = Vec::new();
    if !position.is_active() {
        return exits;
    }

    let mut remaining = position.remaining_shares;
    let mut target1_filled = position.target1_filled;

    while remaining > 0 {
        let (shares, price, reason) = if bar.low <= position.stop_price {
            (remaining, position.stop_price.min(bar.open), ExitReason::Stop)
        } else if !target1_filled && bar.high >= position.target1_price {
            let portion = (position.total_shares as f64 * params.target1_fraction).floor() as u64;
            target1_filled = true;
            (portion.max(1).min(remaining), position.target1_price, ExitReason::Target1)
        } else if target1_filled && bar.high >= position.target2_price {
            (remaining, position.target2_price, ExitReason::Target2)
        } else {
            break;
        };

        exits.push(ExitInstruction {
            position_id: position.id,
            shares,
            price,
            reason,
            bar_date: bar.date,
        });
        remaining -= shares;
    }

    exits
}

/// Stop to use on the bar dated `bar_date`, if it rises. Once target 1
/// filled on an earlier bar the stop moves to breakeven and, with trailing
/// enabled, to `prior_fast_ema` less the buffer. `prior_fast_ema` is the
/// fast EMA at the close before `bar_date`.
pub fn ratchet_stop(
    position: &Position,
    bar_date: NaiveDate,
    prior_fast_ema: Option<f64>,
    params: &MonitorParams,
) -> Option<f64> {
    let after_target1 = position.target1_filled && position.target1_date.map_or(true, |d| d < bar_date);
    if !position.is_active() || !after_target1 {
        return None;
    }

    let mut candidate = position.entry_price;
    if params.trailing_stop_enabled {
        if let Some(fast) = prior_fast_ema {
            candidate = candidate.max(round_price(fast * (1.0 - params.trailing_buffer_pct / 100.0)));
        }
    }
    (candidate > position.stop_price).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::PositionStatus;
    use chrono::NaiveDate;

    fn position(total: u64, remaining: u64, target1_filled: bool) -> Position {
        Position {
            id: 7,
            symbol: "CSL.AX".into(),
            open_timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(16, 0, 0)
                .unwrap(),
            entry_price: 100.0,
            entry_commission: 10.0,
            total_shares: total,
            remaining_shares: remaining,
            stop_price: 95.0,
            target1_price: 110.0,
            target2_price: 120.0,
            target1_filled,
            target1_date: target1_filled.then(|| NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            status: if remaining == total {
                PositionStatus::Open
            } else {
                PositionStatus::PartiallyClosed
            },
        }
    }

    fn bar(high: f64, low: f64) -> PriceBar {
        PriceBar {
            symbol: "CSL.AX".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 1,
        }
    }

    fn apply(position: &mut Position, exits: &[ExitInstruction]) {
        for exit in exits {
            position.remaining_shares -= exit.shares;
            if exit.reason == ExitReason::Target1 {
                position.target1_filled = true;
            }
        }
        if position.remaining_shares == 0 {
            position.status = PositionStatus::Closed;
        }
    }

    #[test]
    fn quiet_bar_does_nothing() {
        assert!(evaluate(&position(100, 100, false), &bar(105.0, 98.0), &MonitorParams::default()).is_empty());
    }

    #[test]
    fn stop_beats_target_on_the_same_bar() {
        let exits = evaluate(&position(100, 100, false), &bar(125.0, 90.0), &MonitorParams::default());
        assert_eq!(
            exits,
            vec![ExitInstruction {
                position_id: 7,
                shares: 100,
                price: 95.0,
                reason: ExitReason::Stop,
                bar_date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            }]
        );
    }

    #[test]
    fn target1_sells_quarter_of_original() {
        let exits = evaluate(&position(100, 100, false), &bar(112.0, 101.0), &MonitorParams::default());
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::Target1);
        assert_eq!(exits[0].shares, 25);
        assert_eq!(exits[0].price, 110.0);
    }

    #[test]
    fn target1_minimum_one_share() {
        let exits = evaluate(&position(3, 3, false), &bar(112.0, 101.0), &MonitorParams::default());
        assert_eq!(exits[0].shares, 1);
    }

    #[test]
    fn target2_closes_remainder() {
        let exits = evaluate(&position(100, 75, true), &bar(121.0, 111.0), &MonitorParams::default());
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::Target2);
        assert_eq!(exits[0].shares, 75);
    }

    #[test]
    fn gap_through_both_targets_fills_both() {
        let exits = evaluate(&position(100, 100, false), &bar(130.0, 115.0), &MonitorParams::default());
        let reasons: Vec<ExitReason> = exits.iter().map(|e| e.reason).collect();
        assert_eq!(reasons, vec![ExitReason::Target1, ExitReason::Target2]);
        assert_eq!(exits[0].shares + exits[1].shares, 100);
    }

    #[test]
    fn second_pass_is_idempotent() {
        let params = MonitorParams::default();
        for b in [bar(112.0, 101.0), bar(130.0, 115.0), bar(125.0, 90.0), bar(105.0, 98.0)] {
            let mut pos = position(100, 100, false);
            let first = evaluate(&pos, &b, &params);
            apply(&mut pos, &first);
            assert!(evaluate(&pos, &b, &params).is_empty());
        }
    }

    #[test]
    fn closed_positions_are_skipped() {
        let mut pos = position(100, 0, true);
        pos.status = PositionStatus::Closed;
        assert!(evaluate(&pos, &bar(200.0, 1.0), &MonitorParams::default()).is_empty());
    }

    #[test]
    fn gap_below_stop_fills_at_the_open() {
        let mut gap = bar(92.0, 88.0);
        gap.open = 91.0;
        let exits = evaluate(&position(100, 75, true), &gap, &MonitorParams::default());
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].reason, ExitReason::Stop);
        assert_eq!(exits[0].price, 91.0);
        assert!(exits[0].price <= gap.high);
    }

    #[test]
    fn ratchet_waits_for_the_bar_after_target1() {
        let params = MonitorParams::default();
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();

        assert_eq!(ratchet_stop(&position(100, 100, false), day(8), Some(105.0), &params), None);

        // Target 1 filled on the 5th: same bar leaves the stop alone.
        let filled = position(100, 75, true);
        assert_eq!(ratchet_stop(&filled, day(5), Some(105.0), &params), None);

        let raised = ratchet_stop(&filled, day(8), Some(105.0), &params).unwrap();
        assert!((raised - 104.475).abs() < 1e-9);
    }

    #[test]
    fn ratchet_moves_to_breakeven_at_least() {
        let params = MonitorParams::default();
        let day = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let filled = position(100, 75, true);

        assert_eq!(ratchet_stop(&filled, day, Some(90.0), &params), Some(100.0));
        assert_eq!(ratchet_stop(&filled, day, None, &params), Some(100.0));

        let off = MonitorParams {
            trailing_stop_enabled: false,
            ..params.clone()
        };
        assert_eq!(ratchet_stop(&filled, day, Some(105.0), &off), Some(100.0));

        let mut above = filled.clone();
        above.stop_price = 102.0;
        assert_eq!(ratchet_stop(&above, day, Some(90.0), &params), None);
    }
}
