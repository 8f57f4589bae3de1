//! Performance statistics over closed positions and the equity curve.

use std::collections::BTreeMap;

use super::portfolio::EquitySnapshot;
use super::position::{Position, PositionStatus, Trade};

const PERIODS_PER_YEAR: f64 = 252.0;

/// Outcome of one fully closed position, all of its exit lots combined.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub position_id: u64,
    pub symbol: String,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub holding_days: i64,
    pub exits: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    pub positions_won: usize,
    pub positions_lost: usize,
    pub positions_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub net_pnl: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub best: Option<RoundTrip>,
    pub worst: Option<RoundTrip>,
    pub avg_holding_days: f64,
    pub exit_lots: usize,
}

/// Groups the trade log into per-position results for closed positions.
pub fn round_trips(positions: &[Position], trades: &[Trade]) -> Vec<RoundTrip> {
    let mut lots: BTreeMap<u64, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        lots.entry(trade.position_id).or_default().push(trade);
    }

    positions
        .iter()
        .filter(|p| p.status == PositionStatus::Closed)
        .filter_map(|p| {
            let exits = lots.get(&p.id)?;
            let pnl: f64 = exits.iter().map(|t| t.realized_pnl).sum();
            let cost = p.total_shares as f64 * p.entry_price;
            let holding_days = exits.iter().map(|t| t.holding_days()).max().unwrap_or(0);
            Some(RoundTrip {
                position_id: p.id,
                symbol: p.symbol.clone(),
                pnl,
                pnl_pct: if cost > 0.0 { pnl / cost * 100.0 } else { 0.0 },
                holding_days,
                exits: exits.len(),
            })
        })
        .collect()
}

impl Metrics {
    pub fn compute(
        starting_cash: f64,
        positions: &[Position],
        trades: &[Trade],
        snapshots: &[EquitySnapshot],
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = snapshots.last().map(|s| s.equity).unwrap_or(starting_cash);
        let total_return = if starting_cash > 0.0 {
            (final_equity - starting_cash) / starting_cash
        } else {
            0.0
        };

        let years = snapshots.len() as f64 / PERIODS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let equity: Vec<f64> = snapshots.iter().map(|s| s.equity).collect();
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&equity);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&equity, risk_free_rate / PERIODS_PER_YEAR);

        let trips = round_trips(positions, trades);
        let wins: Vec<&RoundTrip> = trips.iter().filter(|t| t.pnl > 0.0).collect();
        let losses: Vec<&RoundTrip> = trips.iter().filter(|t| t.pnl < 0.0).collect();
        let positions_breakeven = trips.len() - wins.len() - losses.len();

        let gross_wins: f64 = wins.iter().map(|t| t.pnl).sum();
        let gross_losses: f64 = losses.iter().map(|t| t.pnl.abs()).sum();

        let profit_factor = if gross_losses > 0.0 {
            gross_wins / gross_losses
        } else if gross_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let mean = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        let best = trips
            .iter()
            .max_by(|a, b| a.pnl.total_cmp(&b.pnl))
            .cloned();
        let worst = trips
            .iter()
            .min_by(|a, b| a.pnl.total_cmp(&b.pnl))
            .cloned();

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            positions_won: wins.len(),
            positions_lost: losses.len(),
            positions_breakeven,
            win_rate: if trips.is_empty() {
                0.0
            } else {
                wins.len() as f64 / trips.len() as f64
            },
            profit_factor,
            net_pnl: gross_wins - gross_losses,
            avg_win: mean(&wins.iter().map(|t| t.pnl).collect::<Vec<_>>()),
            avg_loss: mean(&losses.iter().map(|t| t.pnl.abs()).collect::<Vec<_>>()),
            avg_win_pct: mean(&wins.iter().map(|t| t.pnl_pct).collect::<Vec<_>>()),
            avg_loss_pct: mean(&losses.iter().map(|t| t.pnl_pct).collect::<Vec<_>>()),
            best,
            worst,
            avg_holding_days: mean(
                &trips
                    .iter()
                    .map(|t| t.holding_days as f64)
                    .collect::<Vec<_>>(),
            ),
            exit_lots: trades.len(),
        }
    }
}

/// Largest peak-to-trough fall as a fraction, and the longest run of points
/// spent under a prior peak.
fn compute_drawdown(equity: &[f64]) -> (f64, i64) {
    let Some(&first) = equity.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0i64;
    let mut duration = 0i64;

    for &value in equity {
        if value > peak {
            peak = value;
            duration = 0;
        } else if peak > 0.0 && value < peak {
            max_dd = max_dd.max((peak - value) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(equity: &[f64], period_rf: f64) -> (f64, f64) {
    if equity.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let excess = mean - period_rf;

    let sharpe = if stddev > 0.0 {
        excess / stddev * PERIODS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside = (returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let sortino = if downside > 0.0 {
        excess / downside * PERIODS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::ExitReason;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: i64) -> NaiveDateTime {
        (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day))
            .and_hms_opt(16, 0, 0)
            .unwrap()
    }

    fn closed(id: u64, symbol: &str) -> Position {
        Position {
            id,
            symbol: symbol.into(),
            open_timestamp: at(0),
            entry_price: 10.0,
            entry_commission: 10.0,
            total_shares: 100,
            remaining_shares: 0,
            stop_price: 9.0,
            target1_price: 11.0,
            target2_price: 12.0,
            target1_filled: true,
            target1_date: None,
            status: PositionStatus::Closed,
        }
    }

    fn lot(id: u64, pnl: f64, day: i64) -> Trade {
        Trade {
            position_id: id,
            symbol: format!("S{id}.AX"),
            open_timestamp: at(0),
            close_timestamp: at(day),
            shares_closed: 50,
            entry_price: 10.0,
            exit_price: 10.0,
            exit_reason: ExitReason::Target1,
            realized_pnl: pnl,
        }
    }

    fn snapshots(values: &[f64]) -> Vec<EquitySnapshot> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquitySnapshot {
                timestamp: at(i as i64),
                equity,
                cash: equity,
                positions_value: 0.0,
            })
            .collect()
    }

    #[test]
    fn empty_history() {
        let m = Metrics::compute(100_000.0, &[], &[], &[], 0.0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.positions_won, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert!(m.best.is_none());
    }

    #[test]
    fn lots_combine_per_position() {
        let positions = vec![closed(1, "BHP.AX"), closed(2, "CBA.AX"), closed(3, "WES.AX")];
        let trades = vec![
            lot(1, 40.0, 3),
            lot(1, 60.0, 8),
            lot(2, -50.0, 2),
            lot(3, 200.0, 10),
        ];
        let m = Metrics::compute(100_000.0, &positions, &trades, &snapshots(&[100_000.0, 100_250.0]), 0.0);

        assert_eq!(m.positions_won, 2);
        assert_eq!(m.positions_lost, 1);
        assert!((m.win_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.profit_factor - 6.0).abs() < 1e-9);
        assert!((m.net_pnl - 250.0).abs() < 1e-9);
        assert!((m.avg_win - 150.0).abs() < 1e-9);
        assert!((m.avg_loss - 50.0).abs() < 1e-9);
        // pnl / (100 shares * $10)
        assert!((m.avg_win_pct - 15.0).abs() < 1e-9);
        assert!((m.avg_loss_pct + 5.0).abs() < 1e-9);
        assert_eq!(m.best.as_ref().unwrap().symbol, "WES.AX");
        assert_eq!(m.worst.as_ref().unwrap().symbol, "CBA.AX");
        assert!((m.avg_holding_days - (8.0 + 2.0 + 10.0) / 3.0).abs() < 1e-9);
        assert_eq!(m.exit_lots, 4);
        assert!((m.total_return - 0.0025).abs() < 1e-12);
    }

    #[test]
    fn open_positions_are_not_round_trips() {
        let mut open = closed(1, "BHP.AX");
        open.status = PositionStatus::PartiallyClosed;
        open.remaining_shares = 50;
        assert!(round_trips(&[open], &[lot(1, 40.0, 3)]).is_empty());
    }

    #[test]
    fn drawdown_depth_and_duration() {
        let (dd, duration) = compute_drawdown(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0, 120.0]);
        assert!((dd - 30.0 / 110.0).abs() < 1e-9);
        assert_eq!(duration, 4);
    }

    #[test]
    fn steady_growth_has_positive_sharpe() {
        let equity: Vec<f64> = (0..100).map(|i| 100_000.0 * (1.0 + 0.001 * i as f64)).collect();
        let (sharpe, sortino) = compute_risk_adjusted(&equity, 0.0);
        assert!(sharpe > 0.0);
        assert_eq!(sortino, 0.0);
    }
}
