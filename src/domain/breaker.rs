//! Circuit breaker: pauses new entries after heavy losses.

use chrono::NaiveDate;
use std::fmt;

use crate::domain::position::Trade;
use crate::domain::settings::RiskParams;

#[derive(Debug, Clone, PartialEq)]
pub enum BreakerTrip {
    Drawdown { pct: f64, limit: f64 },
    DailyLoss { pct: f64, limit: f64 },
}

impl fmt::Display for BreakerTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerTrip::Drawdown { pct, limit } => {
                write!(f, "portfolio drawdown {:.1}% exceeds limit {}%", pct, limit)
            }
            BreakerTrip::DailyLoss { pct, limit } => {
                write!(f, "daily loss {:.1}% exceeds limit {}%", pct, limit)
            }
        }
    }
}

/// Realized P&L of trades closed on `day`.
pub fn realized_on(trades: &[Trade], day: NaiveDate) -> f64 {
    trades
        .iter()
        .filter(|t| t.close_timestamp.date() == day)
        .map(|t| t.realized_pnl)
        .sum()
}

/// Trips on drawdown from starting cash, or on the day's realized loss as a
/// share of current equity.
pub fn check_breaker(
    starting_cash: f64,
    equity: f64,
    trades: &[Trade],
    today: NaiveDate,
    risk: &RiskParams,
) -> Option<BreakerTrip> {
    if starting_cash > 0.0 {
        let drawdown = (starting_cash - equity) / starting_cash * 100.0;
        if drawdown >= risk.max_drawdown_pct {
            return Some(BreakerTrip::Drawdown {
                pct: drawdown,
                limit: risk.max_drawdown_pct,
            });
        }
    }

    let daily = realized_on(trades, today);
    if daily < 0.0 && equity > 0.0 {
        let loss = -daily / equity * 100.0;
        if loss >= risk.daily_loss_limit_pct {
            return Some(BreakerTrip::DailyLoss {
                pct: loss,
                limit: risk.daily_loss_limit_pct,
            });
        }
    }
    None
}
