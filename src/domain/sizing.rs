//! Fixed-fractional position sizing.
//!
//! shares = floor(equity * risk_pct / (entry - stop)), clipped to what cash
//! can pay for including commission.

use std::collections::HashSet;

use crate::domain::execution::{
    apply_entry_slippage, calculate_commission, max_affordable_shares, total_entry_cost,
    ExecutionConfig,
};
use crate::domain::portfolio::PortfolioState;
use crate::domain::scanner::Signal;
use crate::domain::settings::RiskParams;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SizingError {
    #[error("stop {stop:.3} is not below entry {entry:.3}")]
    InvalidRisk { entry: f64, stop: f64 },

    #[error("targets {target1:.3}/{target2:.3} do not ascend above entry {entry:.3}")]
    InvalidTargets {
        entry: f64,
        target1: f64,
        target2: f64,
    },

    #[error("max positions ({0}) reached")]
    MaxPositions(usize),

    #[error("already holding {0}")]
    AlreadyHolding(String),

    #[error("insufficient funds: {cash:.2} cash buys no shares at {price:.3}")]
    InsufficientFunds { cash: f64, price: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub shares: u64,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target1_price: f64,
    pub target2_price: f64,
}

impl Order {
    pub fn cost(&self, execution: &ExecutionConfig) -> f64 {
        total_entry_cost(self.shares, self.entry_price, execution)
    }

    pub fn commission(&self, execution: &ExecutionConfig) -> f64 {
        calculate_commission(self.shares as f64 * self.entry_price, execution)
    }
}

/// Sizes one signal against the current portfolio. `equity` is the
/// mark-to-market equity used for the risk budget.
pub fn size_signal(
    signal: &Signal,
    portfolio: &PortfolioState,
    equity: f64,
    risk: &RiskParams,
    execution: &ExecutionConfig,
) -> Result<Order, SizingError> {
    if portfolio.has_position(&signal.symbol) {
        return Err(SizingError::AlreadyHolding(signal.symbol.clone()));
    }
    if portfolio.position_count() >= risk.max_positions {
        return Err(SizingError::MaxPositions(risk.max_positions));
    }
    size_shares(signal, portfolio.cash, equity, risk.risk_pct, execution)
}

fn size_shares(
    signal: &Signal,
    cash: f64,
    equity: f64,
    risk_pct: f64,
    execution: &ExecutionConfig,
) -> Result<Order, SizingError> {
    let entry = apply_entry_slippage(signal.trigger_price, execution.slippage_pct);
    let risk_per_share = entry - signal.stop_price;
    if risk_per_share <= 0.0 {
        return Err(SizingError::InvalidRisk {
            entry,
            stop: signal.stop_price,
        });
    }
    if signal.target1_price <= entry || signal.target2_price <= signal.target1_price {
        return Err(SizingError::InvalidTargets {
            entry,
            target1: signal.target1_price,
            target2: signal.target2_price,
        });
    }

    let by_risk = (equity * risk_pct / risk_per_share).floor().max(0.0) as u64;
    let shares = by_risk.min(max_affordable_shares(cash, entry, execution));
    if shares == 0 {
        return Err(SizingError::InsufficientFunds { cash, price: entry });
    }

    Ok(Order {
        symbol: signal.symbol.clone(),
        shares,
        entry_price: entry,
        stop_price: signal.stop_price,
        target1_price: signal.target1_price,
        target2_price: signal.target2_price,
    })
}

/// Dry-run of a cycle's entries: sizes ranked signals one after another
/// against a cash pool that shrinks with every accepted order.
pub fn plan_orders(
    signals: &[Signal],
    portfolio: &PortfolioState,
    equity: f64,
    risk: &RiskParams,
    execution: &ExecutionConfig,
) -> (Vec<Order>, Vec<(String, SizingError)>) {
    let mut cash = portfolio.cash;
    let mut held: HashSet<String> = portfolio.held_symbols().into_iter().collect();
    let mut open_count = portfolio.position_count();
    let mut orders = Vec::new();
    let mut rejected = Vec::new();

    for signal in signals {
        let decision = if held.contains(&signal.symbol) {
            Err(SizingError::AlreadyHolding(signal.symbol.clone()))
        } else if open_count >= risk.max_positions {
            Err(SizingError::MaxPositions(risk.max_positions))
        } else {
            size_shares(signal, cash, equity, risk.risk_pct, execution)
        };

        match decision {
            Ok(order) => {
                cash -= order.cost(execution);
                open_count += 1;
                held.insert(order.symbol.clone());
                orders.push(order);
            }
            Err(e) => rejected.push((signal.symbol.clone(), e)),
        }
    }

    (orders, rejected)
}
