//! Portfolio ledger: the only writer of `PortfolioState`.
//!
//! Every mutation is computed on a copy of the state, committed to the store
//! in one transaction, and swapped into memory only after the commit
//! succeeds. A failed operation leaves both memory and storage untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{error, info};

use crate::domain::error::SwingError;
use crate::domain::execution::{calculate_commission, ExecutionConfig};
use crate::domain::monitor::ExitInstruction;
use crate::domain::portfolio::{EquitySnapshot, PortfolioState};
use crate::domain::position::{ExitReason, Position, PositionStatus, Trade};
use crate::domain::sizing::Order;
use crate::ports::ledger_store::{AccountRow, LedgerChange, LedgerStore};

/// Absolute tolerance for equity and cash checks.
pub const AUDIT_TOLERANCE: f64 = 0.01;

pub struct Ledger {
    state: PortfolioState,
    store: Arc<dyn LedgerStore>,
    execution: ExecutionConfig,
}

impl Ledger {
    /// Recovers the ledger from `store`, seeding it with `starting_cash` on
    /// first use.
    pub fn load(
        store: Arc<dyn LedgerStore>,
        starting_cash: f64,
        execution: ExecutionConfig,
    ) -> Result<Self, SwingError> {
        let state = match store.load()? {
            Some(stored) => {
                let state = stored.into_state();
                info!(
                    cash = state.cash,
                    positions = state.position_count(),
                    "ledger recovered"
                );
                state
            }
            None => {
                let state = PortfolioState::new(starting_cash);
                store.commit(&LedgerChange {
                    account: AccountRow::from(&state),
                    position: None,
                    trade: None,
                    snapshot: None,
                })?;
                info!(cash = starting_cash, "ledger initialized");
                state
            }
        };

        Ok(Ledger {
            state,
            store,
            execution,
        })
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn execution(&self) -> &ExecutionConfig {
        &self.execution
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    fn apply(
        &mut self,
        next: PortfolioState,
        position: Option<Position>,
        trade: Option<Trade>,
    ) -> Result<(), SwingError> {
        self.commit(next, position, trade, None)
    }

    fn commit(
        &mut self,
        next: PortfolioState,
        position: Option<Position>,
        trade: Option<Trade>,
        snapshot: Option<EquitySnapshot>,
    ) -> Result<(), SwingError> {
        self.store.commit(&LedgerChange {
            account: AccountRow::from(&next),
            position,
            trade,
            snapshot,
        })?;
        self.state = next;
        Ok(())
    }

    pub fn open(&mut self, order: &Order, timestamp: NaiveDateTime) -> Result<Position, SwingError> {
        if order.shares == 0 {
            return Err(SwingError::InvalidQuantity {
                reason: format!("cannot open {} with zero shares", order.symbol),
            });
        }
        if !(order.entry_price > 0.0) {
            return Err(SwingError::InvalidQuantity {
                reason: format!("entry price {} must be positive", order.entry_price),
            });
        }
        if self.state.has_position(&order.symbol) {
            return Err(SwingError::AlreadyHolding {
                symbol: order.symbol.clone(),
            });
        }

        let value = order.shares as f64 * order.entry_price;
        let commission = calculate_commission(value, &self.execution);
        let cost = value + commission;
        if cost > self.state.cash {
            return Err(SwingError::InsufficientFunds {
                required: cost,
                available: self.state.cash,
            });
        }

        let mut next = self.state.clone();
        let position = Position {
            id: next.next_position_id,
            symbol: order.symbol.clone(),
            open_timestamp: timestamp,
            entry_price: order.entry_price,
            entry_commission: commission,
            total_shares: order.shares,
            remaining_shares: order.shares,
            stop_price: order.stop_price,
            target1_price: order.target1_price,
            target2_price: order.target2_price,
            target1_filled: false,
            target1_date: None,
            status: PositionStatus::Open,
        };
        next.next_position_id += 1;
        next.cash -= cost;
        next.open_positions.insert(position.id, position.clone());

        self.apply(next, Some(position.clone()), None)?;
        info!(
            position_id = position.id,
            symbol = %position.symbol,
            shares = position.total_shares,
            price = position.entry_price,
            stop = position.stop_price,
            "position opened"
        );
        Ok(position)
    }

    /// Closes `shares` of a position. A target 1 fill is dated by
    /// `timestamp`; the monitor uses `apply_exit` to date it by its bar.
    pub fn close_partial(
        &mut self,
        position_id: u64,
        shares: u64,
        exit_price: f64,
        reason: ExitReason,
        timestamp: NaiveDateTime,
    ) -> Result<Trade, SwingError> {
        self.close(position_id, shares, exit_price, reason, timestamp, timestamp.date())
    }

    pub fn apply_exit(
        &mut self,
        exit: &ExitInstruction,
        timestamp: NaiveDateTime,
    ) -> Result<Trade, SwingError> {
        self.close(
            exit.position_id,
            exit.shares,
            exit.price,
            exit.reason,
            timestamp,
            exit.bar_date,
        )
    }

    fn close(
        &mut self,
        position_id: u64,
        shares: u64,
        exit_price: f64,
        reason: ExitReason,
        timestamp: NaiveDateTime,
        bar_date: NaiveDate,
    ) -> Result<Trade, SwingError> {
        let position = self
            .state
            .get_position(position_id)
            .filter(|p| p.is_active())
            .ok_or(SwingError::UnknownPosition { id: position_id })?;

        if shares == 0 || shares > position.remaining_shares {
            return Err(SwingError::InvalidQuantity {
                reason: format!(
                    "cannot close {} of {} remaining shares in #{}",
                    shares, position.remaining_shares, position_id
                ),
            });
        }
        if !(exit_price > 0.0) {
            return Err(SwingError::InvalidQuantity {
                reason: format!("exit price {} must be positive", exit_price),
            });
        }

        let value = shares as f64 * exit_price;
        let exit_commission = calculate_commission(value, &self.execution);
        let entry_share = position.entry_commission * shares as f64 / position.total_shares as f64;
        let proceeds = value - exit_commission;
        let realized = shares as f64 * (exit_price - position.entry_price) - exit_commission - entry_share;

        let mut next = self.state.clone();
        if next.cash + proceeds < 0.0 {
            return Err(SwingError::InsufficientFunds {
                required: -proceeds,
                available: next.cash,
            });
        }

        let mut updated = position.clone();
        updated.remaining_shares -= shares;
        if reason == ExitReason::Target1 && !updated.target1_filled {
            updated.target1_filled = true;
            updated.target1_date = Some(bar_date);
        }
        updated.status = if updated.remaining_shares == 0 {
            PositionStatus::Closed
        } else {
            PositionStatus::PartiallyClosed
        };

        let trade = Trade {
            position_id,
            symbol: updated.symbol.clone(),
            open_timestamp: updated.open_timestamp,
            close_timestamp: timestamp,
            shares_closed: shares,
            entry_price: updated.entry_price,
            exit_price,
            exit_reason: reason,
            realized_pnl: realized,
        };

        next.cash += proceeds;
        next.realized_pnl_total += realized;
        if updated.status == PositionStatus::Closed {
            next.open_positions.remove(&position_id);
        } else {
            next.open_positions.insert(position_id, updated.clone());
        }

        self.apply(next, Some(updated), Some(trade.clone()))?;
        info!(
            position_id,
            symbol = %trade.symbol,
            shares,
            price = exit_price,
            reason = %reason,
            pnl = realized,
            "position reduced"
        );
        Ok(trade)
    }

    /// Raises the stop of an active position. Lowering it is rejected.
    pub fn adjust_stop(&mut self, position_id: u64, new_stop: f64) -> Result<Position, SwingError> {
        let position = self
            .state
            .get_position(position_id)
            .filter(|p| p.is_active())
            .ok_or(SwingError::UnknownPosition { id: position_id })?;

        if !new_stop.is_finite() || new_stop < position.stop_price {
            return Err(SwingError::InvalidQuantity {
                reason: format!(
                    "stop for #{} may only rise: {:.3} -> {:.3}",
                    position_id, position.stop_price, new_stop
                ),
            });
        }
        if new_stop == position.stop_price {
            return Ok(position.clone());
        }

        let mut updated = position.clone();
        let old_stop = updated.stop_price;
        updated.stop_price = new_stop;
        let mut next = self.state.clone();
        next.open_positions.insert(position_id, updated.clone());

        self.apply(next, Some(updated.clone()), None)?;
        info!(
            position_id,
            symbol = %updated.symbol,
            from = old_stop,
            to = new_stop,
            "stop raised"
        );
        Ok(updated)
    }

    /// Cash plus open positions marked at `prices`, entry price when missing.
    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        self.state.total_equity(prices)
    }

    /// Read-only self-check of the equity and cash invariants.
    pub fn audit(&self, prices: &HashMap<String, f64>, reported_equity: f64) -> Result<(), SwingError> {
        let computed = self.equity(prices);
        if (computed - reported_equity).abs() > AUDIT_TOLERANCE {
            return Err(self.violation(format!(
                "equity {:.2} does not match cash plus positions {:.2}",
                reported_equity, computed
            )));
        }
        let expected_cash = self.state.expected_cash();
        if (self.state.cash - expected_cash).abs() > AUDIT_TOLERANCE {
            return Err(self.violation(format!(
                "cash {:.2} does not match start + realized - held cost {:.2}",
                self.state.cash, expected_cash
            )));
        }
        if self.state.cash < -AUDIT_TOLERANCE {
            return Err(self.violation(format!("cash is negative: {:.2}", self.state.cash)));
        }
        Ok(())
    }

    fn violation(&self, reason: String) -> SwingError {
        error!(%reason, "ledger audit failed");
        SwingError::InvariantViolation { reason }
    }

    /// Marks equity to `prices` and appends one point to the equity curve.
    pub fn record_snapshot(
        &mut self,
        timestamp: NaiveDateTime,
        prices: &HashMap<String, f64>,
    ) -> Result<EquitySnapshot, SwingError> {
        let positions_value = self.state.positions_value(prices);
        let snapshot = EquitySnapshot {
            timestamp,
            equity: self.state.cash + positions_value,
            cash: self.state.cash,
            positions_value,
        };

        let mut next = self.state.clone();
        next.equity = snapshot.equity;
        self.commit(next, None, None, Some(snapshot.clone()))?;
        Ok(snapshot)
    }

    /// Wipes positions and history and restarts from `starting_cash`.
    pub fn reset(&mut self, starting_cash: f64, timestamp: NaiveDateTime) -> Result<(), SwingError> {
        if !(starting_cash > 0.0) {
            return Err(SwingError::InvalidQuantity {
                reason: format!("starting cash {} must be positive", starting_cash),
            });
        }
        let next = PortfolioState::new(starting_cash);
        self.store.reset(&AccountRow::from(&next))?;
        self.state = next;
        self.store.append_snapshot(&EquitySnapshot {
            timestamp,
            equity: starting_cash,
            cash: starting_cash,
            positions_value: 0.0,
        })?;
        info!(cash = starting_cash, "ledger reset");
        Ok(())
    }
}
