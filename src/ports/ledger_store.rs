//! Persistence port for the portfolio ledger.

use crate::domain::error::SwingError;
use crate::domain::portfolio::{EquitySnapshot, PortfolioState};
use crate::domain::position::{Position, Trade};

/// The single account row.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRow {
    pub starting_cash: f64,
    pub cash: f64,
    pub equity: f64,
    pub realized_pnl_total: f64,
    pub next_position_id: u64,
}

impl From<&PortfolioState> for AccountRow {
    fn from(state: &PortfolioState) -> Self {
        AccountRow {
            starting_cash: state.starting_cash,
            cash: state.cash,
            equity: state.equity,
            realized_pnl_total: state.realized_pnl_total,
            next_position_id: state.next_position_id,
        }
    }
}

/// One ledger mutation. A store applies all parts or none.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerChange {
    pub account: AccountRow,
    pub position: Option<Position>,
    pub trade: Option<Trade>,
    pub snapshot: Option<EquitySnapshot>,
}

/// What a store hands back on startup: the account plus active positions.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLedger {
    pub account: AccountRow,
    pub open_positions: Vec<Position>,
}

impl StoredLedger {
    pub fn into_state(self) -> PortfolioState {
        let mut state = PortfolioState::new(self.account.starting_cash);
        state.cash = self.account.cash;
        state.equity = self.account.equity;
        state.realized_pnl_total = self.account.realized_pnl_total;
        state.next_position_id = self.account.next_position_id;
        for position in self.open_positions.into_iter().filter(|p| p.is_active()) {
            state.next_position_id = state.next_position_id.max(position.id + 1);
            state.open_positions.insert(position.id, position);
        }
        state
    }
}

pub trait LedgerStore: Send + Sync {
    /// `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<StoredLedger>, SwingError>;

    /// Applies the change in one transaction.
    fn commit(&self, change: &LedgerChange) -> Result<(), SwingError>;

    fn append_snapshot(&self, snapshot: &EquitySnapshot) -> Result<(), SwingError>;

    fn trades(&self) -> Result<Vec<Trade>, SwingError>;

    /// Every position ever opened, closed ones included, by id.
    fn positions(&self) -> Result<Vec<Position>, SwingError>;

    fn snapshots(&self) -> Result<Vec<EquitySnapshot>, SwingError>;

    /// Drops all history and stores `account` as the only state.
    fn reset(&self, account: &AccountRow) -> Result<(), SwingError>;
}
