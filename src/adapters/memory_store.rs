//! In-memory ledger store for backtests and tests.

use parking_lot::Mutex;

use crate::domain::error::SwingError;
use crate::domain::portfolio::EquitySnapshot;
use crate::domain::position::{Position, Trade};
use crate::ports::ledger_store::{AccountRow, LedgerChange, LedgerStore, StoredLedger};

#[derive(Debug, Default)]
struct Tables {
    account: Option<AccountRow>,
    positions: Vec<Position>,
    trades: Vec<Trade>,
    snapshots: Vec<EquitySnapshot>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredLedger>, SwingError> {
        let tables = self.tables.lock();
        Ok(tables.account.clone().map(|account| StoredLedger {
            account,
            open_positions: tables
                .positions
                .iter()
                .filter(|p| p.is_active())
                .cloned()
                .collect(),
        }))
    }

    fn commit(&self, change: &LedgerChange) -> Result<(), SwingError> {
        let mut tables = self.tables.lock();
        tables.account = Some(change.account.clone());
        if let Some(position) = &change.position {
            match tables.positions.iter_mut().find(|p| p.id == position.id) {
                Some(existing) => *existing = position.clone(),
                None => tables.positions.push(position.clone()),
            }
        }
        if let Some(trade) = &change.trade {
            tables.trades.push(trade.clone());
        }
        if let Some(snapshot) = &change.snapshot {
            tables.snapshots.push(snapshot.clone());
        }
        Ok(())
    }

    fn append_snapshot(&self, snapshot: &EquitySnapshot) -> Result<(), SwingError> {
        self.tables.lock().snapshots.push(snapshot.clone());
        Ok(())
    }

    fn trades(&self) -> Result<Vec<Trade>, SwingError> {
        Ok(self.tables.lock().trades.clone())
    }

    fn positions(&self) -> Result<Vec<Position>, SwingError> {
        let mut positions = self.tables.lock().positions.clone();
        positions.sort_by_key(|p| p.id);
        Ok(positions)
    }

    fn snapshots(&self) -> Result<Vec<EquitySnapshot>, SwingError> {
        Ok(self.tables.lock().snapshots.clone())
    }

    fn reset(&self, account: &AccountRow) -> Result<(), SwingError> {
        let mut tables = self.tables.lock();
        *tables = Tables {
            account: Some(account.clone()),
            ..Tables::default()
        };
        Ok(())
    }
}
