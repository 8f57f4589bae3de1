//! Portfolio state and equity snapshots.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

use super::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct EquitySnapshot {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub cash: f64,
    pub positions_value: f64,
}

/// The process-wide portfolio aggregate. Only `Ledger` mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub starting_cash: f64,
    pub cash: f64,
    pub equity: f64,
    pub realized_pnl_total: f64,
    pub open_positions: BTreeMap<u64, Position>,
    pub next_position_id: u64,
}

impl PortfolioState {
    pub fn new(starting_cash: f64) -> Self {
        PortfolioState {
            starting_cash,
            cash: starting_cash,
            equity: starting_cash,
            realized_pnl_total: 0.0,
            open_positions: BTreeMap::new(),
            next_position_id: 1,
        }
    }

    pub fn position_count(&self) -> usize {
        self.open_positions.len()
    }

    pub fn get_position(&self, id: u64) -> Option<&Position> {
        self.open_positions.get(&id)
    }

    pub fn position_for_symbol(&self, symbol: &str) -> Option<&Position> {
        self.open_positions.values().find(|p| p.symbol == symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.position_for_symbol(symbol).is_some()
    }

    pub fn held_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .open_positions
            .values()
            .map(|p| p.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Mark-to-market value of open positions. A symbol without a price is
    /// valued at its entry price.
    pub fn positions_value(&self, price_map: &HashMap<String, f64>) -> f64 {
        self.open_positions
            .values()
            .map(|pos| {
                let price = price_map.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum()
    }

    pub fn total_equity(&self, price_map: &HashMap<String, f64>) -> f64 {
        self.cash + self.positions_value(price_map)
    }

    pub fn unrealized_pnl(&self, price_map: &HashMap<String, f64>) -> f64 {
        self.open_positions
            .values()
            .map(|pos| {
                let price = price_map.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
                pos.unrealized_pnl(price)
            })
            .sum()
    }

    /// Cash implied by starting cash, realized results and held cost basis.
    pub fn expected_cash(&self) -> f64 {
        let held: f64 = self.open_positions.values().map(|p| p.open_cost_basis()).sum();
        self.starting_cash + self.realized_pnl_total - held
    }
}
