//! Positions and closed trade lots.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    PartiallyClosed,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::PartiallyClosed => "PARTIALLY_CLOSED",
            PositionStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(PositionStatus::Open),
            "PARTIALLY_CLOSED" => Ok(PositionStatus::PartiallyClosed),
            "CLOSED" => Ok(PositionStatus::Closed),
            other => Err(format!("unknown position status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    Target1,
    Target2,
    Stop,
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Target1 => "TARGET1",
            ExitReason::Target2 => "TARGET2",
            ExitReason::Stop => "STOP",
            ExitReason::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TARGET1" => Ok(ExitReason::Target1),
            "TARGET2" => Ok(ExitReason::Target2),
            "STOP" => Ok(ExitReason::Stop),
            "MANUAL" => Ok(ExitReason::Manual),
            other => Err(format!("unknown exit reason: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: u64,
    pub symbol: String,
    pub open_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub entry_commission: f64,
    pub total_shares: u64,
    pub remaining_shares: u64,
    pub stop_price: f64,
    pub target1_price: f64,
    pub target2_price: f64,
    pub target1_filled: bool,
    /// Date of the bar that filled target 1. Stop ratchets start on the
    /// bar after it.
    pub target1_date: Option<NaiveDate>,
    pub status: PositionStatus,
}

impl Position {
    pub fn is_active(&self) -> bool {
        self.status != PositionStatus::Closed && self.remaining_shares > 0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.remaining_shares as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.remaining_shares as f64 * (price - self.entry_price)
    }

    /// Cost basis still held: remaining shares at entry plus the unallocated
    /// share of the entry commission.
    pub fn open_cost_basis(&self) -> f64 {
        if self.total_shares == 0 {
            return 0.0;
        }
        let fraction = self.remaining_shares as f64 / self.total_shares as f64;
        self.remaining_shares as f64 * self.entry_price + self.entry_commission * fraction
    }

    pub fn risk_per_share(&self) -> f64 {
        self.entry_price - self.stop_price
    }

    pub fn should_stop(&self, low: f64) -> bool {
        low <= self.stop_price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub position_id: u64,
    pub symbol: String,
    pub open_timestamp: NaiveDateTime,
    pub close_timestamp: NaiveDateTime,
    pub shares_closed: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub realized_pnl: f64,
}

impl Trade {
    pub fn holding_days(&self) -> i64 {
        (self.close_timestamp.date() - self.open_timestamp.date()).num_days()
    }
}
