//! swingtrader: a simulated swing-trading engine for an ASX equity universe.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. The [`orchestrator`] drives one
//! trading cycle, the [`scheduler`] repeats it and [`backtest`] replays it
//! over history.

pub mod adapters;
pub mod backtest;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod orchestrator;
pub mod ports;
pub mod scheduler;
