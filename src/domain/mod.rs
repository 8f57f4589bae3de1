//! Core domain types and logic.

pub mod bar;
pub mod breaker;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod ledger;
pub mod metrics;
pub mod monitor;
pub mod portfolio;
pub mod position;
pub mod regime;
pub mod scanner;
pub mod settings;
pub mod sizing;
pub mod universe;
