//! Concrete adapter implementations for ports.

pub mod cached_data;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod log_notifier;
pub mod memory_store;
pub mod replay_adapter;
pub mod sqlite_adapter;
