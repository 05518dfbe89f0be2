//! Concrete implementations of the ports.

pub mod csv_journal_adapter;
pub mod file_config_adapter;
pub mod json_snapshot_adapter;
pub mod paper_broker;
