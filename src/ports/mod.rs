//! Collaborator traits the engine talks through.

pub mod broker_port;
pub mod config_port;
pub mod journal_port;
pub mod snapshot_port;
