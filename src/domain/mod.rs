//! Trading logic: market structure, sizing, position management and the
//! engine cycle. Nothing in here talks to the outside world except through
//! the traits in [`crate::ports`].

pub mod account;
pub mod aggregator;
pub mod bar;
pub mod config_validation;
pub mod drawdown;
pub mod engine;
pub mod engine_config;
pub mod error;
pub mod indicator;
pub mod journal;
pub mod management;
pub mod pivot;
pub mod position;
pub mod signal;
pub mod sizing;
pub mod snapshot;
pub mod strategy;
pub mod symbol;
pub mod timeframe;
pub mod trend;
