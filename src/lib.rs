//! structshift: multi-timeframe market structure trading engine.
//!
//! Hexagonal architecture: trading logic in [`domain`], collaborator traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod ports;
