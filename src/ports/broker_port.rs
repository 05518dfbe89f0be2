//! Trading terminal port.
//!
//! Reads return `Option`/empty collections on failure instead of errors: a
//! missing quote or bar window is a normal transient condition for the
//! engine. Only initialisation can fail hard.

use crate::domain::account::{AccountInfo, Tick};
use crate::domain::bar::Bar;
use crate::domain::error::EngineError;
use crate::domain::position::Position;
use crate::domain::signal::Direction;
use crate::domain::symbol::SymbolInfo;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub magic: u64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub accepted: bool,
    pub ticket: u64,
    pub reason: String,
}

impl OrderResult {
    pub fn accepted(ticket: u64) -> Self {
        OrderResult {
            accepted: true,
            ticket,
            reason: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        OrderResult {
            accepted: false,
            ticket: 0,
            reason: reason.into(),
        }
    }
}

pub trait BrokerPort {
    /// Connects to the terminal.
    fn initialize(&mut self) -> Result<(), EngineError>;

    /// Makes `symbol` available for quotes and trading.
    fn select_symbol(&mut self, symbol: &str) -> Result<(), EngineError>;

    /// Most recent `count` bars, oldest first. Empty on failure.
    fn get_bars(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Vec<Bar>;

    fn get_tick(&self, symbol: &str) -> Option<Tick>;

    fn get_account(&self) -> Option<AccountInfo>;

    fn get_symbol_info(&self, symbol: &str) -> Option<SymbolInfo>;

    /// Open positions on `symbol` carrying the `magic` tag.
    fn get_open_positions(&self, symbol: &str, magic: u64) -> Vec<Position>;

    fn submit_order(&mut self, request: &OrderRequest) -> OrderResult;

    fn modify_stop(&mut self, ticket: u64, stop_loss: f64, take_profit: f64) -> OrderResult;

    fn close_partial(&mut self, ticket: u64, volume: f64) -> OrderResult;

    fn shutdown(&mut self) {}
}
