//! Read-only view of a broker position.
//!
//! Positions are re-read from the terminal every cycle and never cached.
//! A `stop_loss` or `take_profit` of 0.0 means none is set.

use serde::Serialize;

use crate::domain::account::Tick;
use crate::domain::signal::Direction;
use crate::domain::symbol::SymbolInfo;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub side: Direction,
    pub volume: f64,
    /// Volume at open; lower current volume means a partial close happened.
    pub initial_volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub magic: u64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Direction::Bull
    }

    /// Price the position would close at: bid for longs, ask for shorts.
    pub fn exit_price(&self, tick: &Tick) -> f64 {
        if self.is_long() { tick.bid } else { tick.ask }
    }

    pub fn profit_pips(&self, tick: &Tick, symbol: &SymbolInfo) -> f64 {
        let move_ = self.side.sign() * (self.exit_price(tick) - self.entry_price);
        symbol.price_to_pips(move_)
    }

    pub fn has_stop(&self) -> bool {
        self.stop_loss > 0.0
    }

    /// Stop already at or beyond the entry price.
    pub fn stop_secured(&self) -> bool {
        self.has_stop() && self.side.sign() * (self.stop_loss - self.entry_price) >= 0.0
    }

    /// True when `new_stop` is strictly more protective than the current stop.
    pub fn tightens(&self, new_stop: f64) -> bool {
        !self.has_stop() || self.side.sign() * (new_stop - self.stop_loss) > 0.0
    }

    pub fn partially_closed(&self, symbol: &SymbolInfo) -> bool {
        let tolerance = symbol.volume_step.max(0.01) / 2.0;
        self.volume + tolerance < self.initial_volume
    }
}

#[cfg(test)]
pub(crate) fn sample_long() -> Position {
    Position {
        ticket: 1001,
        symbol: "EURUSD".into(),
        side: Direction::Bull,
        volume: 1.0,
        initial_volume: 1.0,
        entry_price: 1.10000,
        stop_loss: 1.09800,
        take_profit: 1.10600,
        magic: 234000,
    }
}

#[cfg(test)]
pub(crate) fn sample_short() -> Position {
    Position {
        ticket: 1002,
        side: Direction::Bear,
        stop_loss: 1.10200,
        take_profit: 1.09400,
        ..sample_long()
    }
}
