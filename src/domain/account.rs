//! Quote and account snapshots read from the terminal each cycle.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccountInfo {
    pub balance: f64,
    pub equity: f64,
}
