//! Instrument metadata and price/volume arithmetic.
//!
//! A pip is 10 points on 3/5-digit instruments and one point on 2/4-digit
//! instruments (and on anything else).

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolInfo {
    pub name: String,
    pub digits: u32,
    pub point: f64,
    pub tick_size: f64,
    pub tick_value: f64,
    /// Minimum distance between the quote and a stop, in price units.
    pub min_stop_distance: f64,
    pub volume_min: f64,
    pub volume_step: f64,
}

impl SymbolInfo {
    pub fn pip_size(&self) -> f64 {
        match self.digits {
            3 | 5 => 10.0 * self.point,
            _ => self.point,
        }
    }

    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size()
    }

    /// Price distance expressed in pips; 0 when the pip size is unusable.
    pub fn price_to_pips(&self, distance: f64) -> f64 {
        let pip = self.pip_size();
        if pip > 0.0 { distance / pip } else { 0.0 }
    }

    pub fn round_price(&self, price: f64) -> f64 {
        let factor = 10f64.powi(self.digits as i32);
        (price * factor).round() / factor
    }

    /// Floors a volume onto the broker's volume step.
    pub fn floor_volume(&self, volume: f64) -> f64 {
        let step = if self.volume_step > 0.0 {
            self.volume_step
        } else {
            0.01
        };
        // The epsilon keeps 0.3 / 0.01 from flooring to 29.
        let steps = (volume / step + 1e-9).floor();
        round_to(steps * step, 8)
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
pub(crate) fn forex_symbol() -> SymbolInfo {
    SymbolInfo {
        name: "EURUSD".into(),
        digits: 5,
        point: 0.00001,
        tick_size: 0.00001,
        tick_value: 1.0,
        min_stop_distance: 0.0,
        volume_min: 0.01,
        volume_step: 0.01,
    }
}
