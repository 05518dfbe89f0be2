//! Stop, target and position size for a new entry.
//!
//! Stops come from the decision's pivot levels in dynamic mode, otherwise
//! from ATR. Any stop on the wrong side of entry (or not above zero) is
//! replaced by the ATR stop. Size risks `risk_pct` of the balance over the
//! stop distance and is clamped to `[min_volume, max_volume]`; when the
//! inputs cannot produce a size (no tick value, no stop distance, sizing
//! disabled) the configured default size is used instead.

use serde::Serialize;

use crate::domain::signal::Direction;
use crate::domain::symbol::SymbolInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub atr_multiplier_sl: f64,
    pub atr_multiplier_tp: f64,
    pub dynamic_sl_enabled: bool,
    pub reward_ratio: f64,
    pub risk_per_trade_pct: f64,
    pub default_volume: f64,
    pub min_volume: f64,
    pub max_volume: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            atr_multiplier_sl: 1.5,
            atr_multiplier_tp: 3.0,
            dynamic_sl_enabled: false,
            reward_ratio: 2.0,
            risk_per_trade_pct: 1.0,
            default_volume: 0.1,
            min_volume: 0.01,
            max_volume: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    Atr,
    Structure,
}

/// Everything needed to size one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingInput {
    pub direction: Direction,
    pub entry: f64,
    pub atr: Option<f64>,
    pub reference_high: Option<f64>,
    pub reference_low: Option<f64>,
    /// Price distance kept between a structure stop and its pivot.
    pub structure_buffer: f64,
    /// Use the structure stop even when dynamic mode is off.
    pub force_structure: bool,
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePlan {
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub volume: f64,
    pub stop_mode: StopMode,
}

impl TradePlan {
    pub fn risk_reward(&self) -> f64 {
        let risk = (self.entry - self.stop_loss).abs();
        if risk == 0.0 {
            return 0.0;
        }
        (self.take_profit - self.entry).abs() / risk
    }
}

/// True when `stop` would not immediately stop out a fresh entry.
pub fn is_valid_stop(direction: Direction, entry: f64, stop: f64) -> bool {
    if !stop.is_finite() || stop <= 0.0 {
        return false;
    }
    match direction {
        Direction::Bull => stop < entry,
        Direction::Bear => stop > entry,
    }
}

/// ATR stop distance with floors for a missing or zero ATR, kept positive
/// for longs.
fn atr_stop(input: &SizingInput, params: &RiskParams, symbol: &SymbolInfo) -> (f64, f64) {
    let atr = input.atr.filter(|a| a.is_finite() && *a > 0.0).unwrap_or(0.0);
    let floor = symbol.min_stop_distance.max(symbol.pip_size());
    let mut distance = (atr * params.atr_multiplier_sl).max(floor);
    if input.direction == Direction::Bull && input.entry - distance <= 0.0 {
        distance = input.entry / 2.0;
    }
    let stop = input.entry - input.direction.sign() * distance;

    let target_distance = if atr > 0.0 && params.atr_multiplier_tp > 0.0 {
        atr * params.atr_multiplier_tp
    } else {
        distance * params.reward_ratio
    };
    (stop, target_distance)
}

fn structure_stop(input: &SizingInput) -> Option<f64> {
    let pivot = match input.direction {
        Direction::Bull => input.reference_low?,
        Direction::Bear => input.reference_high?,
    };
    Some(pivot - input.direction.sign() * input.structure_buffer)
}

pub fn position_size(
    balance: Option<f64>,
    entry: f64,
    stop: f64,
    symbol: &SymbolInfo,
    params: &RiskParams,
) -> f64 {
    let fallback = params
        .default_volume
        .clamp(params.min_volume, params.max_volume);

    let Some(balance) = balance.filter(|b| *b > 0.0) else {
        return fallback;
    };
    if params.risk_per_trade_pct <= 0.0
        || symbol.tick_size <= 0.0
        || symbol.tick_value <= 0.0
        || entry == stop
    {
        return fallback;
    }

    let risk_amount = balance * params.risk_per_trade_pct / 100.0;
    let ticks = (entry - stop).abs() / symbol.tick_size;
    let raw = risk_amount / (ticks * symbol.tick_value);
    if !raw.is_finite() {
        return fallback;
    }

    let stepped = symbol.floor_volume(raw);
    stepped.clamp(params.min_volume, params.max_volume)
}

pub fn plan_trade(input: &SizingInput, params: &RiskParams, symbol: &SymbolInfo) -> TradePlan {
    let (atr_sl, atr_tp_distance) = atr_stop(input, params, symbol);
    let sign = input.direction.sign();

    let structure = if params.dynamic_sl_enabled || input.force_structure {
        structure_stop(input).filter(|s| is_valid_stop(input.direction, input.entry, *s))
    } else {
        None
    };

    let (stop_loss, take_profit, stop_mode) = match structure {
        Some(stop) => {
            let risk = (input.entry - stop).abs();
            (stop, input.entry + sign * risk * params.reward_ratio, StopMode::Structure)
        }
        None => (atr_sl, input.entry + sign * atr_tp_distance, StopMode::Atr),
    };

    let entry = symbol.round_price(input.entry);
    let mut stop_loss = symbol.round_price(stop_loss);
    // Rounding can pull a tight stop onto the entry price.
    if !is_valid_stop(input.direction, entry, stop_loss) {
        stop_loss = symbol.round_price(entry - sign * symbol.point.max(f64::EPSILON));
    }
    let take_profit = symbol.round_price(take_profit);

    let volume = position_size(input.balance, entry, stop_loss, symbol, params);

    TradePlan {
        direction: input.direction,
        entry,
        stop_loss,
        take_profit,
        volume,
        stop_mode,
    }
}
