//! Open position management: break-even, trailing stop, partial close and
//! scale-out.
//!
//! Evaluated per position, per cycle, from the fresh broker view only, so the
//! same inputs always produce the same actions. Order of evaluation:
//! break-even, then trailing (skipped when break-even produced a stop this
//! cycle), then partial close, then scale-out. At most one stop modification
//! and one close are proposed per position per cycle. Partial close and
//! scale-out require the stop to already sit at or beyond entry.

use serde::Serialize;

use crate::domain::account::Tick;
use crate::domain::position::Position;
use crate::domain::symbol::SymbolInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct ManagementParams {
    pub break_even_enabled: bool,
    pub break_even_pips: f64,
    pub break_even_buffer_pips: f64,
    pub trailing_enabled: bool,
    pub trailing_distance_pips: f64,
    pub partial_close_enabled: bool,
    pub partial_close_pct: f64,
    pub partial_close_pips: f64,
    pub scale_out_enabled: bool,
    pub scale_out_target_pips: f64,
}

impl Default for ManagementParams {
    fn default() -> Self {
        ManagementParams {
            break_even_enabled: true,
            break_even_pips: 10.0,
            break_even_buffer_pips: 1.0,
            trailing_enabled: false,
            trailing_distance_pips: 15.0,
            partial_close_enabled: false,
            partial_close_pct: 50.0,
            partial_close_pips: 20.0,
            scale_out_enabled: false,
            scale_out_target_pips: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    BreakEven,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    PartialClose,
    ScaleOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ManagementAction {
    ModifyStop {
        ticket: u64,
        new_stop: f64,
        take_profit: f64,
        reason: StopReason,
    },
    ClosePartial {
        ticket: u64,
        volume: f64,
        reason: CloseReason,
    },
}

/// Why a candidate stop was not proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRejection {
    WrongSide,
    TooClose,
    NotTighter,
}

/// Checks a candidate stop against the current quote and the broker's
/// minimum stop distance.
pub fn check_stop(
    position: &Position,
    new_stop: f64,
    tick: &Tick,
    symbol: &SymbolInfo,
) -> Result<(), StopRejection> {
    let gap = if position.is_long() {
        tick.bid - new_stop
    } else {
        new_stop - tick.ask
    };
    if gap <= 0.0 {
        return Err(StopRejection::WrongSide);
    }
    if gap < symbol.min_stop_distance {
        return Err(StopRejection::TooClose);
    }
    if !position.tightens(new_stop) {
        return Err(StopRejection::NotTighter);
    }
    Ok(())
}

/// Volume to close for a partial close of `pct` percent, respecting the
/// broker's minimum volume for both the closed and the remaining part.
pub fn partial_close_volume(volume: f64, pct: f64, symbol: &SymbolInfo) -> Option<f64> {
    let min = symbol.volume_min.max(0.0);
    let mut close = symbol.floor_volume(volume * pct / 100.0).max(min);
    if volume - close < min - 1e-9 {
        close = symbol.floor_volume(volume - min);
    }
    if close < min || close <= 0.0 {
        return None;
    }
    Some(close)
}

pub fn evaluate_position(
    position: &Position,
    tick: &Tick,
    symbol: &SymbolInfo,
    params: &ManagementParams,
) -> Vec<ManagementAction> {
    let mut actions = Vec::new();
    let sign = position.side.sign();
    let profit_pips = position.profit_pips(tick, symbol);
    let secured = position.stop_secured();
    let be_reached = profit_pips >= params.break_even_pips;
    let be_level = symbol.round_price(
        position.entry_price + sign * symbol.pips_to_price(params.break_even_buffer_pips),
    );

    let mut stop_modified = false;

    if params.break_even_enabled
        && be_reached
        && !secured
        && check_stop(position, be_level, tick, symbol).is_ok()
    {
        actions.push(ManagementAction::ModifyStop {
            ticket: position.ticket,
            new_stop: be_level,
            take_profit: position.take_profit,
            reason: StopReason::BreakEven,
        });
        stop_modified = true;
    }

    if params.trailing_enabled && be_reached && !stop_modified {
        let distance_level = position.exit_price(tick)
            - sign * symbol.pips_to_price(params.trailing_distance_pips);
        let candidate = if position.is_long() {
            be_level.max(distance_level)
        } else {
            be_level.min(distance_level)
        };
        let candidate = symbol.round_price(candidate);
        if check_stop(position, candidate, tick, symbol).is_ok() {
            actions.push(ManagementAction::ModifyStop {
                ticket: position.ticket,
                new_stop: candidate,
                take_profit: position.take_profit,
                reason: StopReason::Trailing,
            });
        }
    }

    let already_partial = position.partially_closed(symbol);
    let mut closing = false;

    if params.partial_close_enabled
        && secured
        && !already_partial
        && profit_pips >= params.partial_close_pips
    {
        let pct = params.partial_close_pct;
        if let Some(volume) = partial_close_volume(position.volume, pct, symbol) {
            actions.push(ManagementAction::ClosePartial {
                ticket: position.ticket,
                volume,
                reason: CloseReason::PartialClose,
            });
            closing = true;
        }
    }

    if params.scale_out_enabled
        && !closing
        && secured
        && (already_partial || !params.partial_close_enabled)
        && profit_pips >= params.scale_out_target_pips
    {
        actions.push(ManagementAction::ClosePartial {
            ticket: position.ticket,
            volume: position.volume,
            reason: CloseReason::ScaleOut,
        });
    }

    actions
}
