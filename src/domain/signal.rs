//! Structure break and retest detection.

use std::fmt;

use serde::Serialize;

use crate::domain::bar::Bar;
use crate::domain::trend::{RetestSetup, Trend, TrendState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bull,
    Bear,
}

impl Direction {
    /// +1 for bull, -1 for bear.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bull => 1.0,
            Direction::Bear => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bull => write!(f, "bull"),
            Direction::Bear => write!(f, "bear"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    #[default]
    None,
    Bull,
    Bear,
    BullBreak,
    BearBreak,
    BullRetest,
    BearRetest,
}

impl Signal {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Signal::Bull | Signal::BullBreak | Signal::BullRetest => Some(Direction::Bull),
            Signal::Bear | Signal::BearBreak | Signal::BearRetest => Some(Direction::Bear),
            Signal::None => None,
        }
    }

    /// Signals a trade can be opened on. Breaks waiting for a retest only
    /// confirm direction.
    pub fn is_entry(self) -> bool {
        matches!(
            self,
            Signal::Bull | Signal::Bear | Signal::BullRetest | Signal::BearRetest
        )
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::None => "none",
            Signal::Bull => "bull",
            Signal::Bear => "bear",
            Signal::BullBreak => "bull_break",
            Signal::BearBreak => "bear_break",
            Signal::BullRetest => "bull_retest",
            Signal::BearRetest => "bear_retest",
        };
        write!(f, "{s}")
    }
}

/// Break detector settings; `buffer` is already in price units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakParams {
    pub buffer: f64,
    pub retest_enabled: bool,
    /// Instrument point; a retest always confirms within one point of the level.
    pub point: f64,
}

/// Absorbs float noise when comparing prices quoted to the same digits.
const PRICE_EPSILON: f64 = 1e-9;

/// Evaluates the latest bar against `state`, arming or consuming a retest.
///
/// A pending retest takes priority over fresh breaks: while it is set, only
/// a confirmation (close within `buffer` of the level on a candle closing in
/// the retest direction) can produce a signal. "Within" is the larger of
/// `buffer` and one point.
pub fn detect_break(state: &mut TrendState, bars: &[Bar], params: BreakParams) -> Signal {
    let Some(last) = bars.last() else {
        return Signal::None;
    };
    let close = last.close;

    if let Some(setup) = state.retest {
        let tolerance = params.buffer.max(params.point);
        let near_level = (close - setup.level).abs() <= tolerance + PRICE_EPSILON;
        let confirmed = match setup.direction {
            Direction::Bull => last.is_bullish(),
            Direction::Bear => last.is_bearish(),
        };
        if near_level && confirmed {
            state.retest = None;
            return match setup.direction {
                Direction::Bull => Signal::BullRetest,
                Direction::Bear => Signal::BearRetest,
            };
        }
        return Signal::None;
    }

    match state.trend {
        Trend::Downtrend => {
            if let Some(lower_high) = state.last_lower_high {
                if close > lower_high + params.buffer {
                    return arm_or_fire(state, lower_high, Direction::Bull, params);
                }
            }
        }
        Trend::Uptrend => {
            if let Some(higher_low) = state.last_higher_low {
                if close < higher_low - params.buffer {
                    return arm_or_fire(state, higher_low, Direction::Bear, params);
                }
            }
        }
        Trend::None => {}
    }

    Signal::None
}

fn arm_or_fire(
    state: &mut TrendState,
    level: f64,
    direction: Direction,
    params: BreakParams,
) -> Signal {
    if params.retest_enabled {
        state.retest = Some(RetestSetup { level, direction });
        match direction {
            Direction::Bull => Signal::BullBreak,
            Direction::Bear => Signal::BearBreak,
        }
    } else {
        match direction {
            Direction::Bull => Signal::Bull,
            Direction::Bear => Signal::Bear,
        }
    }
}
