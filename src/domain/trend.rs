//! Per-timeframe trend structure.
//!
//! Uptrend needs both the last pivot high and the last pivot low above their
//! predecessors, downtrend needs both below. Anything else (mixed structure,
//! equal pivots, fewer than two of either kind) leaves the state untouched.

use serde::Serialize;

use crate::domain::pivot::Pivots;
use crate::domain::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    #[default]
    None,
    Uptrend,
    Downtrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetestSetup {
    pub level: f64,
    pub direction: Direction,
}

/// Structure state of one timeframe, kept for the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendState {
    pub trend: Trend,
    pub last_higher_high: Option<f64>,
    pub last_higher_low: Option<f64>,
    pub last_lower_high: Option<f64>,
    pub last_lower_low: Option<f64>,
    pub retest: Option<RetestSetup>,
}

impl TrendState {
    pub fn is_waiting_for_retest(&self) -> bool {
        self.retest.is_some()
    }

    fn set_trend(&mut self, trend: Trend) {
        // A structural flip supersedes whatever break was waiting for a retest.
        if self.trend != trend {
            self.retest = None;
        }
        self.trend = trend;
    }
}

/// Applies this cycle's pivots to `state`. Returns true when the state changed.
pub fn update_trend(state: &mut TrendState, pivots: &Pivots) -> bool {
    let (Some((prev_high, last_high)), Some((prev_low, last_low))) =
        (pivots.last_two_highs(), pivots.last_two_lows())
    else {
        return false;
    };

    let before = state.clone();

    if last_high.price > prev_high.price && last_low.price > prev_low.price {
        state.set_trend(Trend::Uptrend);
        state.last_higher_high = Some(last_high.price);
        state.last_higher_low = Some(last_low.price);
        state.last_lower_high = None;
        state.last_lower_low = None;
    } else if last_high.price < prev_high.price && last_low.price < prev_low.price {
        state.set_trend(Trend::Downtrend);
        state.last_lower_high = Some(last_high.price);
        state.last_lower_low = Some(last_low.price);
        state.last_higher_high = None;
        state.last_higher_low = None;
    }

    *state != before
}
