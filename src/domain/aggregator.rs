//! Multi-timeframe confirmation.
//!
//! Every configured timeframe runs pivot detection, the trend tracker and the
//! break detector in precedence order. Directional signals are counted per
//! family and a decision is produced when a family reaches the confirmation
//! threshold. The decision carries the pivot levels of the first confirming
//! timeframe. A timeframe that has opened a trade today stays latched until
//! the local date changes: its signal still confirms but cannot trigger, and
//! it cannot consume a pending retest.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::domain::bar::Bar;
use crate::domain::pivot::{Pivot, find_pivots, min_bars_for_depth};
use crate::domain::signal::{BreakParams, Direction, Signal, detect_break};
use crate::domain::symbol::SymbolInfo;
use crate::domain::timeframe::Timeframe;
use crate::domain::trend::{TrendState, update_trend};

#[derive(Debug, Clone, PartialEq)]
pub struct StructureParams {
    pub pivot_depth: usize,
    pub break_buffer_pips: f64,
    pub retest_enabled: bool,
    pub min_confirmation: usize,
}

impl Default for StructureParams {
    fn default() -> Self {
        StructureParams {
            pivot_depth: 1,
            break_buffer_pips: 0.0,
            retest_enabled: false,
            min_confirmation: 1,
        }
    }
}

/// One cycle's trade decision. Consumed immediately, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub direction: Direction,
    pub timeframe: Timeframe,
    pub reference_high: Option<f64>,
    pub reference_low: Option<f64>,
}

/// What one timeframe produced this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeReading {
    pub timeframe: Timeframe,
    pub signal: Signal,
    pub state: TrendState,
    pub last_pivot_high: Option<f64>,
    pub pivot_high_time: Option<NaiveDateTime>,
    pub last_pivot_low: Option<f64>,
    pub pivot_low_time: Option<NaiveDateTime>,
    pub bars: usize,
    /// Fewer bars than one pivot window needs; nothing was evaluated.
    pub insufficient_data: bool,
    /// Already opened a trade today; the signal confirms but cannot trigger.
    pub latched: bool,
}

impl TimeframeReading {
    pub(crate) fn skipped(timeframe: Timeframe, state: TrendState, bars: usize) -> Self {
        TimeframeReading {
            timeframe,
            signal: Signal::None,
            state,
            last_pivot_high: None,
            pivot_high_time: None,
            last_pivot_low: None,
            pivot_low_time: None,
            bars,
            insufficient_data: true,
            latched: false,
        }
    }

    fn counts(&self) -> bool {
        !self.insufficient_data
    }

    fn can_trigger(&self) -> bool {
        self.counts() && !self.latched && self.signal.is_entry()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub readings: Vec<TimeframeReading>,
    pub decision: Option<Decision>,
}

impl Evaluation {
    /// Direction of the first timeframe, in precedence order, with any signal.
    pub fn overall_direction(&self) -> Option<Direction> {
        self.readings.iter().find_map(|r| r.signal.direction())
    }
}

/// Per-timeframe "already fired today" latch.
#[derive(Debug, Clone, Default)]
pub struct DailyLatch {
    fired: HashMap<Timeframe, NaiveDate>,
}

impl DailyLatch {
    pub fn is_latched(&self, timeframe: Timeframe, today: NaiveDate) -> bool {
        self.fired.get(&timeframe).is_some_and(|day| *day == today)
    }

    pub fn mark(&mut self, timeframe: Timeframe, today: NaiveDate) {
        self.fired.insert(timeframe, today);
    }
}

/// Resolves counted readings into at most one decision.
///
/// Break signals and latched timeframes count toward their family but cannot
/// trigger: the decision takes its levels from the first unlatched timeframe
/// with an entry signal.
/// When both families qualify, the one whose trigger has the higher
/// precedence wins.
pub fn resolve_decision(
    readings: &[TimeframeReading],
    min_confirmation: usize,
) -> Option<Decision> {
    let threshold = min_confirmation.max(1);
    let counted = || readings.iter().filter(|r| r.counts());

    let count = |dir: Direction| {
        counted()
            .filter(|r| r.signal.direction() == Some(dir))
            .count()
    };
    let first = |dir: Direction| {
        readings
            .iter()
            .position(|r| r.can_trigger() && r.signal.direction() == Some(dir))
    };

    let bull = (count(Direction::Bull) >= threshold)
        .then(|| first(Direction::Bull))
        .flatten();
    let bear = (count(Direction::Bear) >= threshold)
        .then(|| first(Direction::Bear))
        .flatten();

    let (direction, idx) = match (bull, bear) {
        (Some(b), Some(s)) if s < b => (Direction::Bear, s),
        (Some(b), _) => (Direction::Bull, b),
        (None, Some(s)) => (Direction::Bear, s),
        (None, None) => return None,
    };

    let trigger = &readings[idx];
    Some(Decision {
        direction,
        timeframe: trigger.timeframe,
        reference_high: trigger.last_pivot_high,
        reference_low: trigger.last_pivot_low,
    })
}

/// Owns the trend state of every configured timeframe.
#[derive(Debug, Clone)]
pub struct MultiTimeframeAggregator {
    timeframes: Vec<Timeframe>,
    params: StructureParams,
    states: HashMap<Timeframe, TrendState>,
    latch: DailyLatch,
}

impl MultiTimeframeAggregator {
    pub fn new(timeframes: Vec<Timeframe>, params: StructureParams) -> Self {
        let states = timeframes
            .iter()
            .map(|tf| (*tf, TrendState::default()))
            .collect();
        MultiTimeframeAggregator {
            timeframes,
            params,
            states,
            latch: DailyLatch::default(),
        }
    }

    pub fn params(&self) -> &StructureParams {
        &self.params
    }

    pub fn state(&self, timeframe: Timeframe) -> Option<&TrendState> {
        self.states.get(&timeframe)
    }

    pub fn mark_fired(&mut self, timeframe: Timeframe, today: NaiveDate) {
        self.latch.mark(timeframe, today);
    }

    pub fn is_latched(&self, timeframe: Timeframe, today: NaiveDate) -> bool {
        self.latch.is_latched(timeframe, today)
    }

    /// Runs one cycle. A timeframe missing from `windows` is treated as an
    /// empty window.
    pub fn evaluate(
        &mut self,
        windows: &HashMap<Timeframe, Vec<Bar>>,
        symbol: &SymbolInfo,
        today: NaiveDate,
    ) -> Evaluation {
        let break_params = BreakParams {
            buffer: symbol.pips_to_price(self.params.break_buffer_pips),
            retest_enabled: self.params.retest_enabled,
            point: symbol.point,
        };
        let depth = self.params.pivot_depth;

        let mut readings = Vec::with_capacity(self.timeframes.len());
        for &tf in &self.timeframes {
            let bars = windows.get(&tf).map(Vec::as_slice).unwrap_or(&[]);
            let state = self.states.entry(tf).or_default();

            if bars.len() < min_bars_for_depth(depth) {
                debug!(timeframe = %tf, bars = bars.len(), "not enough bars, skipping timeframe");
                readings.push(TimeframeReading::skipped(tf, state.clone(), bars.len()));
                continue;
            }

            let pivots = find_pivots(bars, depth);
            update_trend(state, &pivots);
            let latched = self.latch.is_latched(tf, today);
            // A latched timeframe may arm a retest but never consumes one.
            let signal = if latched && state.is_waiting_for_retest() {
                detect_break(&mut state.clone(), bars, break_params)
            } else {
                detect_break(state, bars, break_params)
            };

            let time_of =
                |p: Option<&Pivot>| p.and_then(|p| bars.get(p.index)).map(|b| b.timestamp);
            let reading = TimeframeReading {
                timeframe: tf,
                signal,
                state: state.clone(),
                last_pivot_high: pivots.last_high().map(|p| p.price),
                pivot_high_time: time_of(pivots.last_high()),
                last_pivot_low: pivots.last_low().map(|p| p.price),
                pivot_low_time: time_of(pivots.last_low()),
                bars: bars.len(),
                insufficient_data: false,
                latched,
            };
            debug!(
                timeframe = %tf,
                trend = ?reading.state.trend,
                signal = %signal,
                latched = reading.latched,
                "timeframe evaluated"
            );
            readings.push(reading);
        }

        let decision = resolve_decision(&readings, self.params.min_confirmation);
        Evaluation { readings, decision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pivot::bars_from_highs_lows;
    use crate::domain::symbol::forex_symbol;
    use crate::domain::trend::Trend;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn reading(tf: Timeframe, signal: Signal, high: f64, low: f64) -> TimeframeReading {
        TimeframeReading {
            timeframe: tf,
            signal,
            state: TrendState::default(),
            last_pivot_high: Some(high),
            pivot_high_time: None,
            last_pivot_low: Some(low),
            pivot_low_time: None,
            bars: 100,
            insufficient_data: false,
            latched: false,
        }
    }

    /// Lower highs and lower lows, finishing with a close far above the
    /// last lower high.
    fn downtrend_then_breakout() -> Vec<Bar> {
        let mut bars = bars_from_highs_lows(&[
            (1.2000, 1.1900),
            (1.2100, 1.1950), // pivot high 1.2100
            (1.2000, 1.1800), // pivot low 1.1800
            (1.2050, 1.1850), // pivot high 1.2050
            (1.1950, 1.1700), // pivot low 1.1700
            (1.2000, 1.1800),
        ]);
        let last = bars.last_mut().unwrap();
        last.open = 1.1900;
        last.high = 1.2200;
        last.close = 1.2150;
        bars
    }

    #[test]
    fn resolve_single_bull() {
        let readings = vec![
            reading(Timeframe::H4, Signal::None, 2.0, 1.0),
            reading(Timeframe::H1, Signal::Bull, 1.5, 1.2),
        ];
        let decision = resolve_decision(&readings, 1).unwrap();
        assert_eq!(decision.direction, Direction::Bull);
        assert_eq!(decision.timeframe, Timeframe::H1);
        assert_eq!(decision.reference_high, Some(1.5));
        assert_eq!(decision.reference_low, Some(1.2));
    }

    #[test]
    fn resolve_requires_threshold() {
        let readings = vec![
            reading(Timeframe::H4, Signal::BullBreak, 2.0, 1.0),
            reading(Timeframe::H1, Signal::Bear, 1.5, 1.2),
        ];
        assert!(resolve_decision(&readings, 2).is_none());
    }

    #[test]
    fn resolve_uses_first_confirming_levels() {
        let readings = vec![
            reading(Timeframe::H4, Signal::None, 9.0, 8.0),
            reading(Timeframe::H1, Signal::BearRetest, 2.0, 1.0),
            reading(Timeframe::M15, Signal::Bear, 1.5, 1.2),
        ];
        let decision = resolve_decision(&readings, 2).unwrap();
        assert_eq!(decision.direction, Direction::Bear);
        assert_eq!(decision.timeframe, Timeframe::H1);
        assert_eq!(decision.reference_high, Some(2.0));
    }

    #[test]
    fn resolve_tie_goes_to_precedence() {
        let readings = vec![
            reading(Timeframe::H4, Signal::Bear, 2.0, 1.0),
            reading(Timeframe::H1, Signal::Bull, 1.5, 1.2),
        ];
        let decision = resolve_decision(&readings, 1).unwrap();
        assert_eq!(decision.direction, Direction::Bear);
        assert_eq!(decision.timeframe, Timeframe::H4);
    }

    #[test]
    fn resolve_ignores_latched_and_skipped() {
        let mut latched = reading(Timeframe::H4, Signal::Bull, 2.0, 1.0);
        latched.latched = true;
        let mut skipped = reading(Timeframe::H1, Signal::Bull, 2.0, 1.0);
        skipped.insufficient_data = true;
        assert!(resolve_decision(&[latched.clone(), skipped], 1).is_none());

        let open = reading(Timeframe::M15, Signal::Bull, 1.4, 1.3);
        let decision = resolve_decision(&[latched, open], 1).unwrap();
        assert_eq!(decision.timeframe, Timeframe::M15);
    }

    #[test]
    fn latch_resets_on_new_day() {
        let mut latch = DailyLatch::default();
        assert!(!latch.is_latched(Timeframe::H1, day(3)));
        latch.mark(Timeframe::H1, day(3));
        assert!(latch.is_latched(Timeframe::H1, day(3)));
        assert!(!latch.is_latched(Timeframe::M15, day(3)));
        assert!(!latch.is_latched(Timeframe::H1, day(4)));
    }

    #[test]
    fn evaluate_detects_break_and_decides() {
        let mut agg = MultiTimeframeAggregator::new(
            vec![Timeframe::H1, Timeframe::M15],
            StructureParams::default(),
        );
        let mut windows = HashMap::new();
        windows.insert(Timeframe::H1, downtrend_then_breakout());

        let eval = agg.evaluate(&windows, &forex_symbol(), day(3));

        assert_eq!(eval.readings.len(), 2);
        let h1 = &eval.readings[0];
        assert_eq!(h1.state.trend, Trend::Downtrend);
        assert_eq!(h1.state.last_lower_high, Some(1.2050));
        assert_eq!(h1.signal, Signal::Bull);
        assert!(eval.readings[1].insufficient_data);

        let decision = eval.decision.as_ref().unwrap();
        assert_eq!(decision.direction, Direction::Bull);
        assert_eq!(decision.timeframe, Timeframe::H1);
        assert_eq!(decision.reference_low, Some(1.1700));
        assert_eq!(eval.overall_direction(), Some(Direction::Bull));
    }

    #[test]
    fn evaluate_respects_latch_until_rollover() {
        let mut agg =
            MultiTimeframeAggregator::new(vec![Timeframe::H1], StructureParams::default());
        let mut windows = HashMap::new();
        windows.insert(Timeframe::H1, downtrend_then_breakout());

        agg.mark_fired(Timeframe::H1, day(3));
        let eval = agg.evaluate(&windows, &forex_symbol(), day(3));
        assert_eq!(eval.readings[0].signal, Signal::Bull);
        assert!(eval.readings[0].latched);
        assert!(eval.decision.is_none());

        let eval = agg.evaluate(&windows, &forex_symbol(), day(4));
        assert!(eval.decision.is_some());
    }

    #[test]
    fn evaluate_with_retest_arms_state() {
        let params = StructureParams {
            retest_enabled: true,
            ..StructureParams::default()
        };
        let mut agg = MultiTimeframeAggregator::new(vec![Timeframe::H1], params);
        let mut windows = HashMap::new();
        windows.insert(Timeframe::H1, downtrend_then_breakout());

        let eval = agg.evaluate(&windows, &forex_symbol(), day(3));
        assert_eq!(eval.readings[0].signal, Signal::BullBreak);
        assert!(agg.state(Timeframe::H1).unwrap().is_waiting_for_retest());
        assert!(eval.decision.is_none());
    }

    #[test]
    fn break_confirms_but_does_not_trigger() {
        let readings = vec![
            reading(Timeframe::H4, Signal::BullBreak, 2.0, 1.0),
            reading(Timeframe::H1, Signal::BullRetest, 1.5, 1.2),
        ];
        let decision = resolve_decision(&readings, 2).unwrap();
        assert_eq!(decision.timeframe, Timeframe::H1);
        assert_eq!(decision.reference_low, Some(1.2));

        assert!(resolve_decision(&readings[..1], 1).is_none());
    }

    #[test]
    fn latched_timeframe_confirms_without_triggering() {
        let mut latched = reading(Timeframe::H4, Signal::Bull, 2.0, 1.0);
        latched.latched = true;
        let open = reading(Timeframe::H1, Signal::Bull, 1.5, 1.2);

        let decision = resolve_decision(&[latched.clone(), open], 2).unwrap();
        assert_eq!(decision.timeframe, Timeframe::H1);
        assert_eq!(decision.reference_high, Some(1.5));

        let quiet = reading(Timeframe::H1, Signal::None, 1.5, 1.2);
        assert!(resolve_decision(&[latched, quiet], 1).is_none());
    }

    #[test]
    fn latched_timeframe_keeps_pending_retest() {
        let params = StructureParams {
            retest_enabled: true,
            break_buffer_pips: 5.0,
            ..StructureParams::default()
        };
        let mut agg = MultiTimeframeAggregator::new(vec![Timeframe::H1], params);
        let mut windows = HashMap::new();
        windows.insert(Timeframe::H1, downtrend_then_breakout());
        let eval = agg.evaluate(&windows, &forex_symbol(), day(3));
        assert_eq!(eval.readings[0].signal, Signal::BullBreak);

        // Price returns to the broken lower high and closes bullish.
        let mut bars = downtrend_then_breakout();
        let next = bars.last().unwrap().timestamp + chrono::Duration::hours(1);
        bars.push(Bar {
            timestamp: next,
            open: 1.2000,
            high: 1.2060,
            low: 1.1990,
            close: 1.2052,
        });
        windows.insert(Timeframe::H1, bars);

        agg.mark_fired(Timeframe::H1, day(3));
        let eval = agg.evaluate(&windows, &forex_symbol(), day(3));
        assert_eq!(eval.readings[0].signal, Signal::BullRetest);
        assert!(eval.readings[0].latched);
        assert!(eval.decision.is_none());
        assert!(agg.state(Timeframe::H1).unwrap().is_waiting_for_retest());

        let eval = agg.evaluate(&windows, &forex_symbol(), day(4));
        assert_eq!(eval.readings[0].signal, Signal::BullRetest);
        assert_eq!(eval.decision.unwrap().direction, Direction::Bull);
        assert!(!agg.state(Timeframe::H1).unwrap().is_waiting_for_retest());
    }

    #[test]
    fn empty_windows_produce_no_decision() {
        let mut agg = MultiTimeframeAggregator::new(
            vec![Timeframe::H4, Timeframe::H1],
            StructureParams::default(),
        );
        let eval = agg.evaluate(&HashMap::new(), &forex_symbol(), day(3));
        assert!(eval.decision.is_none());
        assert!(eval.readings.iter().all(|r| r.insufficient_data));
        assert_eq!(agg.state(Timeframe::H4), Some(&TrendState::default()));
    }
}
