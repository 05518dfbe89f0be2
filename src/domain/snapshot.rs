//! Per-cycle state published for the dashboard.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::account::AccountInfo;
use crate::domain::aggregator::{Decision, Evaluation, TimeframeReading};
use crate::domain::management::ManagementAction;
use crate::domain::position::Position;
use crate::domain::signal::{Direction, Signal};
use crate::domain::sizing::TradePlan;
use crate::domain::strategy::StrategyInfo;
use crate::domain::timeframe::Timeframe;
use crate::domain::trend::{RetestSetup, Trend};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeView {
    pub timeframe: Timeframe,
    pub trend: Trend,
    pub signal: Signal,
    pub last_pivot_high: Option<f64>,
    pub pivot_high_time: Option<NaiveDateTime>,
    pub last_pivot_low: Option<f64>,
    pub pivot_low_time: Option<NaiveDateTime>,
    pub structure_high: Option<f64>,
    pub structure_low: Option<f64>,
    pub retest: Option<RetestSetup>,
    pub bars: usize,
    pub insufficient_data: bool,
    pub latched: bool,
}

impl From<&TimeframeReading> for TimeframeView {
    fn from(r: &TimeframeReading) -> Self {
        let (structure_high, structure_low) = match r.state.trend {
            Trend::Uptrend => (r.state.last_higher_high, r.state.last_higher_low),
            Trend::Downtrend => (r.state.last_lower_high, r.state.last_lower_low),
            Trend::None => (None, None),
        };
        TimeframeView {
            timeframe: r.timeframe,
            trend: r.state.trend,
            signal: r.signal,
            last_pivot_high: r.last_pivot_high,
            pivot_high_time: r.pivot_high_time,
            last_pivot_low: r.last_pivot_low,
            pivot_low_time: r.pivot_low_time,
            structure_high,
            structure_low,
            retest: r.state.retest,
            bars: r.bars,
            insufficient_data: r.insufficient_data,
            latched: r.latched,
        }
    }
}

/// The most recent decision and the cycle that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub timestamp: NaiveDateTime,
    pub decision: Decision,
}

/// What happened to the cycle's entry decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    NoSignal,
    Blocked { reason: String },
    Placed { ticket: u64, plan: TradePlan },
    Rejected { reason: String, plan: TradePlan },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSnapshot {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub strategy: StrategyInfo,
    pub timeframes: Vec<TimeframeView>,
    pub overall_direction: Option<Direction>,
    pub decision: Option<Decision>,
    /// Survives cycles without a decision; display only.
    pub last_decision: Option<DecisionRecord>,
    pub entry: EntryOutcome,
    pub management: Vec<ManagementAction>,
    pub positions: Vec<Position>,
    pub account: Option<AccountInfo>,
    pub drawdown_pct: Option<f64>,
    pub entries_blocked: bool,
    pub mid_price: Option<f64>,
}

impl CycleSnapshot {
    pub fn new(timestamp: NaiveDateTime, symbol: &str, strategy: StrategyInfo) -> Self {
        CycleSnapshot {
            timestamp,
            symbol: symbol.to_string(),
            strategy,
            timeframes: Vec::new(),
            overall_direction: None,
            decision: None,
            last_decision: None,
            entry: EntryOutcome::NoSignal,
            management: Vec::new(),
            positions: Vec::new(),
            account: None,
            drawdown_pct: None,
            entries_blocked: false,
            mid_price: None,
        }
    }

    pub fn record_evaluation(&mut self, evaluation: &Evaluation) {
        self.timeframes = evaluation.readings.iter().map(TimeframeView::from).collect();
        self.overall_direction = evaluation.overall_direction();
        self.decision = evaluation.decision.clone();
    }
}
