//! Strategy variants.
//!
//! The variant is chosen once from configuration; every cycle the engine
//! calls [`Strategy::calculate_signals`] regardless of which one is active.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::domain::aggregator::{
    DailyLatch, Decision, Evaluation, MultiTimeframeAggregator, StructureParams, TimeframeReading,
};
use crate::domain::bar::Bar;
use crate::domain::indicator::{StochasticParams, calculate_stochastic, sma_last};
use crate::domain::signal::Signal;
use crate::domain::symbol::SymbolInfo;
use crate::domain::timeframe::Timeframe;
use crate::domain::trend::{Trend, TrendState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MarketStructure,
    Stochastic,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market_structure" => Ok(StrategyKind::MarketStructure),
            "stochastic" => Ok(StrategyKind::Stochastic),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::MarketStructure => write!(f, "market_structure"),
            StrategyKind::Stochastic => write!(f, "stochastic"),
        }
    }
}

/// Human-readable description of a strategy, shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub bull_conditions: Vec<&'static str>,
    pub bear_conditions: Vec<&'static str>,
    pub exit_conditions: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticConfig {
    pub params: StochasticParams,
    pub overbought: f64,
    pub oversold: f64,
    pub trend_period: usize,
    pub stop_loss_pips: f64,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        StochasticConfig {
            params: StochasticParams::default(),
            overbought: 80.0,
            oversold: 20.0,
            trend_period: 50,
            stop_loss_pips: 5.0,
        }
    }
}

/// Oscillator crossover strategy on the execution timeframe.
///
/// Long: %K crosses above %D while the close is above its SMA and %K is
/// below the oversold level. Short is the mirror image.
#[derive(Debug, Clone)]
pub struct StochasticStrategy {
    timeframe: Timeframe,
    config: StochasticConfig,
    latch: DailyLatch,
}

impl StochasticStrategy {
    pub fn new(timeframe: Timeframe, config: StochasticConfig) -> Self {
        StochasticStrategy {
            timeframe,
            config,
            latch: DailyLatch::default(),
        }
    }

    pub fn trend(&self, bars: &[Bar]) -> Trend {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        // Strictly more bars than the period, as with a warmed-up SMA.
        if closes.len() <= self.config.trend_period {
            return Trend::None;
        }
        let (Some(sma), Some(last)) = (sma_last(&closes, self.config.trend_period), closes.last())
        else {
            return Trend::None;
        };
        if *last > sma {
            Trend::Uptrend
        } else if *last < sma {
            Trend::Downtrend
        } else {
            Trend::None
        }
    }

    pub fn signal(&self, bars: &[Bar]) -> Signal {
        let p = self.config.params;
        if bars.len() < p.k_period + p.d_period {
            return Signal::None;
        }
        let series = calculate_stochastic(bars, p);
        let Some(((prev_k, prev_d), (k, d))) = series.last_two() else {
            return Signal::None;
        };
        let trend = self.trend(bars);

        if prev_k < prev_d && k > d && trend == Trend::Uptrend && k < self.config.oversold {
            Signal::Bull
        } else if prev_k > prev_d
            && k < d
            && trend == Trend::Downtrend
            && k > self.config.overbought
        {
            Signal::Bear
        } else {
            Signal::None
        }
    }

    fn evaluate(
        &mut self,
        windows: &HashMap<Timeframe, Vec<Bar>>,
        today: NaiveDate,
    ) -> Evaluation {
        let bars = windows
            .get(&self.timeframe)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let p = self.config.params;
        let state = TrendState {
            trend: self.trend(bars),
            ..TrendState::default()
        };

        if bars.len() < p.k_period + p.d_period {
            let reading = TimeframeReading::skipped(self.timeframe, state, bars.len());
            return Evaluation {
                readings: vec![reading],
                decision: None,
            };
        }

        let signal = self.signal(bars);
        let last = bars.last();
        let reading = TimeframeReading {
            timeframe: self.timeframe,
            signal,
            state,
            last_pivot_high: last.map(|b| b.high),
            pivot_high_time: last.map(|b| b.timestamp),
            last_pivot_low: last.map(|b| b.low),
            pivot_low_time: last.map(|b| b.timestamp),
            bars: bars.len(),
            insufficient_data: false,
            latched: self.latch.is_latched(self.timeframe, today),
        };
        debug!(timeframe = %self.timeframe, signal = %signal, "stochastic evaluated");

        let decision = match (signal.direction(), reading.latched) {
            (Some(direction), false) => Some(Decision {
                direction,
                timeframe: self.timeframe,
                reference_high: reading.last_pivot_high,
                reference_low: reading.last_pivot_low,
            }),
            _ => None,
        };
        Evaluation {
            readings: vec![reading],
            decision,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Strategy {
    MarketStructure(MultiTimeframeAggregator),
    Stochastic(StochasticStrategy),
}

impl Strategy {
    /// Builds the configured variant. The stochastic variant runs on the
    /// execution timeframe, the last in the precedence list.
    pub fn from_kind(
        kind: StrategyKind,
        timeframes: &[Timeframe],
        structure: StructureParams,
        stochastic: StochasticConfig,
    ) -> Self {
        match kind {
            StrategyKind::MarketStructure => Strategy::MarketStructure(
                MultiTimeframeAggregator::new(timeframes.to_vec(), structure),
            ),
            StrategyKind::Stochastic => {
                let tf = timeframes.last().copied().unwrap_or(Timeframe::M1);
                Strategy::Stochastic(StochasticStrategy::new(tf, stochastic))
            }
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::MarketStructure(_) => StrategyKind::MarketStructure,
            Strategy::Stochastic(_) => StrategyKind::Stochastic,
        }
    }

    pub fn calculate_signals(
        &mut self,
        windows: &HashMap<Timeframe, Vec<Bar>>,
        symbol: &SymbolInfo,
        today: NaiveDate,
    ) -> Evaluation {
        match self {
            Strategy::MarketStructure(agg) => agg.evaluate(windows, symbol, today),
            Strategy::Stochastic(stoch) => stoch.evaluate(windows, today),
        }
    }

    pub fn mark_fired(&mut self, timeframe: Timeframe, today: NaiveDate) {
        match self {
            Strategy::MarketStructure(agg) => agg.mark_fired(timeframe, today),
            Strategy::Stochastic(stoch) => stoch.latch.mark(timeframe, today),
        }
    }

    /// Whether stops must come from the decision's reference levels.
    pub fn requires_structure_stop(&self) -> bool {
        matches!(self, Strategy::Stochastic(_))
    }

    /// Distance, in pips, kept between a structure stop and its reference level.
    pub fn stop_buffer_pips(&self) -> f64 {
        match self {
            Strategy::MarketStructure(agg) => agg.params().break_buffer_pips,
            Strategy::Stochastic(stoch) => stoch.config.stop_loss_pips,
        }
    }

    pub fn info(&self) -> StrategyInfo {
        match self {
            Strategy::MarketStructure(_) => StrategyInfo {
                name: "Market Structure",
                description: "Trades shifts in market structure: a close beyond the last \
                              opposing swing level of a confirmed trend, optionally after a \
                              retest.",
                bull_conditions: vec![
                    "Bullish structure break",
                    "Close above last lower high",
                    "Multiple timeframes confirm",
                ],
                bear_conditions: vec![
                    "Bearish structure break",
                    "Close below last higher low",
                    "Multiple timeframes confirm",
                ],
                exit_conditions: vec![
                    "Structure shift",
                    "Take profit hit",
                    "Stop loss hit",
                    "Break even triggered",
                ],
            },
            Strategy::Stochastic(_) => StrategyInfo {
                name: "Stochastic Oscillator",
                description: "Scalps %K/%D crossovers at oscillator extremes in the direction \
                              of the moving-average trend.",
                bull_conditions: vec![
                    "Uptrend detected",
                    "Stochastic oversold",
                    "%K crosses above %D",
                ],
                bear_conditions: vec![
                    "Downtrend detected",
                    "Stochastic overbought",
                    "%K crosses below %D",
                ],
                exit_conditions: vec![
                    "Opposite signal generated",
                    "Take profit hit",
                    "Stop loss hit",
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Direction;
    use crate::domain::symbol::forex_symbol;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn bars_from_closes(rows: &[(f64, f64, f64)]) -> Vec<Bar> {
        rows.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Bar {
                timestamp: day().and_hms_opt(0, 0, 0).unwrap()
                    + chrono::Duration::minutes(i as i64),
                open: close,
                high,
                low,
                close,
            })
            .collect()
    }

    fn quick_config() -> StochasticConfig {
        StochasticConfig {
            params: StochasticParams {
                k_period: 3,
                d_period: 2,
                slowing: 1,
            },
            overbought: 80.0,
            oversold: 60.0,
            trend_period: 3,
            stop_loss_pips: 5.0,
        }
    }

    /// Rising closes, a dip, then a partial recovery: %K crosses back above
    /// %D from below while price stays above its 3-bar mean.
    fn bullish_cross() -> Vec<Bar> {
        bars_from_closes(&[
            (10.0, 9.0, 9.5),
            (11.0, 10.0, 10.5),
            (12.0, 11.0, 11.5),
            (13.0, 12.0, 12.9),
            (13.0, 11.0, 11.2),
            (13.0, 11.0, 12.1),
        ])
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("market_structure".parse(), Ok(StrategyKind::MarketStructure));
        assert_eq!("Stochastic".parse(), Ok(StrategyKind::Stochastic));
        assert!("grid".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::Stochastic.to_string(), "stochastic");
    }

    #[test]
    fn factory_builds_variant() {
        let tfs = [Timeframe::H1, Timeframe::M5];
        let ms = Strategy::from_kind(
            StrategyKind::MarketStructure,
            &tfs,
            StructureParams {
                break_buffer_pips: 3.0,
                ..StructureParams::default()
            },
            StochasticConfig::default(),
        );
        assert_eq!(ms.kind(), StrategyKind::MarketStructure);
        assert!(!ms.requires_structure_stop());
        assert_eq!(ms.stop_buffer_pips(), 3.0);

        let st = Strategy::from_kind(
            StrategyKind::Stochastic,
            &tfs,
            StructureParams::default(),
            StochasticConfig::default(),
        );
        assert_eq!(st.kind(), StrategyKind::Stochastic);
        assert!(st.requires_structure_stop());
        assert_eq!(st.stop_buffer_pips(), 5.0);
        match st {
            Strategy::Stochastic(s) => assert_eq!(s.timeframe, Timeframe::M5),
            _ => panic!("expected stochastic"),
        }
    }

    #[test]
    fn stochastic_trend_needs_more_than_period() {
        let s = StochasticStrategy::new(Timeframe::M5, quick_config());
        let bars = bars_from_closes(&[(1.0, 1.0, 1.0), (2.0, 2.0, 2.0), (3.0, 3.0, 3.0)]);
        assert_eq!(s.trend(&bars), Trend::None);

        let bars = bars_from_closes(&[
            (1.0, 1.0, 1.0),
            (2.0, 2.0, 2.0),
            (3.0, 3.0, 3.0),
            (4.0, 4.0, 4.0),
        ]);
        assert_eq!(s.trend(&bars), Trend::Uptrend);
    }

    #[test]
    fn stochastic_bull_cross() {
        let s = StochasticStrategy::new(Timeframe::M5, quick_config());
        assert_eq!(s.signal(&bullish_cross()), Signal::Bull);
    }

    #[test]
    fn stochastic_short_window_is_none() {
        let s = StochasticStrategy::new(Timeframe::M5, quick_config());
        let bars = bars_from_closes(&[(10.0, 9.0, 9.5), (11.0, 10.0, 10.5)]);
        assert_eq!(s.signal(&bars), Signal::None);
    }

    #[test]
    fn stochastic_decision_and_latch() {
        let mut strategy =
            Strategy::Stochastic(StochasticStrategy::new(Timeframe::M5, quick_config()));
        let mut windows = HashMap::new();
        windows.insert(Timeframe::M5, bullish_cross());

        let eval = strategy.calculate_signals(&windows, &forex_symbol(), day());
        let decision = eval.decision.unwrap();
        assert_eq!(decision.direction, Direction::Bull);
        assert_eq!(decision.reference_low, Some(11.0));
        assert_eq!(decision.reference_high, Some(13.0));

        strategy.mark_fired(Timeframe::M5, day());
        let eval = strategy.calculate_signals(&windows, &forex_symbol(), day());
        assert!(eval.decision.is_none());
        assert!(eval.readings[0].latched);
    }

    #[test]
    fn info_differs_by_variant() {
        let ms = Strategy::from_kind(
            StrategyKind::MarketStructure,
            &[Timeframe::H1],
            StructureParams::default(),
            StochasticConfig::default(),
        );
        assert_eq!(ms.info().name, "Market Structure");
        assert_eq!(ms.info().bull_conditions.len(), 3);
    }
}
