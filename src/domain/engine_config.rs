//! Typed engine configuration read through [`ConfigPort`].

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::aggregator::StructureParams;
use crate::domain::config_validation::validate_config;
use crate::domain::error::EngineError;
use crate::domain::indicator::StochasticParams;
use crate::domain::management::ManagementParams;
use crate::domain::sizing::RiskParams;
use crate::domain::strategy::{StochasticConfig, StrategyKind};
use crate::domain::timeframe::{Timeframe, parse_timeframes};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_JOURNAL_PATH: &str = "trade_journal.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub symbol: String,
    /// Precedence order; the last entry is the execution timeframe.
    pub timeframes: Vec<Timeframe>,
    pub lookback: usize,
    pub magic: u64,
    pub max_positions: usize,
    pub update_interval: Duration,
    pub strategy: StrategyKind,
    pub structure: StructureParams,
    pub atr_period: usize,
    pub risk: RiskParams,
    pub daily_drawdown_limit_pct: f64,
    pub management: ManagementParams,
    pub stochastic: StochasticConfig,
    pub journal_path: PathBuf,
    pub snapshot_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Validates and reads the whole configuration.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        validate_config(config)?;

        let symbol = config
            .get_string("engine", "symbol")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let raw_timeframes = config
            .get_string("engine", "timeframes")
            .unwrap_or_default();
        let timeframes = parse_timeframes(&raw_timeframes)
            .map_err(|e| EngineError::invalid("engine", "timeframes", e))?;
        let strategy = match config.get_string("engine", "strategy") {
            Some(name) => name
                .parse()
                .map_err(|e: String| EngineError::invalid("engine", "strategy", e))?,
            None => StrategyKind::MarketStructure,
        };

        let structure = StructureParams {
            pivot_depth: config.get_int("structure", "pivot_depth", 1) as usize,
            break_buffer_pips: config.get_double("structure", "break_buffer_pips", 0.0),
            retest_enabled: config.get_bool("structure", "retest_enabled", false),
            min_confirmation: config.get_int("structure", "min_tf_confirmation", 1) as usize,
        };

        let risk = RiskParams {
            atr_multiplier_sl: config.get_double("risk", "atr_multiplier_sl", 1.5),
            atr_multiplier_tp: config.get_double("risk", "atr_multiplier_tp", 3.0),
            dynamic_sl_enabled: config.get_bool("risk", "dynamic_sl_enabled", false),
            reward_ratio: config.get_double("risk", "reward_ratio", 2.0),
            risk_per_trade_pct: config.get_double("risk", "risk_per_trade_pct", 1.0),
            default_volume: config.get_double("engine", "lot_size", 0.1),
            min_volume: config.get_double("risk", "min_volume", 0.01),
            max_volume: config.get_double("risk", "max_volume", 10.0),
        };

        let management = ManagementParams {
            break_even_enabled: config.get_bool("management", "break_even_enabled", true),
            break_even_pips: config.get_double("management", "break_even_pips", 10.0),
            break_even_buffer_pips: config.get_double("management", "break_even_buffer_pips", 1.0),
            trailing_enabled: config.get_bool("management", "trailing_enabled", false),
            trailing_distance_pips: config.get_double("management", "trailing_distance_pips", 15.0),
            partial_close_enabled: config.get_bool("management", "partial_close_enabled", false),
            partial_close_pct: config.get_double("management", "partial_close_pct", 50.0),
            partial_close_pips: config.get_double("management", "partial_close_pips", 20.0),
            scale_out_enabled: config.get_bool("management", "scale_out_enabled", false),
            scale_out_target_pips: config.get_double("management", "scale_out_target_pips", 40.0),
        };

        let stochastic = StochasticConfig {
            params: StochasticParams {
                k_period: config.get_int("stochastic", "k_period", 5) as usize,
                d_period: config.get_int("stochastic", "d_period", 3) as usize,
                slowing: config.get_int("stochastic", "slowing", 3) as usize,
            },
            overbought: config.get_double("stochastic", "overbought", 80.0),
            oversold: config.get_double("stochastic", "oversold", 20.0),
            trend_period: config.get_int("stochastic", "trend_period", 50) as usize,
            stop_loss_pips: config.get_double("stochastic", "stop_loss_pips", 5.0),
        };

        let journal_path = config
            .get_path("journal", "path")
            .unwrap_or_else(|| PathBuf::from(DEFAULT_JOURNAL_PATH));
        let snapshot_path = config.get_path("dashboard", "snapshot_path");

        Ok(EngineConfig {
            symbol,
            timeframes,
            lookback: config.get_int("engine", "lookback", 100) as usize,
            magic: config.get_int("engine", "magic", 234000) as u64,
            max_positions: config.get_int("engine", "max_positions", 1) as usize,
            update_interval: Duration::from_secs(
                config.get_int("engine", "update_interval", 60) as u64,
            ),
            strategy,
            structure,
            atr_period: config.get_int("risk", "atr_period", 14) as usize,
            risk,
            daily_drawdown_limit_pct: config.get_double("risk", "daily_drawdown_limit_pct", 5.0),
            management,
            stochastic,
            journal_path,
            snapshot_path,
        })
    }

    /// Lowest timeframe in the list; ATR and entry quotes come from it.
    pub fn execution_timeframe(&self) -> Timeframe {
        self.timeframes.last().copied().unwrap_or(Timeframe::M1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn defaults_apply() {
        let config =
            FileConfigAdapter::from_string("[engine]\nsymbol = EURUSD\ntimeframes = H4,H1,M15\n")
                .unwrap();
        let cfg = EngineConfig::from_config(&config).unwrap();
        assert_eq!(cfg.symbol, "EURUSD");
        assert_eq!(cfg.timeframes, vec![Timeframe::H4, Timeframe::H1, Timeframe::M15]);
        assert_eq!(cfg.execution_timeframe(), Timeframe::M15);
        assert_eq!(cfg.lookback, 100);
        assert_eq!(cfg.magic, 234000);
        assert_eq!(cfg.max_positions, 1);
        assert_eq!(cfg.update_interval, Duration::from_secs(60));
        assert_eq!(cfg.strategy, StrategyKind::MarketStructure);
        assert_eq!(cfg.structure, StructureParams::default());
        assert_eq!(cfg.risk, RiskParams::default());
        assert_eq!(cfg.management, ManagementParams::default());
        assert_eq!(cfg.stochastic, StochasticConfig::default());
        assert_eq!(cfg.atr_period, 14);
        assert_eq!(cfg.daily_drawdown_limit_pct, 5.0);
        assert_eq!(cfg.journal_path, PathBuf::from("trade_journal.csv"));
        assert_eq!(cfg.snapshot_path, None);
    }

    #[test]
    fn reads_every_section() {
        let config = FileConfigAdapter::from_string(
            r#"
[engine]
symbol = GBPUSD
timeframes = TIMEFRAME_H1, TIMEFRAME_M5
lot_size = 0.5
strategy = stochastic
update_interval = 5

[structure]
pivot_depth = 3
retest_enabled = true
min_tf_confirmation = 2

[risk]
dynamic_sl_enabled = yes
risk_per_trade_pct = 0

[management]
trailing_enabled = 1
break_even_pips = 12.5

[stochastic]
k_period = 14

[journal]
path = /tmp/journal.csv

[dashboard]
snapshot_path = /tmp/snapshot.json
"#,
        )
        .unwrap();
        let cfg = EngineConfig::from_config(&config).unwrap();
        assert_eq!(cfg.symbol, "GBPUSD");
        assert_eq!(cfg.timeframes, vec![Timeframe::H1, Timeframe::M5]);
        assert_eq!(cfg.strategy, StrategyKind::Stochastic);
        assert_eq!(cfg.update_interval, Duration::from_secs(5));
        assert_eq!(cfg.structure.pivot_depth, 3);
        assert!(cfg.structure.retest_enabled);
        assert_eq!(cfg.structure.min_confirmation, 2);
        assert!(cfg.risk.dynamic_sl_enabled);
        assert_eq!(cfg.risk.risk_per_trade_pct, 0.0);
        assert_eq!(cfg.risk.default_volume, 0.5);
        assert!(cfg.management.trailing_enabled);
        assert_eq!(cfg.management.break_even_pips, 12.5);
        assert_eq!(cfg.stochastic.params.k_period, 14);
        assert_eq!(cfg.journal_path, PathBuf::from("/tmp/journal.csv"));
        assert_eq!(cfg.snapshot_path, Some(PathBuf::from("/tmp/snapshot.json")));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = FileConfigAdapter::from_string(
            "[engine]\nsymbol = EURUSD\ntimeframes = H1\nmax_positions = 0\n",
        )
        .unwrap();
        assert!(matches!(
            EngineConfig::from_config(&config),
            Err(EngineError::ConfigInvalid { .. })
        ));
    }
}
