//! Configuration validation.
//!
//! Runs before the engine is built; every rejection names the section and key.

use crate::domain::error::EngineError;
use crate::domain::pivot::min_bars_for_depth;
use crate::domain::strategy::StrategyKind;
use crate::domain::timeframe::{Timeframe, parse_timeframes};
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let timeframes = validate_engine_config(config)?;
    validate_structure_config(config, timeframes.len())?;
    validate_risk_config(config)?;
    validate_management_config(config)?;
    validate_stochastic_config(config)?;
    Ok(())
}

/// Validates `[engine]` and returns the parsed timeframe list.
pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<Vec<Timeframe>, EngineError> {
    require_string(config, "engine", "symbol")?;
    let timeframes = validate_timeframes(config)?;

    if config.get_int("engine", "lookback", 100) < 1 {
        return Err(EngineError::invalid(
            "engine",
            "lookback",
            "lookback must be at least 1",
        ));
    }
    if config.get_double("engine", "lot_size", 0.1) <= 0.0 {
        return Err(EngineError::invalid(
            "engine",
            "lot_size",
            "lot_size must be positive",
        ));
    }
    if config.get_int("engine", "magic", 234000) < 0 {
        return Err(EngineError::invalid(
            "engine",
            "magic",
            "magic must be non-negative",
        ));
    }
    if config.get_int("engine", "max_positions", 1) < 1 {
        return Err(EngineError::invalid(
            "engine",
            "max_positions",
            "max_positions must be at least 1",
        ));
    }
    if config.get_int("engine", "update_interval", 60) < 1 {
        return Err(EngineError::invalid(
            "engine",
            "update_interval",
            "update_interval must be at least 1 second",
        ));
    }
    if let Some(name) = config.get_string("engine", "strategy") {
        name.parse::<StrategyKind>()
            .map_err(|e| EngineError::invalid("engine", "strategy", e))?;
    }
    Ok(timeframes)
}

fn validate_timeframes(config: &dyn ConfigPort) -> Result<Vec<Timeframe>, EngineError> {
    let raw = require_string(config, "engine", "timeframes")?;
    parse_timeframes(&raw).map_err(|e| EngineError::invalid("engine", "timeframes", e))
}

pub fn validate_structure_config(
    config: &dyn ConfigPort,
    timeframe_count: usize,
) -> Result<(), EngineError> {
    let depth = config.get_int("structure", "pivot_depth", 1);
    if depth < 1 {
        return Err(EngineError::invalid(
            "structure",
            "pivot_depth",
            "pivot_depth must be at least 1",
        ));
    }
    let lookback = config.get_int("engine", "lookback", 100);
    if lookback < min_bars_for_depth(depth as usize) as i64 {
        return Err(EngineError::invalid(
            "engine",
            "lookback",
            format!("lookback must be at least 2 * pivot_depth + 1 ({})", 2 * depth + 1),
        ));
    }
    non_negative(config, "structure", "break_buffer_pips", 0.0)?;

    let min_tf = config.get_int("structure", "min_tf_confirmation", 1);
    if min_tf < 1 || min_tf as usize > timeframe_count {
        return Err(EngineError::invalid(
            "structure",
            "min_tf_confirmation",
            format!("min_tf_confirmation must be between 1 and {timeframe_count}"),
        ));
    }
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if config.get_int("risk", "atr_period", 14) < 1 {
        return Err(EngineError::invalid(
            "risk",
            "atr_period",
            "atr_period must be at least 1",
        ));
    }
    non_negative(config, "risk", "atr_multiplier_sl", 1.5)?;
    non_negative(config, "risk", "atr_multiplier_tp", 3.0)?;
    non_negative(config, "risk", "reward_ratio", 2.0)?;
    non_negative(config, "risk", "daily_drawdown_limit_pct", 5.0)?;

    let risk_pct = config.get_double("risk", "risk_per_trade_pct", 1.0);
    if !(0.0..=100.0).contains(&risk_pct) {
        return Err(EngineError::invalid(
            "risk",
            "risk_per_trade_pct",
            "risk_per_trade_pct must be between 0 and 100",
        ));
    }

    let min_volume = config.get_double("risk", "min_volume", 0.01);
    let max_volume = config.get_double("risk", "max_volume", 10.0);
    if min_volume <= 0.0 {
        return Err(EngineError::invalid(
            "risk",
            "min_volume",
            "min_volume must be positive",
        ));
    }
    if min_volume > max_volume {
        return Err(EngineError::invalid(
            "risk",
            "min_volume",
            "min_volume must not exceed max_volume",
        ));
    }
    Ok(())
}

pub fn validate_management_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    non_negative(config, "management", "break_even_pips", 10.0)?;
    non_negative(config, "management", "break_even_buffer_pips", 1.0)?;
    non_negative(config, "management", "trailing_distance_pips", 15.0)?;
    non_negative(config, "management", "partial_close_pips", 20.0)?;
    non_negative(config, "management", "scale_out_target_pips", 40.0)?;

    let pct = config.get_double("management", "partial_close_pct", 50.0);
    if pct <= 0.0 || pct > 100.0 {
        return Err(EngineError::invalid(
            "management",
            "partial_close_pct",
            "partial_close_pct must be in (0, 100]",
        ));
    }
    Ok(())
}

pub fn validate_stochastic_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    for (key, default) in [
        ("k_period", 5),
        ("d_period", 3),
        ("slowing", 3),
        ("trend_period", 50),
    ] {
        if config.get_int("stochastic", key, default) < 1 {
            return Err(EngineError::invalid(
                "stochastic",
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }

    let overbought = config.get_double("stochastic", "overbought", 80.0);
    let oversold = config.get_double("stochastic", "oversold", 20.0);
    if !(0.0..=100.0).contains(&overbought) || !(0.0..=100.0).contains(&oversold) {
        return Err(EngineError::invalid(
            "stochastic",
            "overbought",
            "overbought and oversold must be between 0 and 100",
        ));
    }
    if oversold >= overbought {
        return Err(EngineError::invalid(
            "stochastic",
            "oversold",
            "oversold must be below overbought",
        ));
    }
    non_negative(config, "stochastic", "stop_loss_pips", 5.0)?;
    Ok(())
}

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, EngineError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(EngineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), EngineError> {
    if config.get_double(section, key, default) < 0.0 {
        return Err(EngineError::invalid(
            section,
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(())
}
