//! Configuration validation.
//!
//! Validates every numeric key before `TradingConfig` is built, so a bad INI
//! file fails at startup rather than mid-cycle.

use crate::domain::error::SwingError;
use crate::ports::config_port::ConfigPort;

pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<(), SwingError> {
    validate_portfolio(config)?;
    validate_risk(config)?;
    validate_scanner(config)?;
    validate_monitor(config)?;
    validate_scheduler(config)?;
    validate_data(config)?;
    validate_log(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> SwingError {
    SwingError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_portfolio(config: &dyn ConfigPort) -> Result<(), SwingError> {
    if config.get_double("portfolio", "starting_cash", 150_000.0) <= 0.0 {
        return Err(invalid(
            "portfolio",
            "starting_cash",
            "starting_cash must be positive",
        ));
    }
    if config.get_double("portfolio", "commission", 10.0) < 0.0 {
        return Err(invalid(
            "portfolio",
            "commission",
            "commission must be non-negative",
        ));
    }
    if config.get_double("portfolio", "commission_pct", 0.0) < 0.0 {
        return Err(invalid(
            "portfolio",
            "commission_pct",
            "commission_pct must be non-negative",
        ));
    }
    let slippage = config.get_double("portfolio", "slippage_pct", 0.1);
    if !(0.0..100.0).contains(&slippage) {
        return Err(invalid(
            "portfolio",
            "slippage_pct",
            "slippage_pct must be between 0 and 100",
        ));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), SwingError> {
    let risk = config.get_double("risk", "risk_pct", 0.02);
    if risk <= 0.0 || risk > 1.0 {
        return Err(invalid("risk", "risk_pct", "risk_pct must be in (0, 1]"));
    }
    if config.get_int("risk", "max_positions", 10) < 1 {
        return Err(invalid(
            "risk",
            "max_positions",
            "max_positions must be at least 1",
        ));
    }
    for key in ["max_drawdown_pct", "daily_loss_limit_pct"] {
        let default = if key == "max_drawdown_pct" { 10.0 } else { 3.0 };
        let value = config.get_double("risk", key, default);
        if value <= 0.0 || value > 100.0 {
            return Err(invalid("risk", key, "percentage must be in (0, 100]"));
        }
    }
    Ok(())
}

fn validate_scanner(config: &dyn ConfigPort) -> Result<(), SwingError> {
    let fast = config.get_int("scanner", "fast_period", 8);
    let slow = config.get_int("scanner", "slow_period", 21);
    if fast < 1 {
        return Err(invalid("scanner", "fast_period", "fast_period must be at least 1"));
    }
    if slow <= fast {
        return Err(invalid(
            "scanner",
            "slow_period",
            "slow_period must be greater than fast_period",
        ));
    }

    let oscillator = config.get_int("scanner", "oscillator_period", 14);
    if oscillator < 1 {
        return Err(invalid(
            "scanner",
            "oscillator_period",
            "oscillator_period must be at least 1",
        ));
    }

    let low = config.get_double("scanner", "oscillator_low", 0.30);
    let high = config.get_double("scanner", "oscillator_high", 0.35);
    if !(0.0..=1.0).contains(&low) {
        return Err(invalid(
            "scanner",
            "oscillator_low",
            "oscillator_low must be between 0 and 1",
        ));
    }
    if !(0.0..=1.0).contains(&high) || high < low {
        return Err(invalid(
            "scanner",
            "oscillator_high",
            "oscillator_high must be between oscillator_low and 1",
        ));
    }

    if config.get_int("scanner", "swing_lookback", 40) < 2 {
        return Err(invalid(
            "scanner",
            "swing_lookback",
            "swing_lookback must be at least 2",
        ));
    }
    if config.get_int("scanner", "pivot_bars", 5) < 1 {
        return Err(invalid("scanner", "pivot_bars", "pivot_bars must be at least 1"));
    }

    let t1 = config.get_double("scanner", "target1_extension", 1.272);
    let t2 = config.get_double("scanner", "target2_extension", 1.618);
    if t1 <= 1.0 {
        return Err(invalid(
            "scanner",
            "target1_extension",
            "target1_extension must be greater than 1",
        ));
    }
    if t2 <= t1 {
        return Err(invalid(
            "scanner",
            "target2_extension",
            "target2_extension must be greater than target1_extension",
        ));
    }

    let minimum = slow.max(oscillator + 1) + 1;
    if config.get_int("scanner", "lookback_bars", 90) < minimum {
        return Err(invalid(
            "scanner",
            "lookback_bars",
            &format!("lookback_bars must be at least {}", minimum),
        ));
    }
    Ok(())
}

fn validate_monitor(config: &dyn ConfigPort) -> Result<(), SwingError> {
    let fraction = config.get_double("monitor", "target1_fraction", 0.25);
    if fraction <= 0.0 || fraction >= 1.0 {
        return Err(invalid(
            "monitor",
            "target1_fraction",
            "target1_fraction must be in (0, 1)",
        ));
    }
    let buffer = config.get_double("monitor", "trailing_buffer_pct", 0.5);
    if !(0.0..100.0).contains(&buffer) {
        return Err(invalid(
            "monitor",
            "trailing_buffer_pct",
            "trailing_buffer_pct must be between 0 and 100",
        ));
    }
    Ok(())
}

fn validate_scheduler(config: &dyn ConfigPort) -> Result<(), SwingError> {
    for (key, default) in [
        ("interval_minutes", 60),
        ("fetch_timeout_secs", 30),
        ("max_workers", 4),
    ] {
        if config.get_int("scheduler", key, default) < 1 {
            return Err(invalid("scheduler", key, "value must be at least 1"));
        }
    }
    Ok(())
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), SwingError> {
    if config.get_int("data", "cache_ttl_secs", 300) < 0 {
        return Err(invalid(
            "data",
            "cache_ttl_secs",
            "cache_ttl_secs must be non-negative",
        ));
    }
    if config.get_int("sqlite", "pool_size", 4) < 1 {
        return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

fn validate_log(config: &dyn ConfigPort) -> Result<(), SwingError> {
    match config.get_string("log", "format").as_deref().map(str::trim) {
        None | Some("text") | Some("json") => Ok(()),
        Some(_) => Err(invalid("log", "format", "format must be text or json")),
    }
}
