//! Range checks for every configurable value.
//!
//! Missing keys are fine (defaults apply); present keys must be usable.

use crate::domain::backtest::{MAX_LOOKBACK_DAYS, MAX_PREFETCH_YEARS};
use crate::domain::error::HedgeError;
use crate::ports::config_port::ConfigPort;

pub const SIZING_MODES: &[&str] = &["decision", "fixed", "risk"];
pub const STORE_BACKENDS: &[&str] = &["none", "sqlite", "supabase"];
const MAX_MENTION_DAYS: f64 = 3650.0;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), HedgeError> {
    validate_trading(config)?;
    validate_risk(config)?;
    validate_portfolio_manager(config)?;
    validate_backtest(config)?;
    validate_services(config)?;
    validate_scan(config)?;
    validate_mentions(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> HedgeError {
    HedgeError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// A present key whose value does not parse as a number is an error, not a silent default.
fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, HedgeError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

fn positive(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), HedgeError> {
    if let Some(v) = number(config, section, key)? {
        if v <= 0.0 {
            return Err(invalid(section, key, format!("{key} must be positive")));
        }
    }
    Ok(())
}

fn at_least(config: &dyn ConfigPort, section: &str, key: &str, min: f64) -> Result<(), HedgeError> {
    if let Some(v) = number(config, section, key)? {
        if v < min {
            return Err(invalid(section, key, format!("{key} must be at least {min}")));
        }
    }
    Ok(())
}

fn at_most(config: &dyn ConfigPort, section: &str, key: &str, max: f64) -> Result<(), HedgeError> {
    if let Some(v) = number(config, section, key)? {
        if v > max {
            return Err(invalid(section, key, format!("{key} must be at most {max}")));
        }
    }
    Ok(())
}

fn fraction(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), HedgeError> {
    if let Some(v) = number(config, section, key)? {
        if v <= 0.0 || v > 1.0 {
            return Err(invalid(section, key, format!("{key} must be in (0, 1]")));
        }
    }
    Ok(())
}

fn confidence(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), HedgeError> {
    if let Some(v) = number(config, section, key)? {
        if !(0.0..=100.0).contains(&v) {
            return Err(invalid(section, key, format!("{key} must be between 0 and 100")));
        }
    }
    Ok(())
}

fn one_of(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), HedgeError> {
    if let Some(v) = config.get_string(section, key) {
        if !allowed.contains(&v.trim().to_ascii_lowercase().as_str()) {
            return Err(invalid(
                section,
                key,
                format!("'{v}' is not one of {}", allowed.join(", ")),
            ));
        }
    }
    Ok(())
}

fn validate_trading(config: &dyn ConfigPort) -> Result<(), HedgeError> {
    positive(config, "trading", "initial_cash")?;
    positive(config, "trading", "trade_amount")?;
    at_least(config, "trading", "leverage", 1.0)?;
    one_of(config, "trading", "sizing", SIZING_MODES)
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), HedgeError> {
    fraction(config, "risk", "max_position_pct")?;
    fraction(config, "risk", "buying_power_pct")?;
    if let Some(v) = number(config, "risk", "cash_buffer_pct")? {
        if !(0.0..1.0).contains(&v) {
            return Err(invalid("risk", "cash_buffer_pct", "cash_buffer_pct must be in [0, 1)"));
        }
    }
    Ok(())
}

fn validate_portfolio_manager(config: &dyn ConfigPort) -> Result<(), HedgeError> {
    for key in [
        "buy_confidence",
        "sell_confidence",
        "short_confidence",
        "force_exit_confidence",
        "market_order_confidence",
    ] {
        confidence(config, "portfolio_manager", key)?;
    }
    at_least(config, "portfolio_manager", "limit_offset_pct", 0.0)
}

fn validate_backtest(config: &dyn ConfigPort) -> Result<(), HedgeError> {
    if let Some(v) = number(config, "backtest", "risk_free_rate")? {
        if !(0.0..1.0).contains(&v) {
            return Err(invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be between 0 and 1",
            ));
        }
    }
    at_least(config, "backtest", "lookback_days", 0.0)?;
    at_most(config, "backtest", "lookback_days", MAX_LOOKBACK_DAYS as f64)?;
    at_least(config, "backtest", "prefetch_years", 0.0)?;
    at_most(config, "backtest", "prefetch_years", f64::from(MAX_PREFETCH_YEARS))
}

fn validate_services(config: &dyn ConfigPort) -> Result<(), HedgeError> {
    at_least(config, "openai", "max_retries", 1.0)?;
    positive(config, "sqlite", "pool_size")?;
    one_of(config, "store", "backend", STORE_BACKENDS)
}

fn validate_scan(config: &dyn ConfigPort) -> Result<(), HedgeError> {
    positive(config, "scan", "max_tickers")?;
    positive(config, "scan", "hot_limit")?;
    positive(config, "scan", "trade_amount")?;
    at_least(config, "scan", "leverage", 1.0)?;
    at_least(config, "scan", "delay_ms", 0.0)?;
    at_least(config, "scan", "error_delay_ms", 0.0)
}

fn validate_mentions(config: &dyn ConfigPort) -> Result<(), HedgeError> {
    positive(config, "mentions", "window_days")?;
    at_most(config, "mentions", "window_days", MAX_MENTION_DAYS)?;
    positive(config, "mentions", "recent_days")?;
    at_most(config, "mentions", "recent_days", MAX_MENTION_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(content: &str) -> String {
        match validate_config(&make_config(content)).unwrap_err() {
            HedgeError::ConfigInvalid { key, .. } => key,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_config_is_valid() {
        assert!(validate_config(&make_config("")).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[trading]
initial_cash = 50000
trade_amount = 2000
leverage = 5
sizing = Risk

[risk]
max_position_pct = 0.2
buying_power_pct = 0.95
cash_buffer_pct = 0.1

[portfolio_manager]
buy_confidence = 60
market_order_confidence = 80
limit_offset_pct = 1.0

[backtest]
risk_free_rate = 0.0434
lookback_days = 30

[store]
backend = sqlite

[scan]
max_tickers = 100
delay_ms = 0
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn initial_cash_must_be_positive() {
        assert_eq!(invalid_key("[trading]\ninitial_cash = 0\n"), "initial_cash");
        assert_eq!(invalid_key("[trading]\ninitial_cash = -5\n"), "initial_cash");
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        assert_eq!(invalid_key("[trading]\ntrade_amount = lots\n"), "trade_amount");
    }

    #[test]
    fn leverage_below_one_fails() {
        assert_eq!(invalid_key("[trading]\nleverage = 0.5\n"), "leverage");
        assert_eq!(invalid_key("[scan]\nleverage = 0\n"), "leverage");
    }

    #[test]
    fn mention_windows_have_upper_bounds() {
        assert_eq!(invalid_key("[mentions]\nrecent_days = 99999999999\n"), "recent_days");
        assert_eq!(invalid_key("[mentions]\nwindow_days = 0\n"), "window_days");
    }

    #[test]
    fn backtest_history_has_upper_bounds() {
        assert_eq!(invalid_key("[backtest]\nlookback_days = 100000\n"), "lookback_days");
        assert_eq!(invalid_key("[backtest]\nprefetch_years = 4294967295\n"), "prefetch_years");
        assert!(validate_config(&make_config("[backtest]\nlookback_days = 3650\nprefetch_years = 50\n")).is_ok());
    }

    #[test]
    fn unknown_sizing_mode_fails() {
        assert_eq!(invalid_key("[trading]\nsizing = martingale\n"), "sizing");
    }

    #[test]
    fn percentages_must_be_fractions() {
        assert_eq!(invalid_key("[risk]\nmax_position_pct = 20\n"), "max_position_pct");
        assert_eq!(invalid_key("[risk]\nbuying_power_pct = 0\n"), "buying_power_pct");
        assert_eq!(invalid_key("[risk]\ncash_buffer_pct = 1\n"), "cash_buffer_pct");
    }

    #[test]
    fn confidence_out_of_range_fails() {
        assert_eq!(
            invalid_key("[portfolio_manager]\nsell_confidence = 101\n"),
            "sell_confidence"
        );
    }

    #[test]
    fn risk_free_rate_range() {
        assert_eq!(invalid_key("[backtest]\nrisk_free_rate = 1.0\n"), "risk_free_rate");
        assert_eq!(invalid_key("[backtest]\nrisk_free_rate = -0.01\n"), "risk_free_rate");
        assert!(validate_config(&make_config("[backtest]\nrisk_free_rate = 0\n")).is_ok());
    }

    #[test]
    fn unknown_store_backend_fails() {
        assert_eq!(invalid_key("[store]\nbackend = redis\n"), "backend");
    }
}
