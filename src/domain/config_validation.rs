//! Configuration validation.
//!
//! Checks every section before a run starts, so a bad threshold fails fast
//! with the offending `[section] key` instead of surfacing mid-backtest.

use crate::domain::asset::{AllocationWeights, Ticker};
use crate::domain::error::SentinelError;
use crate::domain::regime::Regime;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SentinelError> {
    validate_classifier_config(config)?;
    validate_simulation_config(config)?;
    validate_optimizer_config(config)?;
    validate_allocation_config(config)?;
    validate_report_config(config)?;
    Ok(())
}

pub fn validate_classifier_config(config: &dyn ConfigPort) -> Result<(), SentinelError> {
    for (key, default) in [
        ("labor_weight", 0.6),
        ("manufacturing_weight", 0.4),
        ("liquidity_crunch", -1.0),
        ("recession_growth", -0.1),
        ("stagflation_inflation", 3.5),
        ("hawkish_policy", -0.2),
        ("vix_fear", 20.0),
    ] {
        finite_setting(config, "classifier", key, default)?;
    }

    let entry = finite_setting(config, "classifier", "growth_entry", 0.15)?;
    let exit = finite_setting(config, "classifier", "growth_exit", 0.05)?;
    if exit >= entry {
        return Err(invalid(
            "classifier",
            "growth_exit",
            "growth_exit must be below growth_entry",
        ));
    }

    let overbought = finite_setting(config, "classifier", "rsi_overbought", 70.0)?;
    let oversold = finite_setting(config, "classifier", "rsi_oversold", 30.0)?;
    if !(0.0..=100.0).contains(&overbought) || !(0.0..=100.0).contains(&oversold) {
        return Err(invalid(
            "classifier",
            "rsi_overbought",
            "RSI bands must lie within 0 and 100",
        ));
    }
    if oversold >= overbought {
        return Err(invalid(
            "classifier",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }

    if config.get_int("classifier", "rsi_period", 14) <= 0 {
        return Err(invalid(
            "classifier",
            "rsi_period",
            "rsi_period must be positive",
        ));
    }
    ticker_setting(config, "classifier", "rsi_reference", Ticker::Spy)?;
    Ok(())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), SentinelError> {
    let limit = finite_setting(config, "simulation", "max_drawdown_limit", 0.05)?;
    if limit <= 0.0 || limit >= 1.0 {
        return Err(invalid(
            "simulation",
            "max_drawdown_limit",
            "max_drawdown_limit must be between 0 and 1",
        ));
    }

    if config.get_string("simulation", "circuit_breaker_resume").is_some() {
        let resume = config.get_double("simulation", "circuit_breaker_resume", -1.0);
        if !resume.is_finite() || resume < 0.0 || resume >= limit {
            return Err(invalid(
                "simulation",
                "circuit_breaker_resume",
                "circuit_breaker_resume must be a number in [0, max_drawdown_limit)",
            ));
        }
    }

    finite_setting(config, "simulation", "vix_threshold", 20.0)?;

    let keep = finite_setting(config, "simulation", "equity_keep", 0.5)?;
    if !(0.0..=1.0).contains(&keep) {
        return Err(invalid(
            "simulation",
            "equity_keep",
            "equity_keep must be between 0 and 1",
        ));
    }

    let friction = finite_setting(config, "simulation", "friction_cost", 0.0002)?;
    if !(0.0..1.0).contains(&friction) {
        return Err(invalid(
            "simulation",
            "friction_cost",
            "friction_cost must be between 0 and 1",
        ));
    }

    if config.get_int("simulation", "burn_in", 30) < 0 {
        return Err(invalid(
            "simulation",
            "burn_in",
            "burn_in must be non-negative",
        ));
    }
    if config.get_int("simulation", "optimizer_window", 30) < 2 {
        return Err(invalid(
            "simulation",
            "optimizer_window",
            "optimizer_window must be at least 2",
        ));
    }

    if ticker_setting(config, "simulation", "cash_asset", Ticker::Shy)?.is_equity() {
        return Err(invalid(
            "simulation",
            "cash_asset",
            "cash_asset must not be an equity ticker",
        ));
    }
    ticker_setting(config, "simulation", "benchmark", Ticker::Spy)?;
    let growth = ticker_list_setting(config, "simulation", "growth_assets", &[])?;
    if config.get_string("simulation", "growth_assets").is_some() && growth.is_empty() {
        return Err(invalid(
            "simulation",
            "growth_assets",
            "growth_assets must name at least one ticker",
        ));
    }
    Ok(())
}

pub fn validate_optimizer_config(config: &dyn ConfigPort) -> Result<(), SentinelError> {
    if config.get_int("optimizer", "min_samples", 10) < 2 {
        return Err(invalid(
            "optimizer",
            "min_samples",
            "min_samples must be at least 2",
        ));
    }
    if config.get_int("optimizer", "max_iterations", 10_000) <= 0 {
        return Err(invalid(
            "optimizer",
            "max_iterations",
            "max_iterations must be positive",
        ));
    }
    if finite_setting(config, "optimizer", "tolerance", 1e-10)? <= 0.0 {
        return Err(invalid(
            "optimizer",
            "tolerance",
            "tolerance must be positive",
        ));
    }
    weights_setting(config, "optimizer", "fallback")?;
    Ok(())
}

/// Each `[allocation]` key is a regime's short name, e.g. `growth = QQQ:0.6, SPY:0.4`.
pub fn validate_allocation_config(config: &dyn ConfigPort) -> Result<(), SentinelError> {
    for regime in Regime::ALL {
        weights_setting(config, "allocation", regime.short_name())?;
    }
    Ok(())
}

pub fn validate_report_config(config: &dyn ConfigPort) -> Result<(), SentinelError> {
    if finite_setting(config, "report", "periods_per_year", 1764.0)? <= 0.0 {
        return Err(invalid(
            "report",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    let rf = finite_setting(config, "report", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&rf) {
        return Err(invalid(
            "report",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

/// Read a number, rejecting `nan` and infinities. Unparseable text falls back
/// to `default`, as the adapter does.
pub fn finite_setting(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, SentinelError> {
    let value = config.get_double(section, key, default);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(section, key, format!("{key} must be a finite number")))
    }
}

/// Read a ticker symbol, falling back to `default` when the key is absent.
pub fn ticker_setting(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Ticker,
) -> Result<Ticker, SentinelError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => s.parse().map_err(|reason| invalid(section, key, reason)),
    }
}

/// Read a comma-separated ticker list, falling back to `default` when absent.
pub fn ticker_list_setting(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &[Ticker],
) -> Result<Vec<Ticker>, SentinelError> {
    match config.get_string(section, key) {
        None => Ok(default.to_vec()),
        Some(s) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| p.parse().map_err(|reason| invalid(section, key, reason)))
            .collect(),
    }
}

/// Read a `TICKER:WEIGHT, ...` list; `None` when the key is absent.
pub fn weights_setting(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<AllocationWeights>, SentinelError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => AllocationWeights::parse(&s).map(Some).map_err(|e| match e {
            SentinelError::InvalidWeights { reason } => invalid(section, key, reason),
            other => other,
        }),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SentinelError {
    SentinelError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}
