//! Configuration validation.
//!
//! Checks every simulation key before a run. Absent keys fall back to the
//! `SystemConfig` defaults and are therefore always valid.

use crate::domain::error::EvotraderError;
use crate::domain::evolution::SelectionMethod;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::parse_timestamp;
use crate::domain::system::SystemConfig;
use crate::ports::config_port::ConfigPort;

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), EvotraderError> {
    let defaults = SystemConfig::default();
    validate_interval(config)?;
    validate_time_range(config, &defaults)?;
    validate_counts(config, &defaults)?;
    validate_agent(config, &defaults)?;
    validate_ranges(config, &defaults)?;
    validate_evolution(config, &defaults)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> EvotraderError {
    EvotraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), EvotraderError> {
    if let Some(value) = config.get_string("simulation", "interval") {
        value
            .parse::<Interval>()
            .map_err(|e| invalid("simulation", "interval", &e))?;
    }
    Ok(())
}

fn validate_time_range(
    config: &dyn ConfigPort,
    defaults: &SystemConfig,
) -> Result<(), EvotraderError> {
    let start = parse_time_key(config, "start")?.unwrap_or(defaults.start);
    let end = parse_time_key(config, "end")?.unwrap_or(defaults.end);
    if start >= end {
        return Err(invalid("simulation", "start", "start must be before end"));
    }
    Ok(())
}

/// `Ok(None)` when the key is absent.
pub fn parse_time_key(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<chrono::NaiveDateTime>, EvotraderError> {
    match config.get_string("simulation", key) {
        None => Ok(None),
        Some(value) => parse_timestamp(&value).map(Some).ok_or_else(|| {
            invalid(
                "simulation",
                key,
                "invalid timestamp, expected YYYY-MM-DD[ HH:MM:SS]",
            )
        }),
    }
}

fn validate_counts(config: &dyn ConfigPort, defaults: &SystemConfig) -> Result<(), EvotraderError> {
    let population = config.get_int("simulation", "population", defaults.population as i64);
    if population < 1 {
        return Err(invalid("simulation", "population", "population must be at least 1"));
    }
    if config.get_int("simulation", "generations", 100) < 1 {
        return Err(invalid("simulation", "generations", "generations must be at least 1"));
    }
    let lifespan = config.get_int(
        "simulation",
        "generation_lifespan",
        defaults.generation_lifespan as i64,
    );
    if lifespan < 1 {
        return Err(invalid(
            "simulation",
            "generation_lifespan",
            "generation_lifespan must be at least 1",
        ));
    }
    let history = config.get_int("simulation", "history_count", defaults.history_count as i64);
    if history < 1 {
        return Err(invalid(
            "simulation",
            "history_count",
            "history_count must be at least 1",
        ));
    }
    if config.get_int("simulation", "seed", 0) < 0 {
        return Err(invalid("simulation", "seed", "seed must be non-negative"));
    }
    Ok(())
}

fn validate_agent(config: &dyn ConfigPort, defaults: &SystemConfig) -> Result<(), EvotraderError> {
    let capital = config.get_double("agent", "initial_capital", defaults.agent.initial_capital);
    if !capital.is_finite() || capital <= 0.0 {
        return Err(invalid("agent", "initial_capital", "initial_capital must be positive"));
    }
    let sizing = config.get_double(
        "agent",
        "position_size_percent",
        defaults.agent.position_size_percent,
    );
    if !sizing.is_finite() || sizing <= 0.0 || sizing > 1.0 {
        return Err(invalid(
            "agent",
            "position_size_percent",
            "position_size_percent must be in (0, 1]",
        ));
    }
    let min_trade = config.get_double("agent", "min_trade_size", defaults.agent.min_trade_size);
    if !min_trade.is_finite() || min_trade < 0.0 {
        return Err(invalid("agent", "min_trade_size", "min_trade_size must be non-negative"));
    }
    let fee = config.get_double("agent", "transaction_fee", defaults.agent.transaction_fee);
    if !(0.0..1.0).contains(&fee) {
        return Err(invalid("agent", "transaction_fee", "transaction_fee must be in [0, 1)"));
    }
    Ok(())
}

fn validate_range(
    config: &dyn ConfigPort,
    name: &str,
    default_min: f64,
    default_max: f64,
) -> Result<(), EvotraderError> {
    let min_key = format!("{}_min", name);
    let max_key = format!("{}_max", name);
    let min = config.get_double("strategy", &min_key, default_min);
    let max = config.get_double("strategy", &max_key, default_max);
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(invalid(
            "strategy",
            &min_key,
            &format!("{} must be below {}", min_key, max_key),
        ));
    }
    Ok(())
}

fn validate_ranges(config: &dyn ConfigPort, defaults: &SystemConfig) -> Result<(), EvotraderError> {
    let r = &defaults.ranges;
    validate_range(config, "coeff", r.coeff_min, r.coeff_max)?;
    validate_range(config, "gamma", r.gamma_min, r.gamma_max)?;
    validate_range(config, "threshold", r.threshold_min, r.threshold_max)?;

    let window_min = config.get_int("strategy", "window_min", r.window_min as i64);
    if window_min < 1 {
        return Err(invalid("strategy", "window_min", "window_min must be at least 1"));
    }
    let window_max = config.get_int("strategy", "window_max", r.window_max as i64);
    if window_min >= window_max {
        return Err(invalid(
            "strategy",
            "window_min",
            "window_min must be below window_max",
        ));
    }
    Ok(())
}

fn validate_evolution(
    config: &dyn ConfigPort,
    defaults: &SystemConfig,
) -> Result<(), EvotraderError> {
    if let Some(name) = config.get_string("evolution", "selection") {
        if SelectionMethod::from_name(&name, 1, 1.0).is_none() {
            return Err(invalid(
                "evolution",
                "selection",
                "selection must be tournament, proportionate or truncation",
            ));
        }
    }
    if config.get_int("evolution", "tournament_size", 3) < 1 {
        return Err(invalid(
            "evolution",
            "tournament_size",
            "tournament_size must be at least 1",
        ));
    }
    let fraction = config.get_double("evolution", "truncation_fraction", 0.5);
    if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
        return Err(invalid(
            "evolution",
            "truncation_fraction",
            "truncation_fraction must be in (0, 1]",
        ));
    }
    let population = config.get_int("simulation", "population", defaults.population as i64);
    let elitism = config.get_int("evolution", "elitism", defaults.evolution.elitism as i64);
    if elitism < 0 || elitism > population {
        return Err(invalid(
            "evolution",
            "elitism",
            "elitism must be between 0 and population",
        ));
    }
    let mutation = config.get_double("evolution", "mutation_rate", defaults.evolution.mutation_rate);
    if !mutation.is_finite() || mutation < 0.0 {
        return Err(invalid("evolution", "mutation_rate", "mutation_rate must be non-negative"));
    }
    let crossover = config.get_double(
        "evolution",
        "crossover_rate",
        defaults.evolution.crossover_rate,
    );
    if !(0.0..=1.0).contains(&crossover) {
        return Err(invalid("evolution", "crossover_rate", "crossover_rate must be in [0, 1]"));
    }
    Ok(())
}
