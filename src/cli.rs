//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_exchange::CsvExchange;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::agent::AgentConfig;
use crate::domain::config_validation::{parse_time_key, validate_simulation_config};
use crate::domain::error::EvotraderError;
use crate::domain::evolution::{EvolutionConfig, SelectionMethod};
use crate::domain::interval::Interval;
use crate::domain::ohlcv::parse_timestamp;
use crate::domain::strategy::{
    Decision, ExponentialDecayStrategy, StrategySnapshot, TradingStrategy, default_calculators_for,
};
use crate::domain::system::{GenerationReport, ParameterRanges, SystemConfig, TradingSystem};
use crate::ports::config_port::ConfigPort;
use crate::ports::exchange_port::Exchange;

const DEFAULT_GENERATIONS: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "evotrader", about = "Evolutionary trading strategy sandbox")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evolve a strategy population over historical data
    Evolve {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [simulation] data_path
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        generations: Option<usize>,
        /// Write every generation report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a simulation configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Replay a saved strategy snapshot at one point in time
    Decide {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        at: String,
        #[arg(long, default_value_t = 100)]
        history: usize,
    },
    /// Show bar count and time range of a data file
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Evolve {
            config,
            data,
            generations,
            output,
        } => run_evolve(&config, data.as_deref(), generations, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Decide {
            data,
            strategy,
            at,
            history,
        } => run_decide(&data, &strategy, &at, history),
        Command::Info { data } => run_info(&data),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, EvotraderError> {
    info!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> EvotraderError {
    EvotraderError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.into(),
    }
}

fn get_count(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, EvotraderError> {
    let value = adapter.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| invalid(section, key, "must be non-negative"))
}

/// Assemble a `SystemConfig` from INI sections, defaulting absent keys.
pub fn build_system_config(adapter: &dyn ConfigPort) -> Result<SystemConfig, EvotraderError> {
    let defaults = SystemConfig::default();

    let interval = match adapter.get_string("simulation", "interval") {
        Some(s) => s
            .parse::<Interval>()
            .map_err(|reason| invalid("simulation", "interval", reason))?,
        None => defaults.interval,
    };
    let seed = adapter.get_int("simulation", "seed", defaults.seed as i64);
    let seed = u64::try_from(seed).map_err(|_| invalid("simulation", "seed", "must be non-negative"))?;

    let agent = AgentConfig {
        initial_capital: adapter.get_double("agent", "initial_capital", defaults.agent.initial_capital),
        position_size_percent: adapter.get_double(
            "agent",
            "position_size_percent",
            defaults.agent.position_size_percent,
        ),
        min_trade_size: adapter.get_double("agent", "min_trade_size", defaults.agent.min_trade_size),
        transaction_fee: adapter.get_double(
            "agent",
            "transaction_fee",
            defaults.agent.transaction_fee,
        ),
    };

    let r = &defaults.ranges;
    let ranges = ParameterRanges {
        coeff_min: adapter.get_double("strategy", "coeff_min", r.coeff_min),
        coeff_max: adapter.get_double("strategy", "coeff_max", r.coeff_max),
        gamma_min: adapter.get_double("strategy", "gamma_min", r.gamma_min),
        gamma_max: adapter.get_double("strategy", "gamma_max", r.gamma_max),
        threshold_min: adapter.get_double("strategy", "threshold_min", r.threshold_min),
        threshold_max: adapter.get_double("strategy", "threshold_max", r.threshold_max),
        window_min: get_count(adapter, "strategy", "window_min", r.window_min)?,
        window_max: get_count(adapter, "strategy", "window_max", r.window_max)?,
    };

    let selection_name = adapter
        .get_string("evolution", "selection")
        .unwrap_or_else(|| "tournament".to_string());
    let tournament_size = get_count(adapter, "evolution", "tournament_size", 3)?;
    let truncation_fraction = adapter.get_double("evolution", "truncation_fraction", 0.5);
    let selection = SelectionMethod::from_name(&selection_name, tournament_size, truncation_fraction)
        .ok_or_else(|| {
            invalid(
                "evolution",
                "selection",
                format!("unknown selection method '{}'", selection_name),
            )
        })?;
    let evolution = EvolutionConfig {
        selection,
        elitism: get_count(adapter, "evolution", "elitism", defaults.evolution.elitism)?,
        mutation_rate: adapter.get_double(
            "evolution",
            "mutation_rate",
            defaults.evolution.mutation_rate,
        ),
        crossover_rate: adapter.get_double(
            "evolution",
            "crossover_rate",
            defaults.evolution.crossover_rate,
        ),
    };

    Ok(SystemConfig {
        interval,
        start: parse_time_key(adapter, "start")?.unwrap_or(defaults.start),
        end: parse_time_key(adapter, "end")?.unwrap_or(defaults.end),
        population: get_count(adapter, "simulation", "population", defaults.population)?,
        generation_lifespan: get_count(
            adapter,
            "simulation",
            "generation_lifespan",
            defaults.generation_lifespan,
        )?,
        history_count: get_count(adapter, "simulation", "history_count", defaults.history_count)?,
        seed,
        agent,
        ranges,
        evolution,
    })
}

/// CLI override first, then `[simulation] data_path`.
pub fn resolve_data_path(
    data_override: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, EvotraderError> {
    if let Some(path) = data_override {
        return Ok(path.to_path_buf());
    }
    config
        .get_string("simulation", "data_path")
        .map(PathBuf::from)
        .ok_or_else(|| EvotraderError::ConfigMissing {
            section: "simulation".into(),
            key: "data_path".into(),
        })
}

pub fn resolve_generations(
    generations_override: Option<usize>,
    config: &dyn ConfigPort,
) -> Result<usize, EvotraderError> {
    match generations_override {
        Some(g) => Ok(g),
        None => get_count(config, "simulation", "generations", DEFAULT_GENERATIONS),
    }
}

/// Build the population over `exchange` and run `generations` walk-forward
/// generations.
pub fn run_evolution_pipeline<E: Exchange>(
    config: SystemConfig,
    exchange: E,
    generations: usize,
) -> Result<Vec<GenerationReport>, EvotraderError> {
    info!(
        population = config.population,
        interval = %config.interval,
        selection = %config.evolution.selection,
        generations,
        "starting evolution"
    );
    let mut system = TradingSystem::new(config, exchange)?;
    system.run(generations)
}

fn run_evolve(
    config_path: &Path,
    data_override: Option<&Path>,
    generations_override: Option<usize>,
    output_path: Option<&Path>,
) -> Result<(), EvotraderError> {
    let adapter = load_config(config_path)?;
    validate_simulation_config(&adapter)?;
    let config = build_system_config(&adapter)?;
    let generations = resolve_generations(generations_override, &adapter)?;

    let data_path = resolve_data_path(data_override, &adapter)?;
    info!("Loading market data from {}", data_path.display());
    let exchange = CsvExchange::from_path(&data_path)?;

    let reports = run_evolution_pipeline(config, exchange, generations)?;
    for report in &reports {
        print_report(report);
    }

    if let Some(best) = reports.last().and_then(|r| r.best()) {
        println!("{}", best.strategy.to_json()?);
    }

    if let Some(path) = output_path {
        fs::write(path, serde_json::to_string_pretty(&reports)?)?;
        info!("Wrote {} generation reports to {}", reports.len(), path.display());
    }
    Ok(())
}

fn print_report(report: &GenerationReport) {
    match report.best() {
        Some(best) => println!(
            "generation {:>3}  ticks {:>4}  failed {:>3}  best {} fitness {:.4} drawdown {:.4}  mean {:.4}",
            report.generation,
            report.ticks,
            report.failed_updates,
            best.name,
            best.fitness,
            best.max_drawdown,
            report.mean_fitness
        ),
        None => println!("generation {:>3}  ticks {:>4}", report.generation, report.ticks),
    }
}

fn run_validate(config_path: &Path) -> Result<(), EvotraderError> {
    let adapter = load_config(config_path)?;
    validate_simulation_config(&adapter)?;
    let config = build_system_config(&adapter)?;
    println!("Configuration is valid.");
    println!("  Interval:    {}", config.interval);
    println!("  Range:       {} to {}", config.start, config.end);
    println!("  Population:  {}", config.population);
    println!("  Lifespan:    {} ticks", config.generation_lifespan);
    println!("  Selection:   {}", config.evolution.selection);
    Ok(())
}

/// Rebuild a strategy from its JSON snapshot file.
pub fn load_strategy(path: &Path) -> Result<ExponentialDecayStrategy, EvotraderError> {
    let snapshot = StrategySnapshot::from_json(&fs::read_to_string(path)?)?;
    let calculators = default_calculators_for(&snapshot.kind)?;
    ExponentialDecayStrategy::from_snapshot(&snapshot, calculators)
}

pub fn decide_at(
    exchange: &dyn Exchange,
    strategy: &dyn TradingStrategy,
    at: &str,
    history: usize,
) -> Result<Decision, EvotraderError> {
    let now = parse_timestamp(at).ok_or_else(|| EvotraderError::Data {
        reason: format!("invalid timestamp '{}'", at),
    })?;
    let window = exchange.get_market_data(now, history, Interval::Hour)?;
    strategy.decide(&window)
}

fn run_decide(
    data_path: &Path,
    strategy_path: &Path,
    at: &str,
    history: usize,
) -> Result<(), EvotraderError> {
    let exchange = CsvExchange::from_path(data_path)?;
    let strategy = load_strategy(strategy_path)?;
    let decision = decide_at(&exchange, &strategy, at, history)?;
    println!("{} {:.6}", decision.action, decision.confidence);
    Ok(())
}

fn run_info(data_path: &Path) -> Result<(), EvotraderError> {
    let exchange = CsvExchange::from_path(data_path)?;
    println!("{}", data_path.display());
    match exchange.time_range() {
        Some((first, last)) => {
            println!("  Bars:  {}", exchange.bar_count());
            println!("  Range: {} to {}", first, last);
        }
        None => println!("  No data."),
    }
    Ok(())
}
