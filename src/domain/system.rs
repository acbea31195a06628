//! Population scaffold: a set of agents walked over a shared time axis,
//! scored, and bred into the next generation.
//!
//! Evaluation order is tick-major, agent-minor: at every tick each agent is
//! updated in population order before the clock advances. A failed agent tick
//! is logged and counted, never fatal to the generation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use super::agent::{AgentConfig, TradingAgent};
use super::error::EvotraderError;
use super::evolution::{EvolutionConfig, ScoredStrategy, next_generation};
use super::interval::Interval;
use super::strategy::{
    ExponentialDecayStrategy, StrategyParameters, StrategySnapshot, TradingStrategy,
};
use crate::ports::exchange_port::Exchange;

/// Half-open sampling ranges for the initial population.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRanges {
    pub coeff_min: f64,
    pub coeff_max: f64,
    pub gamma_min: f64,
    pub gamma_max: f64,
    pub threshold_min: f64,
    pub threshold_max: f64,
    pub window_min: usize,
    pub window_max: usize,
}

impl Default for ParameterRanges {
    fn default() -> Self {
        ParameterRanges {
            coeff_min: 0.0,
            coeff_max: 1.0,
            gamma_min: 0.0,
            gamma_max: 1.0,
            threshold_min: 0.0,
            threshold_max: 1.0,
            window_min: 2,
            window_max: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    pub interval: Interval,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub population: usize,
    /// Ticks per generation.
    pub generation_lifespan: usize,
    pub history_count: usize,
    pub seed: u64,
    pub agent: AgentConfig,
    pub ranges: ParameterRanges,
    pub evolution: EvolutionConfig,
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            interval: Interval::Hour,
            start: midnight(2020, 1, 1),
            end: midnight(2025, 1, 1),
            population: 20,
            generation_lifespan: 52,
            history_count: 100,
            seed: 42,
            agent: AgentConfig {
                initial_capital: 100.0,
                position_size_percent: 0.1,
                min_trade_size: 5.0,
                transaction_fee: 0.0001,
            },
            ranges: ParameterRanges::default(),
            evolution: EvolutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentScore {
    pub name: String,
    pub fitness: f64,
    pub max_drawdown: f64,
    pub capital: f64,
    pub position: f64,
    pub trades: usize,
    pub strategy: StrategySnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub generation: usize,
    pub start_time: NaiveDateTime,
    /// Last tick evaluated, `None` when the axis had nothing after `start_time`.
    pub end_time: Option<NaiveDateTime>,
    pub ticks: usize,
    pub failed_updates: usize,
    /// Best first.
    pub scores: Vec<AgentScore>,
    pub mean_fitness: f64,
}

impl GenerationReport {
    pub fn best(&self) -> Option<&AgentScore> {
        self.scores.first()
    }
}

pub type Agent = TradingAgent<ExponentialDecayStrategy>;

pub struct TradingSystem<E> {
    config: SystemConfig,
    exchange: E,
    agents: Vec<Agent>,
    times: Vec<NaiveDateTime>,
    rng: StdRng,
    generation: usize,
}

fn sample(rng: &mut dyn RngCore, min: f64, max: f64) -> f64 {
    if max > min { rng.gen_range(min..max) } else { min }
}

impl<E: Exchange> TradingSystem<E> {
    pub fn new(config: SystemConfig, exchange: E) -> Result<Self, EvotraderError> {
        if config.population == 0 {
            return Err(EvotraderError::ConfigInvalid {
                section: "simulation".to_string(),
                key: "population".to_string(),
                reason: "population must be at least 1".to_string(),
            });
        }

        let times = config.interval.time_axis(config.start, config.end);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let strategies = (0..config.population)
            .map(|_| random_strategy(&config.ranges, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;

        let mut system = TradingSystem {
            config,
            exchange,
            agents: Vec::new(),
            times,
            rng,
            generation: 0,
        };
        system.agents = system.spawn(strategies);
        Ok(system)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    fn spawn(&self, strategies: Vec<ExponentialDecayStrategy>) -> Vec<Agent> {
        strategies
            .into_iter()
            .enumerate()
            .map(|(i, strategy)| {
                TradingAgent::new(
                    format!("gen{}_agent_{}", self.generation, i),
                    strategy,
                    &self.config.agent,
                )
            })
            .collect()
    }

    /// Run the current population over the first `generation_lifespan` axis
    /// entries strictly after `start_time`.
    pub fn evaluate(&mut self, start_time: NaiveDateTime) -> GenerationReport {
        let first = self.times.partition_point(|t| *t <= start_time);
        let last = (first + self.config.generation_lifespan).min(self.times.len());
        let ticks = &self.times[first..last];

        let mut failed_updates = 0;
        for &now in ticks {
            for agent in self.agents.iter_mut() {
                if let Err(e) = agent.update(
                    &mut self.exchange,
                    now,
                    self.config.history_count,
                    self.config.interval,
                ) {
                    warn!(agent = %agent.name(), time = %now, error = %e, "agent update failed");
                    failed_updates += 1;
                }
            }
        }

        let mut scores: Vec<AgentScore> = self
            .agents
            .iter()
            .map(|agent| AgentScore {
                name: agent.name().to_string(),
                fitness: agent.fitness(),
                max_drawdown: agent.calculate_max_drawdown(),
                capital: agent.capital(),
                position: agent.position(),
                trades: agent.trades().len(),
                strategy: agent.strategy().snapshot(),
            })
            .collect();
        scores.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let mean_fitness = if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(|s| s.fitness).sum::<f64>() / scores.len() as f64
        };

        let report = GenerationReport {
            generation: self.generation,
            start_time,
            end_time: ticks.last().copied(),
            ticks: ticks.len(),
            failed_updates,
            scores,
            mean_fitness,
        };
        info!(
            generation = report.generation,
            ticks = report.ticks,
            failed = report.failed_updates,
            best_fitness = report.best().map(|s| s.fitness).unwrap_or(0.0),
            mean_fitness = report.mean_fitness,
            "generation evaluated"
        );
        report
    }

    /// Replace the population with bred offspring of equal size.
    pub fn evolve(&mut self) -> Result<(), EvotraderError> {
        let scored: Vec<ScoredStrategy> = self
            .agents
            .iter()
            .map(|agent| ScoredStrategy {
                strategy: agent.strategy().clone(),
                fitness: agent.fitness(),
            })
            .collect();
        let strategies = next_generation(&scored, &self.config.evolution, &mut self.rng)?;
        self.generation += 1;
        self.agents = self.spawn(strategies);
        Ok(())
    }

    /// Walk-forward loop: each generation starts where the previous one ended.
    /// Stops early once the time axis is exhausted.
    pub fn run(&mut self, generations: usize) -> Result<Vec<GenerationReport>, EvotraderError> {
        let mut reports = Vec::with_capacity(generations);
        let mut start = self.config.start;
        for g in 0..generations {
            let report = self.evaluate(start);
            let Some(end) = report.end_time else {
                warn!(generation = self.generation, start = %start, "time axis exhausted");
                break;
            };
            start = end;
            reports.push(report);
            if g + 1 < generations {
                self.evolve()?;
            }
        }
        Ok(reports)
    }
}

fn random_strategy(
    ranges: &ParameterRanges,
    rng: &mut dyn RngCore,
) -> Result<ExponentialDecayStrategy, EvotraderError> {
    let alpha = sample(rng, ranges.coeff_min, ranges.coeff_max);
    let beta = sample(rng, ranges.coeff_min, ranges.coeff_max);
    let gamma = sample(rng, ranges.gamma_min, ranges.gamma_max);
    let epsilon = sample(rng, ranges.threshold_min, ranges.threshold_max);
    let window_size = if ranges.window_max > ranges.window_min {
        rng.gen_range(ranges.window_min..ranges.window_max)
    } else {
        ranges.window_min
    };
    ExponentialDecayStrategy::with_default_calculators(StrategyParameters {
        coeffs: vec![alpha, beta],
        gamma,
        window_size,
        threshold: epsilon,
    })
}
