//! Generation-to-generation evolution of strategy parameters.
//!
//! `next_generation` is pure apart from the injected RNG: ranks the scored
//! population, copies the elites, then fills the remaining slots with
//! selected parents, optionally crossed over, and mutated.

use std::fmt;

use rand::{Rng, RngCore};

use super::error::EvotraderError;
use super::strategy::{ExponentialDecayStrategy, StrategyParameters, TradingStrategy};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionMethod {
    /// Roulette wheel over non-negative fitness.
    FitnessProportionate,
    /// Best of `size` uniform draws.
    Tournament { size: usize },
    /// Uniform over the top `fraction` of the ranking.
    Truncation { fraction: f64 },
}

impl SelectionMethod {
    /// Resolve a config name; the size and fraction only apply to their own method.
    pub fn from_name(name: &str, tournament_size: usize, truncation_fraction: f64) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "proportionate" | "roulette" => Some(SelectionMethod::FitnessProportionate),
            "tournament" => Some(SelectionMethod::Tournament {
                size: tournament_size,
            }),
            "truncation" => Some(SelectionMethod::Truncation {
                fraction: truncation_fraction,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMethod::FitnessProportionate => write!(f, "proportionate"),
            SelectionMethod::Tournament { size } => write!(f, "tournament({})", size),
            SelectionMethod::Truncation { fraction } => write!(f, "truncation({})", fraction),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionConfig {
    pub selection: SelectionMethod,
    /// Top-ranked strategies carried over unmutated.
    pub elitism: usize,
    pub mutation_rate: f64,
    /// Probability that a child is a uniform crossover of two parents.
    pub crossover_rate: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            selection: SelectionMethod::Tournament { size: 3 },
            elitism: 1,
            mutation_rate: 0.05,
            crossover_rate: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredStrategy {
    pub strategy: ExponentialDecayStrategy,
    pub fitness: f64,
}

fn sanitized(fitness: f64) -> f64 {
    if fitness.is_nan() { 0.0 } else { fitness }
}

/// Indices ordered best-first; ties keep population order.
fn rank(scored: &[ScoredStrategy]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scored.len()).collect();
    order.sort_by(|&a, &b| {
        sanitized(scored[b].fitness).total_cmp(&sanitized(scored[a].fitness))
    });
    order
}

fn select(
    scored: &[ScoredStrategy],
    ranked: &[usize],
    method: SelectionMethod,
    rng: &mut dyn RngCore,
) -> usize {
    let n = scored.len();
    match method {
        SelectionMethod::Tournament { size } => {
            let mut best = rng.gen_range(0..n);
            for _ in 1..size.max(1) {
                let challenger = rng.gen_range(0..n);
                if sanitized(scored[challenger].fitness) > sanitized(scored[best].fitness) {
                    best = challenger;
                }
            }
            best
        }
        SelectionMethod::FitnessProportionate => {
            let weights: Vec<f64> = scored
                .iter()
                .map(|s| sanitized(s.fitness).max(0.0))
                .collect();
            let total: f64 = weights.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                return rng.gen_range(0..n);
            }
            let mut pick = rng.gen_range(0.0..total);
            for (i, w) in weights.iter().enumerate() {
                if pick < *w {
                    return i;
                }
                pick -= w;
            }
            // float residue lands on the last positive weight
            weights.iter().rposition(|w| *w > 0.0).unwrap_or(n - 1)
        }
        SelectionMethod::Truncation { fraction } => {
            let keep = ((fraction * n as f64).ceil() as usize).clamp(1, n);
            ranked[rng.gen_range(0..keep)]
        }
    }
}

/// Gene-wise coin flip between two parents. `None` when the coefficient
/// vectors do not line up.
fn uniform_crossover(
    a: &StrategyParameters,
    b: &StrategyParameters,
    rng: &mut dyn RngCore,
) -> Option<StrategyParameters> {
    if a.coeffs.len() != b.coeffs.len() {
        return None;
    }
    let coeffs = a
        .coeffs
        .iter()
        .zip(&b.coeffs)
        .map(|(x, y)| if rng.gen_bool(0.5) { *x } else { *y })
        .collect();
    Some(StrategyParameters {
        coeffs,
        gamma: if rng.gen_bool(0.5) { a.gamma } else { b.gamma },
        window_size: if rng.gen_bool(0.5) {
            a.window_size
        } else {
            b.window_size
        },
        threshold: if rng.gen_bool(0.5) {
            a.threshold
        } else {
            b.threshold
        },
    })
}

/// Breed a population of the same size as `scored`.
pub fn next_generation(
    scored: &[ScoredStrategy],
    config: &EvolutionConfig,
    rng: &mut dyn RngCore,
) -> Result<Vec<ExponentialDecayStrategy>, EvotraderError> {
    let n = scored.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let ranked = rank(scored);

    let elites = config.elitism.min(n);
    let mut next: Vec<ExponentialDecayStrategy> = ranked[..elites]
        .iter()
        .map(|&i| scored[i].strategy.clone())
        .collect();

    let crossover_rate = config.crossover_rate.clamp(0.0, 1.0);
    while next.len() < n {
        let first = &scored[select(scored, &ranked, config.selection, rng)].strategy;
        let mut child = if rng.gen_bool(crossover_rate) {
            let second = &scored[select(scored, &ranked, config.selection, rng)].strategy;
            uniform_crossover(first.params(), second.params(), rng)
                .and_then(|params| first.with_params(params).ok())
                .unwrap_or_else(|| first.clone())
        } else {
            first.clone()
        };
        child.mutate(config.mutation_rate, rng)?;
        next.push(child);
    }
    Ok(next)
}
