//! Trading strategies: turn a market window into a directional decision.
//!
//! `ExponentialDecayStrategy` combines norm signals into one raw score, spreads it
//! over the newest `n = min(window_size, len)` bars with exponential decay weights
//! `exp(-gamma * age)` and volume normalization, and clips the sum to [-1, 1].

use std::collections::BTreeMap;
use std::fmt;

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::error::EvotraderError;
use super::norm::{NormCalculators, default_calculators};
use super::ohlcv::{OhlcvBar, mean_volume};

pub const EXPONENTIAL_DECAY_KIND: &str = "exponential_decay_ohlcv";

/// Upper bound applied to `window_size` by `mutate`.
pub const MUTATED_WINDOW_CAP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Long,
    Short,
    Hold,
}

impl TradeAction {
    /// +1 long, -1 short, 0 hold.
    pub fn sign(self) -> f64 {
        match self {
            TradeAction::Long => 1.0,
            TradeAction::Short => -1.0,
            TradeAction::Hold => 0.0,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Long => write!(f, "long"),
            TradeAction::Short => write!(f, "short"),
            TradeAction::Hold => write!(f, "hold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: TradeAction,
    /// In [-1, 1].
    pub confidence: f64,
    /// Reserved for diagnostics; always empty today.
    pub diagnostics: BTreeMap<String, f64>,
}

impl Decision {
    pub fn new(action: TradeAction, confidence: f64) -> Self {
        Decision {
            action,
            confidence,
            diagnostics: BTreeMap::new(),
        }
    }
}

/// Capability set shared by every strategy variant.
pub trait TradingStrategy {
    fn decide(&self, window: &[OhlcvBar]) -> Result<Decision, EvotraderError>;

    /// In-place Gaussian perturbation with standard deviation `mutation_rate`.
    /// Fails when the rate is negative or not finite.
    fn mutate(&mut self, mutation_rate: f64, rng: &mut dyn RngCore) -> Result<(), EvotraderError>;

    fn snapshot(&self) -> StrategySnapshot;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParameters {
    pub coeffs: Vec<f64>,
    pub gamma: f64,
    pub window_size: usize,
    pub threshold: f64,
}

/// Serializable strategy state. Norm calculators are not embedded; they are
/// resolved from `kind` when the strategy is rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub coeffs: Vec<f64>,
    pub gamma: f64,
    pub threshold: f64,
    pub window_size: usize,
}

impl StrategySnapshot {
    pub fn to_json(&self) -> Result<String, EvotraderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EvotraderError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Calculator list for a known snapshot kind.
pub fn default_calculators_for(kind: &str) -> Result<NormCalculators, EvotraderError> {
    match kind {
        EXPONENTIAL_DECAY_KIND => Ok(default_calculators()),
        other => Err(EvotraderError::InvalidStrategy {
            reason: format!("unknown strategy type '{}'", other),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct ExponentialDecayStrategy {
    params: StrategyParameters,
    calculators: NormCalculators,
}

impl ExponentialDecayStrategy {
    pub fn new(
        params: StrategyParameters,
        calculators: NormCalculators,
    ) -> Result<Self, EvotraderError> {
        if params.coeffs.is_empty() || calculators.is_empty() {
            return Err(EvotraderError::InvalidStrategy {
                reason: "coefficients and norm calculators must be non-empty".into(),
            });
        }
        if params.coeffs.len() != calculators.len() {
            return Err(EvotraderError::InvalidStrategy {
                reason: format!(
                    "{} coefficients for {} norm calculators",
                    params.coeffs.len(),
                    calculators.len()
                ),
            });
        }
        if params.window_size == 0 {
            return Err(EvotraderError::InvalidStrategy {
                reason: "window_size must be at least 1".into(),
            });
        }
        Ok(ExponentialDecayStrategy {
            params,
            calculators,
        })
    }

    pub fn with_default_calculators(params: StrategyParameters) -> Result<Self, EvotraderError> {
        Self::new(params, default_calculators())
    }

    pub fn from_snapshot(
        snapshot: &StrategySnapshot,
        calculators: NormCalculators,
    ) -> Result<Self, EvotraderError> {
        if snapshot.kind != EXPONENTIAL_DECAY_KIND {
            return Err(EvotraderError::InvalidStrategy {
                reason: format!("snapshot type '{}' is not {}", snapshot.kind, EXPONENTIAL_DECAY_KIND),
            });
        }
        Self::new(
            StrategyParameters {
                coeffs: snapshot.coeffs.clone(),
                gamma: snapshot.gamma,
                window_size: snapshot.window_size,
                threshold: snapshot.threshold,
            },
            calculators,
        )
    }

    pub fn params(&self) -> &StrategyParameters {
        &self.params
    }

    pub fn calculators(&self) -> &NormCalculators {
        &self.calculators
    }

    /// Same calculators, different parameters.
    pub fn with_params(&self, params: StrategyParameters) -> Result<Self, EvotraderError> {
        Self::new(params, self.calculators.clone())
    }

    /// w[k] = exp(-gamma * (n-1-k)); newest weight is 1, no renormalization.
    fn decay_weights(&self, n: usize) -> Vec<f64> {
        (0..n)
            .map(|k| (-self.params.gamma * (n - 1 - k) as f64).exp())
            .collect()
    }

    fn action_for(&self, confidence: f64) -> TradeAction {
        if confidence > self.params.threshold {
            TradeAction::Long
        } else if confidence < -self.params.threshold {
            TradeAction::Short
        } else {
            TradeAction::Hold
        }
    }
}

impl TradingStrategy for ExponentialDecayStrategy {
    fn decide(&self, window: &[OhlcvBar]) -> Result<Decision, EvotraderError> {
        let v_avg = mean_volume(window).ok_or(EvotraderError::EmptyWindow)?;
        let n = self.params.window_size.min(window.len());
        let weights = self.decay_weights(n);

        let mut raw = 0.0;
        for (coeff, calculator) in self.params.coeffs.iter().zip(&self.calculators) {
            raw += coeff * calculator.calculate(window)?;
        }

        // norms and v_avg see the whole window; weights cover the newest n bars
        let tail = &window[window.len() - n..];
        let mut score = 0.0;
        for (w, bar) in weights.iter().zip(tail) {
            score += if v_avg == 0.0 {
                raw * w
            } else {
                raw * w * bar.volume / v_avg
            };
        }

        let confidence = if !score.is_finite() {
            0.0
        } else {
            score.clamp(-1.0, 1.0)
        };
        Ok(Decision::new(self.action_for(confidence), confidence))
    }

    fn mutate(&mut self, mutation_rate: f64, rng: &mut dyn RngCore) -> Result<(), EvotraderError> {
        if mutation_rate == 0.0 {
            return Ok(());
        }
        let noise = Normal::new(0.0, mutation_rate)
            .ok()
            .filter(|_| mutation_rate.is_finite())
            .ok_or_else(|| EvotraderError::InvalidStrategy {
                reason: format!("mutation rate {} is not a valid standard deviation", mutation_rate),
            })?;

        for coeff in self.params.coeffs.iter_mut() {
            *coeff += noise.sample(rng);
        }
        self.params.gamma += noise.sample(rng);
        self.params.threshold += noise.sample(rng);

        let step: i64 = rng.gen_range(-1..=1);
        self.params.window_size =
            (self.params.window_size as i64 + step).clamp(1, MUTATED_WINDOW_CAP as i64) as usize;
        Ok(())
    }

    fn snapshot(&self) -> StrategySnapshot {
        StrategySnapshot {
            kind: EXPONENTIAL_DECAY_KIND.to_string(),
            coeffs: self.params.coeffs.clone(),
            gamma: self.params.gamma,
            threshold: self.params.threshold,
            window_size: self.params.window_size,
        }
    }
}
