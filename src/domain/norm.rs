//! Norm calculators: scalar signals summarizing a market window.
//!
//! - `IntraNormCalculator`: mean of (close - open) / (high - low) per bar.
//! - `InterNormCalculator`: mean of (close[i] - close[i-1]) / (high[i] - low[i-1]),
//!   with the first bar taking the second bar's term.
//!
//! A zero denominator is replaced by [`RANGE_EPSILON`] in both calculators.

use std::fmt;
use std::sync::Arc;

use super::error::EvotraderError;
use super::ohlcv::OhlcvBar;

pub const RANGE_EPSILON: f64 = 1e-6;

/// Maps a market window to a single scalar. Implementations are stateless.
pub trait NormCalculator: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails only on an empty window.
    fn calculate(&self, window: &[OhlcvBar]) -> Result<f64, EvotraderError>;
}

/// Shared, immutable calculator list injected into strategies.
pub type NormCalculators = Vec<Arc<dyn NormCalculator>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct IntraNormCalculator;

#[derive(Debug, Clone, Copy, Default)]
pub struct InterNormCalculator;

fn guard_denominator(value: f64) -> f64 {
    if value == 0.0 { RANGE_EPSILON } else { value }
}

fn mean(values: &[f64]) -> f64 {
    let total: f64 = values.iter().sum();
    total / values.len() as f64
}

impl NormCalculator for IntraNormCalculator {
    fn name(&self) -> &'static str {
        "intra"
    }

    fn calculate(&self, window: &[OhlcvBar]) -> Result<f64, EvotraderError> {
        if window.is_empty() {
            return Err(EvotraderError::EmptyWindow);
        }
        let terms: Vec<f64> = window
            .iter()
            .map(|b| (b.close - b.open) / guard_denominator(b.range()))
            .collect();
        Ok(mean(&terms))
    }
}

impl NormCalculator for InterNormCalculator {
    fn name(&self) -> &'static str {
        "inter"
    }

    /// A single bar has no inter-candle term and yields 0.0.
    fn calculate(&self, window: &[OhlcvBar]) -> Result<f64, EvotraderError> {
        match window.len() {
            0 => return Err(EvotraderError::EmptyWindow),
            1 => return Ok(0.0),
            _ => {}
        }

        let mut terms: Vec<f64> = window
            .windows(2)
            .map(|pair| {
                let (prev, bar) = (&pair[0], &pair[1]);
                (bar.close - prev.close) / guard_denominator(bar.high - prev.low)
            })
            .collect();
        // first bar back-fills from the second
        terms.insert(0, terms[0]);
        Ok(mean(&terms))
    }
}

/// The calculator list used by `exponential_decay_ohlcv` strategies, in coefficient order.
pub fn default_calculators() -> NormCalculators {
    vec![
        Arc::new(InterNormCalculator) as Arc<dyn NormCalculator>,
        Arc::new(IntraNormCalculator),
    ]
}
