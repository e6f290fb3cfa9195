use std::fmt::Display;

use anyhow::{bail, ensure};
use log::warn;
use statrs::distribution::{ContinuousCDF, Gamma};

use crate::Result;

pub const GAMMA_SHAPE_MIN: f64 = 0.05;
pub const GAMMA_SHAPE_MAX: f64 = 100.0;
pub const MIN_WEIGHT: f64 = 1e-6;

/// Discrete rate heterogeneity across sites: each category scales branch
/// lengths by its rate and contributes with its weight. Rates are kept scaled
/// so that the weighted mean rate is 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RateCategories {
    rates: Vec<f64>,
    weights: Vec<f64>,
    gamma_shape: Option<f64>,
}

impl RateCategories {
    pub fn single() -> Self {
        RateCategories {
            rates: vec![1.0],
            weights: vec![1.0],
            gamma_shape: None,
        }
    }

    /// Explicit categories, weights are normalised to sum to 1.
    pub fn new(rates: &[f64], weights: &[f64]) -> Result<Self> {
        ensure!(!rates.is_empty(), "At least one rate category is required.");
        ensure!(
            rates.len() == weights.len(),
            "Got {} rates but {} weights.",
            rates.len(),
            weights.len()
        );
        if rates.iter().chain(weights).any(|v| !v.is_finite() || *v <= 0.0) {
            bail!("Rates and weights must be positive, got {:?} and {:?}.", rates, weights);
        }
        let total: f64 = weights.iter().sum();
        let mut categories = RateCategories {
            rates: rates.to_vec(),
            weights: weights.iter().map(|w| w / total).collect(),
            gamma_shape: None,
        };
        categories.normalise_rates();
        Ok(categories)
    }

    /// `k` equally weighted categories from a mean-one gamma distribution with
    /// the given shape, each represented by its median.
    pub fn gamma(shape: f64, k: usize) -> Result<Self> {
        ensure!(k > 0, "At least one rate category is required.");
        ensure!(
            shape.is_finite() && shape > 0.0,
            "Gamma shape must be positive, got {}.",
            shape
        );
        let mut categories = RateCategories {
            rates: gamma_medians(shape, k)?,
            weights: vec![1.0 / k as f64; k],
            gamma_shape: Some(shape),
        };
        categories.normalise_rates();
        Ok(categories)
    }

    fn normalise_rates(&mut self) {
        let mean: f64 = self.rates.iter().zip(&self.weights).map(|(r, w)| r * w).sum();
        self.rates.iter_mut().for_each(|r| *r /= mean);
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rate(&self, category: usize) -> f64 {
        self.rates[category]
    }

    pub fn weight(&self, category: usize) -> f64 {
        self.weights[category]
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn gamma_shape(&self) -> Option<f64> {
        self.gamma_shape
    }

    /// Weights are only free for explicit categories.
    pub fn free_weights(&self) -> bool {
        self.gamma_shape.is_none() && self.len() > 1
    }

    /// Recomputes gamma rates for a new shape, the value is clamped to
    /// `[GAMMA_SHAPE_MIN, GAMMA_SHAPE_MAX]`.
    pub fn set_gamma_shape(&mut self, shape: f64) -> Result<()> {
        if self.gamma_shape.is_none() {
            bail!("Rate categories are not gamma distributed.");
        }
        let shape = crate::substitution_models::clamp_param(
            shape,
            (GAMMA_SHAPE_MIN, GAMMA_SHAPE_MAX),
            "gamma shape",
        );
        self.rates = gamma_medians(shape, self.len())?;
        self.gamma_shape = Some(shape);
        self.normalise_rates();
        Ok(())
    }

    /// Sets the weight of one category and rescales the others proportionally
    /// so that the weights still sum to 1.
    pub fn set_weight(&mut self, category: usize, weight: f64) -> Result<()> {
        ensure!(category < self.len(), "No rate category {}.", category);
        ensure!(self.free_weights(), "Rate category weights are fixed.");
        let clamped = weight.clamp(MIN_WEIGHT, 1.0 - MIN_WEIGHT * (self.len() - 1) as f64);
        if clamped != weight {
            warn!("Rate weight {} clamped to {}.", weight, clamped);
        }
        let others: f64 = self
            .weights
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != category)
            .map(|(_, w)| w)
            .sum();
        let scale = (1.0 - clamped) / others;
        for (i, w) in self.weights.iter_mut().enumerate() {
            if i == category {
                *w = clamped;
            } else {
                *w = (*w * scale).max(MIN_WEIGHT);
            }
        }
        let total: f64 = self.weights.iter().sum();
        self.weights.iter_mut().for_each(|w| *w /= total);
        self.normalise_rates();
        Ok(())
    }
}

fn gamma_medians(shape: f64, k: usize) -> Result<Vec<f64>> {
    if k == 1 {
        return Ok(vec![1.0]);
    }
    let gamma = match Gamma::new(shape, shape) {
        Ok(gamma) => gamma,
        Err(e) => bail!("Cannot build gamma distribution with shape {}: {}", shape, e),
    };
    let rates = (0..k)
        .map(|i| gamma.inverse_cdf((2 * i + 1) as f64 / (2 * k) as f64))
        .collect::<Vec<_>>();
    if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
        bail!("Gamma discretisation with shape {} failed: {:?}.", shape, rates);
    }
    // median of the lowest category can underflow for tiny shapes
    Ok(rates.into_iter().map(|r| r.max(f64::MIN_POSITIVE)).collect())
}

impl Display for RateCategories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.gamma_shape {
            Some(shape) => write!(f, "G{}(alpha={})", self.len(), shape),
            None => write!(f, "R{}(rates={:?}, weights={:?})", self.len(), self.rates, self.weights),
        }
    }
}
