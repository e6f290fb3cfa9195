use std::fmt::{Debug, Display};

use anyhow::bail;
use log::warn;
use nalgebra::{DMatrix, DVector};

use crate::Result;

pub mod dna_models;
pub use dna_models::*;
pub mod mk;
pub use mk::*;
pub mod rate_categories;
pub use rate_categories::*;
pub mod transition_cache;
pub use transition_cache::*;

pub type SubstMatrix = DMatrix<f64>;
pub type FreqVector = DVector<f64>;

/// Smallest equilibrium frequency accepted, smaller values are raised to it.
pub const MIN_FREQ: f64 = 1e-6;
/// Default bounds for relative rate parameters.
pub const RATE_MIN: f64 = 1e-4;
pub const RATE_MAX: f64 = 100.0;

/// A reversible instantaneous rate matrix together with its equilibrium
/// frequencies and free parameters.
///
/// Implementations keep `q` normalised: rows sum to zero and the expected
/// number of substitutions per unit of time at equilibrium is 1.
pub trait QMatrix: Clone + Debug + Display {
    fn n(&self) -> usize;
    fn q(&self) -> &SubstMatrix;
    fn freqs(&self) -> &FreqVector;
    /// Whether the frequencies are a fixed part of the model (e.g. JC69).
    fn fixed_freqs(&self) -> bool;
    /// Fails for models with fixed frequencies and for invalid vectors.
    fn set_freqs(&mut self, freqs: FreqVector) -> Result<()>;
    /// Free parameters of the model, may be empty.
    fn params(&self) -> &[f64];
    /// Clamps the value to [`QMatrix::param_bounds`], fails for an unknown
    /// parameter.
    fn set_param(&mut self, param: usize, value: f64) -> Result<()>;
    fn param_bounds(&self, _param: usize) -> (f64, f64) {
        (RATE_MIN, RATE_MAX)
    }
    fn rate(&self, i: u8, j: u8) -> f64 {
        self.q()[(i as usize, j as usize)]
    }
}

pub trait QMatrixMaker {
    fn create(freqs: &[f64], params: &[f64]) -> Result<Self>
    where
        Self: Sized;
}

/// Validates equilibrium frequencies. An empty slice gives uniform
/// frequencies, non-positive entries are raised to [`MIN_FREQ`] and the vector is
/// renormalised.
pub fn make_freqs(freqs: &[f64], n: usize) -> Result<FreqVector> {
    if freqs.is_empty() {
        return Ok(FreqVector::from_element(n, 1.0 / n as f64));
    }
    if freqs.len() != n {
        bail!(
            "There have to be {} equilibrium frequencies, got {}.",
            n,
            freqs.len()
        );
    }
    if freqs.iter().any(|f| !f.is_finite()) || freqs.iter().sum::<f64>() <= 0.0 {
        bail!("Invalid equilibrium frequencies {:?}.", freqs);
    }
    let mut pi = FreqVector::from_column_slice(freqs);
    if pi.iter().any(|&f| f < MIN_FREQ) {
        warn!(
            "Equilibrium frequencies {:?} contain values below {}, raising them.",
            freqs, MIN_FREQ
        );
        pi.iter_mut().for_each(|f| *f = f.max(MIN_FREQ));
    }
    let total = pi.sum();
    if (total - 1.0).abs() > 1e-10 {
        warn!("Equilibrium frequencies sum up to {}, normalising.", total);
    }
    pi.scale_mut(1.0 / total);
    Ok(pi)
}

/// Builds a normalised reversible rate matrix from the frequencies and the
/// upper triangle of the symmetric exchangeability matrix, given row by row.
pub fn reversible_q(freqs: &FreqVector, exchangeabilities: &[f64]) -> SubstMatrix {
    let n = freqs.len();
    debug_assert_eq!(exchangeabilities.len(), n * (n - 1) / 2);
    let mut q = SubstMatrix::zeros(n, n);
    let mut k = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            q[(i, j)] = exchangeabilities[k] * freqs[j];
            q[(j, i)] = exchangeabilities[k] * freqs[i];
            k += 1;
        }
    }
    for i in 0..n {
        let row_sum: f64 = q.row(i).sum();
        q[(i, i)] = -row_sum;
    }
    let scale = -(0..n).map(|i| freqs[i] * q[(i, i)]).sum::<f64>();
    q / scale
}

pub(crate) fn clamp_param(value: f64, bounds: (f64, f64), name: &str) -> f64 {
    let (min, max) = bounds;
    if value.is_nan() {
        warn!("Parameter {} is NaN, setting it to {}.", name, min);
        return min;
    }
    if value < min || value > max {
        let clamped = value.clamp(min, max);
        warn!(
            "Parameter {} value {} outside of [{}, {}], clamping to {}.",
            name, value, min, max, clamped
        );
        return clamped;
    }
    value
}

/// Substitution model: a rate matrix plus rate heterogeneity categories.
///
/// Every mutator bumps `generation`, transition matrices computed for an
/// older generation are stale.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstModel<Q: QMatrix> {
    pub(crate) qmatrix: Q,
    pub(crate) rates: RateCategories,
    generation: u64,
}

impl<Q: QMatrix + QMatrixMaker> SubstModel<Q> {
    pub fn new(freqs: &[f64], params: &[f64]) -> Result<Self> {
        Ok(SubstModel {
            qmatrix: Q::create(freqs, params)?,
            rates: RateCategories::single(),
            generation: 0,
        })
    }
}

impl<Q: QMatrix> SubstModel<Q> {
    pub fn with_rates(mut self, rates: RateCategories) -> Self {
        self.rates = rates;
        self.generation += 1;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn n(&self) -> usize {
        self.qmatrix.n()
    }

    pub fn q(&self) -> &SubstMatrix {
        self.qmatrix.q()
    }

    pub fn qmatrix(&self) -> &Q {
        &self.qmatrix
    }

    pub fn freqs(&self) -> &FreqVector {
        self.qmatrix.freqs()
    }

    pub fn params(&self) -> &[f64] {
        self.qmatrix.params()
    }

    pub fn rates(&self) -> &RateCategories {
        &self.rates
    }

    pub fn categories(&self) -> usize {
        self.rates.len()
    }

    pub fn set_param(&mut self, param: usize, value: f64) -> Result<()> {
        self.qmatrix.set_param(param, value)?;
        self.generation += 1;
        Ok(())
    }

    /// Only bumps the generation when the frequencies actually change.
    pub fn set_freqs(&mut self, freqs: FreqVector) -> Result<()> {
        let before = self.freqs().clone();
        self.qmatrix.set_freqs(freqs)?;
        if self.freqs() != &before {
            self.generation += 1;
        }
        Ok(())
    }

    /// Puts back the rate matrix and categories of an earlier snapshot of
    /// this model under a new generation.
    pub fn restore(&mut self, snapshot: &SubstModel<Q>) {
        self.qmatrix = snapshot.qmatrix.clone();
        self.rates = snapshot.rates.clone();
        self.generation += 1;
    }

    pub fn set_rate_weight(&mut self, category: usize, weight: f64) -> Result<()> {
        self.rates.set_weight(category, weight)?;
        self.generation += 1;
        Ok(())
    }

    pub fn set_gamma_shape(&mut self, shape: f64) -> Result<()> {
        self.rates.set_gamma_shape(shape)?;
        self.generation += 1;
        Ok(())
    }

    /// Transition probabilities for the whole branch length, computed
    /// directly with the matrix exponential of `Q·t`.
    pub fn p(&self, time: f64) -> SubstMatrix {
        (self.q().clone() * time).exp()
    }

    /// Transition probabilities for one rate category.
    pub fn p_category(&self, category: usize, time: f64) -> SubstMatrix {
        self.p(time * self.rates.rate(category))
    }
}

impl<Q: QMatrix> Display for SubstModel<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qmatrix)?;
        if self.rates.len() > 1 {
            write!(f, "+{}", self.rates)?;
        }
        Ok(())
    }
}
