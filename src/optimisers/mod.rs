use std::fmt::Display;

use crate::likelihood::LikelihoodCost;
use crate::substitution_models::QMatrix;
use crate::tree::Tree;

pub mod minimiser;
pub use minimiser::*;
pub mod branch_optimiser;
pub use branch_optimiser::*;
pub mod nni_optimiser;
pub use nni_optimiser::*;
pub mod model_optimiser;
pub use model_optimiser::*;
pub mod stopping_criterion;
pub use stopping_criterion::*;
pub mod round_driver;
pub use round_driver::*;

/// How equilibrium frequencies are set before optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyOptimisation {
    Fixed,
    Empirical,
    Estimated,
}

impl Display for FrequencyOptimisation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrequencyOptimisation::Fixed => write!(f, "fixed"),
            FrequencyOptimisation::Empirical => write!(f, "empirical"),
            FrequencyOptimisation::Estimated => write!(f, "estimated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimiserConfig {
    /// Upper bound on the number of rounds regardless of the stopping criterion.
    pub max_rounds: usize,
    /// Shuffle the optimisation units at the start of every round.
    pub shuffle: bool,
    pub seed: u64,
    pub optimise_topology: bool,
    pub optimise_model: bool,
    pub optimise_rates: bool,
    pub freq_opt: FrequencyOptimisation,
}

impl Default for OptimiserConfig {
    fn default() -> Self {
        OptimiserConfig {
            max_rounds: 100,
            shuffle: true,
            seed: 0,
            optimise_topology: true,
            optimise_model: false,
            optimise_rates: false,
            freq_opt: FrequencyOptimisation::Fixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchOptimiserConfig {
    pub min_blen: f64,
    pub max_blen: f64,
    /// Absolute tolerance of the branch length search.
    pub tolerance: f64,
    pub max_iters: u64,
}

impl Default for BranchOptimiserConfig {
    fn default() -> Self {
        BranchOptimiserConfig {
            min_blen: 1e-8,
            max_blen: 10.0,
            tolerance: 1e-6,
            max_iters: 100,
        }
    }
}

impl BranchOptimiserConfig {
    /// Search interval for a branch currently of length `blen`.
    pub(crate) fn bounds(&self, blen: f64) -> (f64, f64) {
        (self.min_blen, self.max_blen.max(blen))
    }

    pub(crate) fn minimiser(&self, blen: f64) -> UnivariateMinimiser {
        let (min, max) = self.bounds(blen);
        UnivariateMinimiser::new(min, max)
            .with_tolerance(self.tolerance)
            .with_max_iters(self.max_iters)
    }
}

/// Optimised argument and the objective value there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleValOptResult {
    pub value: f64,
    pub final_cost: f64,
}

/// Outcome of a single optimiser sweeping until convergence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimisationResult {
    pub initial_logl: f64,
    pub final_logl: f64,
    pub iterations: usize,
}

/// Outcome of a full optimisation run, owning the optimised cost function.
#[derive(Debug, Clone)]
pub struct PhyloOptimisationResult<Q: QMatrix> {
    pub initial_logl: f64,
    pub final_logl: f64,
    pub iterations: usize,
    pub cancelled: bool,
    pub cost: LikelihoodCost<Q>,
}

impl<Q: QMatrix> PhyloOptimisationResult<Q> {
    pub fn tree(&self) -> &Tree {
        self.cost.tree()
    }
}

#[cfg(test)]
mod minimiser_tests;
#[cfg(test)]
mod branch_optimiser_tests;
#[cfg(test)]
mod nni_optimiser_tests;
