use std::cell::RefCell;

use anyhow::bail;
use log::{debug, info, warn};

use crate::likelihood::LikelihoodCost;
use crate::optimisers::{FrequencyOptimisation, OptimisationResult, UnivariateMinimiser};
use crate::substitution_models::{QMatrix, GAMMA_SHAPE_MAX, GAMMA_SHAPE_MIN, MIN_WEIGHT};
use crate::Result;

/// Optimises the free parameters of the substitution model one at a time:
/// rate matrix parameters, the gamma shape and free category weights.
pub struct ModelOptimiser<'a, Q: QMatrix> {
    pub(crate) epsilon: f64,
    pub(crate) cost: &'a mut LikelihoodCost<Q>,
    pub(crate) freq_opt: FrequencyOptimisation,
}

impl<'a, Q: QMatrix> ModelOptimiser<'a, Q> {
    pub fn new(cost: &'a mut LikelihoodCost<Q>, freq_opt: FrequencyOptimisation) -> Self {
        ModelOptimiser {
            epsilon: 1e-3,
            cost,
            freq_opt,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn run(self) -> Result<OptimisationResult> {
        info!("Optimising the substitution model: {}.", self.cost.model());
        let initial_logl = set_frequencies(self.cost, self.freq_opt)?;
        info!("Initial logl: {}.", initial_logl);
        let mut final_logl = initial_logl;
        let mut prev_logl = f64::NEG_INFINITY;
        let mut iterations = 0;
        if !has_free_parameters(self.cost) {
            info!("No free model parameters.");
            return Ok(OptimisationResult {
                initial_logl,
                final_logl,
                iterations,
            });
        }
        while (final_logl - prev_logl) > self.epsilon {
            iterations += 1;
            prev_logl = final_logl;
            for param in 0..self.cost.model().params().len() {
                final_logl = optimise_param(self.cost, param)?;
            }
            final_logl = optimise_gamma_shape(self.cost)?;
            for category in 0..self.cost.model().categories() {
                final_logl = optimise_rate_weight(self.cost, category)?;
            }
            debug!("Iteration {}: {}, logl {}.", iterations, self.cost.model(), final_logl);
        }
        info!("Final logl: {}, after {} iterations.", final_logl, iterations);
        Ok(OptimisationResult {
            initial_logl,
            final_logl,
            iterations,
        })
    }
}

fn has_free_parameters<Q: QMatrix>(cost: &LikelihoodCost<Q>) -> bool {
    let model = cost.model();
    let rates = model.rates();
    !model.params().is_empty()
        || (rates.gamma_shape().is_some() && rates.len() > 1)
        || rates.free_weights()
}

/// Sets the equilibrium frequencies as requested and returns the resulting
/// log-likelihood. Models with fixed frequencies are left untouched.
pub fn set_frequencies<Q: QMatrix>(
    cost: &mut LikelihoodCost<Q>,
    freq_opt: FrequencyOptimisation,
) -> Result<f64> {
    if freq_opt == FrequencyOptimisation::Fixed {
        return Ok(cost.logl());
    }
    if cost.model().qmatrix().fixed_freqs() {
        debug!("Frequencies of {} are fixed, not setting them.", cost.model());
        return Ok(cost.logl());
    }
    if freq_opt == FrequencyOptimisation::Estimated {
        warn!("Stationary frequency estimation not available, falling back on empirical.");
    }
    let freqs = cost.empirical_freqs();
    info!("Setting stationary frequencies to empirical: {:?}.", freqs.as_slice());
    cost.set_freqs(freqs)?;
    Ok(cost.logl())
}

/// Optimises one rate matrix parameter within its bounds.
pub fn optimise_param<Q: QMatrix>(cost: &mut LikelihoodCost<Q>, param: usize) -> Result<f64> {
    let Some(&start) = cost.model().params().get(param) else {
        bail!("{} has no parameter {}.", cost.model(), param);
    };
    let bounds = cost.model().qmatrix().param_bounds(param);
    optimise_value(cost, bounds, start, &format!("parameter {}", param), |cost, value| {
        cost.set_param(param, value)
    })
}

/// Optimises the gamma shape, a no-op without gamma distributed categories.
pub fn optimise_gamma_shape<Q: QMatrix>(cost: &mut LikelihoodCost<Q>) -> Result<f64> {
    let rates = cost.model().rates();
    let Some(start) = rates.gamma_shape().filter(|_| rates.len() > 1) else {
        return Ok(cost.logl());
    };
    optimise_value(
        cost,
        (GAMMA_SHAPE_MIN, GAMMA_SHAPE_MAX),
        start,
        "gamma shape",
        |cost, shape| cost.set_gamma_shape(shape),
    )
}

/// Optimises the weight of one rate category, a no-op when the weights are
/// not free.
pub fn optimise_rate_weight<Q: QMatrix>(cost: &mut LikelihoodCost<Q>, category: usize) -> Result<f64> {
    let rates = cost.model().rates();
    if !rates.free_weights() || category >= rates.len() {
        return Ok(cost.logl());
    }
    let bounds = (MIN_WEIGHT, 1.0 - MIN_WEIGHT * (rates.len() - 1) as f64);
    let start = rates.weight(category);
    optimise_value(
        cost,
        bounds,
        start,
        &format!("weight of rate category {}", category),
        |cost, weight| cost.set_rate_weight(category, weight),
    )
}

/// Brent search over one model value. The model is restored when the search
/// does not improve the log-likelihood.
fn optimise_value<Q: QMatrix, S>(
    cost: &mut LikelihoodCost<Q>,
    bounds: (f64, f64),
    start: f64,
    name: &str,
    set: S,
) -> Result<f64>
where
    S: Fn(&mut LikelihoodCost<Q>, f64) -> Result<()>,
{
    let start_logl = cost.logl();
    let start_model = cost.model().clone();
    let res = {
        let cell = RefCell::new(&mut *cost);
        UnivariateMinimiser::new(bounds.0, bounds.1).minimise(
            |value| {
                let mut guard = cell.borrow_mut();
                match set(&mut **guard, value) {
                    Ok(()) => -guard.logl(),
                    Err(_) => f64::INFINITY,
                }
            },
            start,
        )?
    };
    if -res.final_cost > start_logl {
        set(cost, res.value)?;
        debug!(
            "Optimised {} from {} to {}, logl {} -> {}.",
            name, start, res.value, start_logl, -res.final_cost
        );
    } else {
        cost.restore_model(&start_model);
    }
    Ok(cost.logl())
}
