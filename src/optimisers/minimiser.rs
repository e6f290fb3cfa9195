use argmin::core::{CostFunction, Executor, IterState, State};
use argmin::solver::brent::BrentOpt;
use log::debug;

use crate::optimisers::SingleValOptResult;
use crate::Result;

/// Brent minimisation of a function of one variable over a closed interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnivariateMinimiser {
    pub min: f64,
    pub max: f64,
    pub tolerance: f64,
    pub max_iters: u64,
}

struct Objective<F: Fn(f64) -> f64> {
    f: F,
}

impl<F: Fn(f64) -> f64> CostFunction for Objective<F> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, value: &f64) -> Result<f64> {
        let cost = (self.f)(*value);
        // keeps the search defined where the likelihood is zero
        Ok(if cost.is_finite() { cost } else { f64::MAX })
    }
}

impl UnivariateMinimiser {
    pub fn new(min: f64, max: f64) -> Self {
        UnivariateMinimiser {
            min,
            max,
            tolerance: 1e-6,
            max_iters: 100,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Minimises `f` over `[min, max]`. The result is never worse than the
    /// starting value, which is returned when the search does not improve on it.
    /// A non-finite cost at the result is reported as `f64::INFINITY`.
    pub fn minimise<F: Fn(f64) -> f64>(&self, f: F, start: f64) -> Result<SingleValOptResult> {
        let start = start.clamp(self.min, self.max);
        let objective = Objective { f };
        let start_cost = objective.cost(&start)?;
        if self.max <= self.min {
            return Ok(SingleValOptResult {
                value: start,
                final_cost: reported(start_cost),
            });
        }
        let brent = BrentOpt::new(self.min, self.max).set_tolerance(1e-8, self.tolerance);
        let res = Executor::new(objective, brent)
            .configure(|_| IterState::new().param(start).max_iters(self.max_iters))
            .run()?;
        let state = res.state();
        let (value, final_cost) = match state.best_param {
            Some(best) if state.best_cost < start_cost => (best, state.best_cost),
            _ => (start, start_cost),
        };
        debug!(
            "Brent search on [{}, {}]: {} -> {} after {} iterations.",
            self.min,
            self.max,
            start,
            value,
            state.get_iter()
        );
        Ok(SingleValOptResult {
            value,
            final_cost: reported(final_cost),
        })
    }
}

fn reported(cost: f64) -> f64 {
    if cost == f64::MAX {
        f64::INFINITY
    } else {
        cost
    }
}
