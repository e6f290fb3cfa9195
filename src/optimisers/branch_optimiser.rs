use log::{debug, info};

use crate::likelihood::LikelihoodCost;
use crate::optimisers::{BranchOptimiserConfig, OptimisationResult};
use crate::substitution_models::QMatrix;
use crate::tree::NodeIdx;
use crate::Result;

/// Optimises branch lengths one at a time with every other branch held fixed.
pub struct BranchOptimiser<'a, Q: QMatrix> {
    pub(crate) epsilon: f64,
    pub(crate) cost: &'a mut LikelihoodCost<Q>,
    pub(crate) config: BranchOptimiserConfig,
}

impl<'a, Q: QMatrix> BranchOptimiser<'a, Q> {
    pub fn new(cost: &'a mut LikelihoodCost<Q>) -> Self {
        BranchOptimiser {
            epsilon: 1e-3,
            cost,
            config: BranchOptimiserConfig::default(),
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_config(mut self, config: BranchOptimiserConfig) -> Self {
        self.config = config;
        self
    }

    /// Sweeps over all branches in preorder until a sweep improves the
    /// log-likelihood by no more than epsilon.
    pub fn run(self) -> Result<OptimisationResult> {
        let initial_logl = self.cost.logl();
        info!("Initial logl: {}.", initial_logl);
        let mut prev_logl = f64::NEG_INFINITY;
        let mut final_logl = initial_logl;
        let mut iterations = 0;
        while (final_logl - prev_logl) > self.epsilon {
            iterations += 1;
            prev_logl = final_logl;
            let root = self.cost.tree().root;
            let nodes = self.cost.tree().preorder().to_vec();
            for node_idx in nodes.iter().filter(|&n| *n != root) {
                final_logl = optimise_branch(self.cost, node_idx, &self.config)?;
            }
            debug!("Iteration {}: logl {}.", iterations, final_logl);
        }
        info!("Final logl: {}, after {} iterations.", final_logl, iterations);
        Ok(OptimisationResult {
            initial_logl,
            final_logl,
            iterations,
        })
    }
}

/// Optimises the length of the branch above the node and returns the resulting
/// log-likelihood. The branch keeps its length unless the likelihood improves.
pub fn optimise_branch<Q: QMatrix>(
    cost: &mut LikelihoodCost<Q>,
    node_idx: &NodeIdx,
    config: &BranchOptimiserConfig,
) -> Result<f64> {
    let start_blen = cost.tree().blen(node_idx);
    let objective = cost.branch_objective(node_idx)?;
    let start_logl = cost.objective_logl(&objective, start_blen);
    let res = config
        .minimiser(start_blen)
        .minimise(|blen| -cost.objective_logl(&objective, blen), start_blen)?;
    if -res.final_cost > start_logl {
        debug!(
            "Branch above {}: {} -> {}, logl {} -> {}.",
            node_idx, start_blen, res.value, start_logl, -res.final_cost
        );
        cost.set_blen(node_idx, res.value)?;
    }
    Ok(cost.logl())
}
