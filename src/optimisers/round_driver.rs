use std::fmt::Display;
use std::ops::ControlFlow;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::likelihood::{LikelihoodCost, LikelihoodCostBuilder};
use crate::optimisers::{
    nni_applicable, optimise_branch, optimise_gamma_shape, optimise_nni, optimise_param,
    optimise_rate_weight, set_frequencies, BranchOptimiserConfig, OptimiserConfig,
    PhyloOptimisationResult, StoppingCriterion,
};
use crate::phylo_info::PhyloInfo;
use crate::substitution_models::{QMatrix, SubstModel};
use crate::tree::NodeIdx;
use crate::Result;

/// One step of an optimisation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimisationUnit {
    /// Length of the branch above the node.
    Branch(NodeIdx),
    /// Rearrangement around the branch above the node, with its length.
    Topology(NodeIdx),
    ModelParameter(usize),
    GammaShape,
    RateWeight(usize),
}

impl Display for OptimisationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimisationUnit::Branch(idx) => write!(f, "branch above {}", idx),
            OptimisationUnit::Topology(idx) => write!(f, "topology around {}", idx),
            OptimisationUnit::ModelParameter(param) => write!(f, "model parameter {}", param),
            OptimisationUnit::GammaShape => write!(f, "gamma shape"),
            OptimisationUnit::RateWeight(category) => write!(f, "weight of rate category {}", category),
        }
    }
}

/// Reported to the progress callback after every unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub round: usize,
    pub unit: OptimisationUnit,
    pub initial_logl: f64,
    pub logl: f64,
}

/// Runs rounds of branch, topology and model optimisation until the stopping
/// criterion is met. Every unit keeps the log-likelihood from decreasing, so
/// each completed round is at least as good as the previous one.
pub struct RoundDriver<Q: QMatrix> {
    cost: LikelihoodCost<Q>,
    criterion: StoppingCriterion,
    config: OptimiserConfig,
    branch_config: BranchOptimiserConfig,
}

impl<Q: QMatrix> RoundDriver<Q> {
    pub fn new(cost: LikelihoodCost<Q>, criterion: StoppingCriterion) -> Self {
        RoundDriver {
            cost,
            criterion,
            config: OptimiserConfig::default(),
            branch_config: BranchOptimiserConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OptimiserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_branch_config(mut self, branch_config: BranchOptimiserConfig) -> Self {
        self.branch_config = branch_config;
        self
    }

    /// Units of one round in their unshuffled order: branches in preorder,
    /// then model parameters, the gamma shape and category weights.
    pub fn units(&self) -> Vec<OptimisationUnit> {
        let tree = self.cost.tree();
        let mut units = tree
            .preorder()
            .iter()
            .filter(|&n| *n != tree.root)
            .map(|n| {
                if self.config.optimise_topology && nni_applicable(&self.cost, n) {
                    OptimisationUnit::Topology(*n)
                } else {
                    OptimisationUnit::Branch(*n)
                }
            })
            .collect::<Vec<_>>();
        let model = self.cost.model();
        if self.config.optimise_model {
            units.extend((0..model.params().len()).map(OptimisationUnit::ModelParameter));
        }
        if self.config.optimise_rates {
            let rates = model.rates();
            if rates.gamma_shape().is_some() && rates.len() > 1 {
                units.push(OptimisationUnit::GammaShape);
            }
            if rates.free_weights() {
                units.extend((0..rates.len()).map(OptimisationUnit::RateWeight));
            }
        }
        units
    }

    fn run_unit(&mut self, unit: OptimisationUnit) -> Result<f64> {
        match unit {
            OptimisationUnit::Branch(idx) => optimise_branch(&mut self.cost, &idx, &self.branch_config),
            OptimisationUnit::Topology(idx) => optimise_nni(&mut self.cost, &idx, &self.branch_config),
            OptimisationUnit::ModelParameter(param) => optimise_param(&mut self.cost, param),
            OptimisationUnit::GammaShape => optimise_gamma_shape(&mut self.cost),
            OptimisationUnit::RateWeight(category) => optimise_rate_weight(&mut self.cost, category),
        }
    }

    /// Runs the optimisation. The callback is invoked after every unit and
    /// may break to cancel, the best state reached so far is returned then.
    pub fn run<F>(mut self, mut callback: F) -> Result<PhyloOptimisationResult<Q>>
    where
        F: FnMut(&Progress) -> ControlFlow<()>,
    {
        let initial_logl = set_frequencies(&mut self.cost, self.config.freq_opt)?;
        info!("Initial logl: {}.", initial_logl);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut history = vec![initial_logl];
        let mut logl = initial_logl;
        let mut cancelled = false;

        'rounds: while history.len() <= self.config.max_rounds && !self.criterion.should_stop(&history) {
            let round = history.len();
            let mut units = self.units();
            if self.config.shuffle {
                units.shuffle(&mut rng);
            }
            debug!("Round {} with {} units.", round, units.len());
            for unit in units {
                logl = self.run_unit(unit)?;
                let progress = Progress {
                    round,
                    unit,
                    initial_logl,
                    logl,
                };
                if callback(&progress).is_break() {
                    info!("Optimisation cancelled during round {} after {}.", round, unit);
                    cancelled = true;
                    break 'rounds;
                }
            }
            info!("Round {}: logl {}.", round, logl);
            history.push(logl);
        }

        let iterations = history.len() - 1;
        info!("Final logl: {}, after {} rounds.", logl, iterations);
        Ok(PhyloOptimisationResult {
            initial_logl,
            final_logl: logl,
            iterations,
            cancelled,
            cost: self.cost,
        })
    }
}

/// Optimises branch lengths and topology of the tree in `info` under a fixed
/// model until the stopping criterion is met.
pub fn optimise_branches_and_topology<Q, F>(
    info: PhyloInfo,
    model: SubstModel<Q>,
    criterion: StoppingCriterion,
    callback: F,
) -> Result<PhyloOptimisationResult<Q>>
where
    Q: QMatrix,
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    let cost = LikelihoodCostBuilder::new(model, info).build()?;
    RoundDriver::new(cost, criterion).run(callback)
}
