use std::fmt::Display;

use itertools::Itertools;
use log::{debug, info};

use crate::likelihood::{BranchObjective, LikelihoodCost};
use crate::optimisers::{optimise_branch, BranchOptimiserConfig, OptimisationResult};
use crate::substitution_models::QMatrix;
use crate::tree::NodeIdx;
use crate::Result;

/// The three resolutions of the quartet around an internal branch.
///
/// For a branch above `c` with children `la`, `lb`, and the subtrees `rl`,
/// `rr` on the other side, the configurations are
/// `{la, lb} | {rl, rr}`, `{rl, lb} | {la, rr}` and `{rr, lb} | {rl, la}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NniConfiguration {
    Identity,
    SwapA,
    SwapB,
}

impl Display for NniConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NniConfiguration::Identity => write!(f, "identity"),
            NniConfiguration::SwapA => write!(f, "swap A"),
            NniConfiguration::SwapB => write!(f, "swap B"),
        }
    }
}

/// A configuration scored with its own optimal centre branch length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NniEvaluation {
    pub configuration: NniConfiguration,
    pub logl: f64,
    pub blen: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Neighbour {
    /// Subtree below the node.
    Below(NodeIdx),
    /// Everything outside the subtree of the node.
    Outside(NodeIdx),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Quartet {
    la: NodeIdx,
    lb: NodeIdx,
    rl: NodeIdx,
    rr: Neighbour,
    /// Other child of a two-child root. The centre branch then runs through
    /// the root and its length is the sum of both root branches.
    partner: Option<NodeIdx>,
}

impl Quartet {
    fn centre_blen<Q: QMatrix>(&self, cost: &LikelihoodCost<Q>, node_idx: &NodeIdx) -> f64 {
        let tree = cost.tree();
        tree.blen(node_idx) + self.partner.map_or(0.0, |p| tree.blen(&p))
    }

    /// Sets the centre branch to `blen`. Through a two-child root the length
    /// is split in the current proportion of the two root branches.
    fn set_centre_blen<Q: QMatrix>(
        &self,
        cost: &mut LikelihoodCost<Q>,
        node_idx: &NodeIdx,
        blen: f64,
    ) -> Result<()> {
        let Some(partner) = self.partner else {
            return cost.set_blen(node_idx, blen);
        };
        let current = cost.tree().blen(node_idx);
        let total = current + cost.tree().blen(&partner);
        let share = if total > 0.0 { current / total } else { 0.5 };
        cost.set_blen(node_idx, blen * share)?;
        cost.set_blen(&partner, blen * (1.0 - share))
    }
}

/// Nearest-neighbour interchange search over the internal branches of a tree.
pub struct NniOptimiser<'a, Q: QMatrix> {
    pub(crate) epsilon: f64,
    pub(crate) cost: &'a mut LikelihoodCost<Q>,
    pub(crate) config: BranchOptimiserConfig,
}

impl<'a, Q: QMatrix> NniOptimiser<'a, Q> {
    pub fn new(cost: &'a mut LikelihoodCost<Q>) -> Self {
        NniOptimiser {
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

    /// Sweeps over all branches in preorder, rearranging around the internal
    /// ones, until a sweep improves the log-likelihood by no more than epsilon.
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
                final_logl = optimise_nni(self.cost, node_idx, &self.config)?;
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

fn quartet<Q: QMatrix>(cost: &LikelihoodCost<Q>, node_idx: &NodeIdx) -> Option<Quartet> {
    let tree = cost.tree();
    if *node_idx == tree.root || tree.node(node_idx).is_leaf() {
        return None;
    }
    let (la, lb) = match tree.children(node_idx) {
        [la, lb] => (*la, *lb),
        _ => return None,
    };
    let parent = *tree.parent(node_idx)?;
    let siblings = tree.siblings(node_idx);
    if parent != tree.root {
        return Some(Quartet {
            la,
            lb,
            rl: *siblings.first()?,
            rr: Neighbour::Outside(parent),
            partner: None,
        });
    }
    match siblings.as_slice() {
        [rl, rr] => Some(Quartet {
            la,
            lb,
            rl: *rl,
            rr: Neighbour::Below(*rr),
            partner: None,
        }),
        [partner] => match tree.children(partner) {
            [rl, rr] => Some(Quartet {
                la,
                lb,
                rl: *rl,
                rr: Neighbour::Below(*rr),
                partner: Some(*partner),
            }),
            _ => None,
        },
        _ => None,
    }
}

/// Whether a rearrangement is possible around the branch above the node.
pub fn nni_applicable<Q: QMatrix>(cost: &LikelihoodCost<Q>, node_idx: &NodeIdx) -> bool {
    quartet(cost, node_idx).is_some()
}

/// Scores the three configurations around the branch above the node without
/// changing the tree, each with its centre branch length optimised. Returns
/// `None` when either end of the branch is a leaf. Below a two-child root the
/// centre branch joins both root branches.
pub fn evaluate_nni<Q: QMatrix>(
    cost: &LikelihoodCost<Q>,
    node_idx: &NodeIdx,
    config: &BranchOptimiserConfig,
) -> Result<Option<[NniEvaluation; 3]>> {
    match quartet(cost, node_idx) {
        Some(quartet) => Ok(Some(evaluate_quartet(cost, node_idx, &quartet, config)?)),
        None => Ok(None),
    }
}

fn evaluate_quartet<Q: QMatrix>(
    cost: &LikelihoodCost<Q>,
    node_idx: &NodeIdx,
    quartet: &Quartet,
    config: &BranchOptimiserConfig,
) -> Result<[NniEvaluation; 3]> {
    let (la_store, la_patterns) = cost.subtree(&quartet.la);
    let (lb_store, lb_patterns) = cost.subtree(&quartet.lb);
    let (rl_store, rl_patterns) = cost.subtree(&quartet.rl);
    let (rr_store, rr_patterns) = match quartet.rr {
        Neighbour::Below(idx) => cost.subtree(&idx),
        Neighbour::Outside(idx) => cost.complement(&idx),
    };
    let la = (&la_store, &la_patterns);
    let lb = (&lb_store, &lb_patterns);
    let rl = (&rl_store, &rl_patterns);
    let rr = (&rr_store, &rr_patterns);

    let start_blen = quartet.centre_blen(cost, node_idx);
    let minimiser = config.minimiser(start_blen);
    let evaluations = [
        (NniConfiguration::Identity, BranchObjective::join(&[la, lb], &[rl, rr])),
        (NniConfiguration::SwapA, BranchObjective::join(&[rl, lb], &[la, rr])),
        (NniConfiguration::SwapB, BranchObjective::join(&[rr, lb], &[rl, la])),
    ]
    .map(|(configuration, objective)| {
        minimiser
            .minimise(|blen| -cost.objective_logl(&objective, blen), start_blen)
            .map(|res| NniEvaluation {
                configuration,
                logl: -res.final_cost,
                blen: res.value,
            })
    });
    let [identity, swap_a, swap_b] = evaluations;
    let evaluations = [identity?, swap_a?, swap_b?];
    debug!(
        "Branch above {}: {}.",
        node_idx,
        evaluations
            .iter()
            .map(|e| format!("{} {}", e.configuration, e.logl))
            .join(", ")
    );
    Ok(evaluations)
}

/// Picks the configuration with the strictly greatest log-likelihood, earlier
/// configurations win ties.
pub fn best_nni(evaluations: &[NniEvaluation; 3]) -> NniEvaluation {
    let mut best = evaluations[0];
    for evaluation in &evaluations[1..] {
        if evaluation.logl > best.logl {
            best = *evaluation;
        }
    }
    best
}

/// Applies the best rearrangement around the branch above the node together
/// with its optimal branch length, then returns the log-likelihood. Branches
/// where no rearrangement is possible get their length optimised instead.
pub fn optimise_nni<Q: QMatrix>(
    cost: &mut LikelihoodCost<Q>,
    node_idx: &NodeIdx,
    config: &BranchOptimiserConfig,
) -> Result<f64> {
    let Some(quartet) = quartet(cost, node_idx) else {
        return optimise_branch(cost, node_idx, config);
    };
    let evaluations = evaluate_quartet(cost, node_idx, &quartet, config)?;
    let start_logl = cost.logl();
    let best = best_nni(&evaluations);
    if best.logl <= start_logl {
        return Ok(start_logl);
    }
    match best.configuration {
        NniConfiguration::Identity => {}
        NniConfiguration::SwapA => cost.swap_subtrees(&quartet.la, &quartet.rl)?,
        NniConfiguration::SwapB => cost.swap_subtrees(&quartet.lb, &quartet.rl)?,
    }
    quartet.set_centre_blen(cost, node_idx, best.blen)?;
    let logl = cost.logl();
    debug!(
        "Applied {} around {}: logl {} -> {}.",
        best.configuration, node_idx, start_logl, logl
    );
    Ok(logl)
}
