use std::cell::RefCell;
use std::fmt::Display;

use anyhow::{bail, ensure};
use log::{debug, info};

use crate::patterns::PatternInfo;
use crate::phylo_info::{PhyloInfo, PhyloInfoBuilder};
use crate::substitution_models::{make_freqs, FreqVector, QMatrix, SubstModel};
use crate::tree::{NodeIdx, Tree};
use crate::Result;

pub mod conditionals;
pub use conditionals::ConditionalStore;
use conditionals::weighted_logl;
pub mod context;
pub use context::ComputationContext;

pub struct LikelihoodCostBuilder<Q: QMatrix> {
    model: SubstModel<Q>,
    info: PhyloInfo,
    caching: bool,
}

impl<Q: QMatrix> LikelihoodCostBuilder<Q> {
    pub fn new(model: SubstModel<Q>, info: PhyloInfo) -> Self {
        Self {
            model,
            info,
            caching: true,
        }
    }

    /// With caching disabled every conditional is recomputed on every
    /// evaluation.
    pub fn caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    pub fn build(self) -> Result<LikelihoodCost<Q>> {
        ensure!(
            self.model.n() == self.info.n_states(),
            "The model has {} states but the alignment has {}.",
            self.model.n(),
            self.info.n_states()
        );
        debug!(
            "Likelihood cost for {} on {} taxa, caching {}.",
            self.model,
            self.info.tree.n(),
            if self.caching { "on" } else { "off" }
        );
        let context = RefCell::new(ComputationContext::new(self.info.tree.len(), self.caching));
        Ok(LikelihoodCost {
            model: self.model,
            info: self.info,
            caching: self.caching,
            context,
        })
    }
}

/// Log-likelihood of an alignment on a tree under a substitution model.
///
/// Conditional likelihoods are kept between evaluations and recomputed only
/// when the branch lengths, topology or model they depend on changed.
#[derive(Debug, Clone)]
pub struct LikelihoodCost<Q: QMatrix> {
    model: SubstModel<Q>,
    info: PhyloInfo,
    caching: bool,
    context: RefCell<ComputationContext>,
}

/// Flat conditionals on both ends of a branch, used to evaluate the
/// likelihood as a function of that branch's length alone.
#[derive(Debug, Clone)]
pub struct BranchObjective {
    left: ConditionalStore,
    right: ConditionalStore,
    centre: PatternInfo,
}

impl BranchObjective {
    pub fn new(
        left: ConditionalStore,
        left_patterns: &PatternInfo,
        right: ConditionalStore,
        right_patterns: &PatternInfo,
    ) -> Self {
        BranchObjective {
            left,
            right,
            centre: PatternInfo::merge(left_patterns, right_patterns),
        }
    }

    /// Joins two groups of extended conditionals, each group is multiplied
    /// into the flat conditional of one end of the branch.
    pub fn join(left: &[(&ConditionalStore, &PatternInfo)], right: &[(&ConditionalStore, &PatternInfo)]) -> Self {
        let (left, left_patterns) = Self::combine(left);
        let (right, right_patterns) = Self::combine(right);
        Self::new(left, &left_patterns, right, &right_patterns)
    }

    fn combine(group: &[(&ConditionalStore, &PatternInfo)]) -> (ConditionalStore, PatternInfo) {
        let patterns = group.iter().map(|(_, p)| *p).collect::<Vec<_>>();
        let (merged, sources) = PatternInfo::merge_all(&patterns);
        let inputs = group
            .iter()
            .zip(&sources)
            .map(|((store, _), sources)| (*store, sources.as_slice()))
            .collect::<Vec<_>>();
        (ConditionalStore::product(&inputs, merged.len()), merged)
    }

    pub fn patterns(&self) -> &PatternInfo {
        &self.centre
    }
}

impl<Q: QMatrix> LikelihoodCost<Q> {
    pub fn cost(&self) -> f64 {
        self.logl()
    }

    pub fn logl(&self) -> f64 {
        let log_likelihoods = self.pattern_log_likelihoods();
        let context = self.context.borrow();
        weighted_logl(&log_likelihoods, &context.down_patterns(&self.info.tree.root).weights)
    }

    fn pattern_log_likelihoods(&self) -> Vec<f64> {
        let mut context = self.context.borrow_mut();
        context.update_down(&self.info, &self.model);
        context
            .down_flat(&self.info.tree.root)
            .root_log_likelihoods(self.model.freqs(), self.model.rates().weights())
    }

    /// Log-likelihood of every alignment site.
    pub fn site_logls(&self) -> Vec<f64> {
        let log_likelihoods = self.pattern_log_likelihoods();
        let context = self.context.borrow();
        context
            .down_patterns(&self.info.tree.root)
            .site_patterns
            .iter()
            .map(|&p| log_likelihoods[p])
            .collect()
    }

    /// Log-likelihood evaluated across the branch above the node. Equals
    /// [`Self::logl`] for reversible models.
    pub fn branch_logl(&self, node_idx: &NodeIdx) -> Result<f64> {
        let objective = self.branch_objective(node_idx)?;
        Ok(self.objective_logl(&objective, self.info.tree.blen(node_idx)))
    }

    /// Conditionals on both ends of the branch above the node, the current
    /// length of the branch is not part of them.
    pub fn branch_objective(&self, node_idx: &NodeIdx) -> Result<BranchObjective> {
        self.check_branch(node_idx)?;
        let mut context = self.context.borrow_mut();
        context.update_down(&self.info, &self.model);
        context.update_up_path(&self.info, &self.model, node_idx);
        Ok(BranchObjective::new(
            context.down_flat(node_idx).clone(),
            context.down_patterns(node_idx),
            context.up_flat(node_idx).clone(),
            context.up_patterns(node_idx),
        ))
    }

    /// Log-likelihood of the objective with the branch set to `blen`.
    pub fn objective_logl(&self, objective: &BranchObjective, blen: f64) -> f64 {
        let transitions = self.context.borrow_mut().transitions(&self.model, blen);
        let freqs = self.model.freqs();
        let weights = self.model.rates().weights();
        let centre = &objective.centre;
        let mut likelihoods = vec![0.0; centre.len()];
        for (r, p) in transitions.iter().enumerate() {
            let left = objective.left.category(r);
            let right = p * objective.right.category(r);
            for (k, l) in likelihoods.iter_mut().enumerate() {
                let (a, b) = (centre.left[k], centre.right[k]);
                let site: f64 = (0..freqs.len())
                    .map(|s| freqs[s] * left[(s, a)] * right[(s, b)])
                    .sum();
                *l += weights[r] * site;
            }
        }
        let log_likelihoods = likelihoods
            .iter()
            .enumerate()
            .map(|(k, l)| {
                let scale = objective.left.log_scale(centre.left[k])
                    + objective.right.log_scale(centre.right[k]);
                l.ln() + scale
            })
            .collect::<Vec<_>>();
        weighted_logl(&log_likelihoods, &centre.weights)
    }

    /// Conditional of the subtree below the node extended to its parent, with
    /// its patterns.
    pub(crate) fn subtree(&self, node_idx: &NodeIdx) -> (ConditionalStore, PatternInfo) {
        let mut context = self.context.borrow_mut();
        context.update_down(&self.info, &self.model);
        (
            context.down_ext(node_idx).clone(),
            context.down_patterns(node_idx).clone(),
        )
    }

    /// Conditional of everything outside the subtree of the node, extended
    /// across the node's own branch.
    pub(crate) fn complement(&self, node_idx: &NodeIdx) -> (ConditionalStore, PatternInfo) {
        let mut context = self.context.borrow_mut();
        context.update_down(&self.info, &self.model);
        context.update_up_path(&self.info, &self.model, node_idx);
        (
            context.up_ext(node_idx).clone(),
            context.up_patterns(node_idx).clone(),
        )
    }

    fn check_branch(&self, node_idx: &NodeIdx) -> Result<()> {
        if usize::from(node_idx) >= self.info.tree.len() {
            bail!("No {} in the tree.", node_idx);
        }
        if *node_idx == self.info.tree.root {
            bail!("The root has no branch above it.");
        }
        Ok(())
    }

    /// Equilibrium frequencies estimated from the observed state counts.
    pub fn empirical_freqs(&self) -> FreqVector {
        let counts = self.info.alignment.state_counts();
        let total: usize = counts.iter().sum();
        let n = self.model.n();
        if total == 0 {
            return FreqVector::from_element(n, 1.0 / n as f64);
        }
        let freqs = counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect::<Vec<_>>();
        make_freqs(&freqs, n).unwrap_or_else(|_| FreqVector::from_element(n, 1.0 / n as f64))
    }

    pub fn model(&self) -> &SubstModel<Q> {
        &self.model
    }

    pub fn tree(&self) -> &Tree {
        &self.info.tree
    }

    pub fn info(&self) -> &PhyloInfo {
        &self.info
    }

    pub fn caching(&self) -> bool {
        self.caching
    }

    /// Number of conditional stores computed since the context was created.
    pub fn recomputed(&self) -> usize {
        self.context.borrow().recomputed()
    }

    pub fn set_blen(&mut self, node_idx: &NodeIdx, blen: f64) -> Result<()> {
        self.info.tree.set_blen(node_idx, blen)
    }

    pub fn swap_subtrees(&mut self, a: &NodeIdx, b: &NodeIdx) -> Result<()> {
        self.info.tree.swap_subtrees(a, b)
    }

    pub fn set_param(&mut self, param: usize, value: f64) -> Result<()> {
        self.model.set_param(param, value)
    }

    pub fn set_freqs(&mut self, freqs: FreqVector) -> Result<()> {
        self.model.set_freqs(freqs)
    }

    pub fn set_rate_weight(&mut self, category: usize, weight: f64) -> Result<()> {
        self.model.set_rate_weight(category, weight)
    }

    pub fn set_gamma_shape(&mut self, shape: f64) -> Result<()> {
        self.model.set_gamma_shape(shape)
    }

    /// Returns the model to an earlier snapshot of itself. Conditionals that
    /// do not depend on the model, such as leaf stores and pattern tables,
    /// stay cached.
    pub fn restore_model(&mut self, snapshot: &SubstModel<Q>) {
        self.model.restore(snapshot);
    }

    /// Replaces the model, all cached conditionals are dropped.
    pub fn set_model(&mut self, model: SubstModel<Q>) -> Result<()> {
        ensure!(
            model.n() == self.info.n_states(),
            "The model has {} states but the alignment has {}.",
            model.n(),
            self.info.n_states()
        );
        self.model = model;
        self.reset();
        Ok(())
    }

    /// Replaces the tree, all cached conditionals are dropped.
    pub fn set_tree(&mut self, tree: Tree) -> Result<()> {
        self.info = PhyloInfoBuilder::new(tree, self.info.alignment.clone()).build()?;
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.context = RefCell::new(ComputationContext::new(self.info.tree.len(), self.caching));
    }
}

impl<Q: QMatrix> Display for LikelihoodCost<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.model)?;
        write!(f, "{}", self.info.tree)
    }
}

/// Log-likelihood of the alignment on the tree of `info` under `model`.
pub fn evaluate_log_likelihood<Q: QMatrix>(info: &PhyloInfo, model: &SubstModel<Q>) -> Result<f64> {
    let cost = LikelihoodCostBuilder::new(model.clone(), info.clone()).build()?;
    let logl = cost.logl();
    info!("Log-likelihood under {}: {}.", model, logl);
    Ok(logl)
}
