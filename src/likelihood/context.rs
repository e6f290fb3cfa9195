use crate::likelihood::ConditionalStore;
use crate::patterns::PatternInfo;
use crate::phylo_info::PhyloInfo;
use crate::substitution_models::{QMatrix, SubstMatrix, SubstModel, TransitionCache};
use crate::tree::{NodeIdx, Tree};

/// Which computation a node needs in the downward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConditionalKind {
    Leaf,
    Internal,
    Root,
}

impl ConditionalKind {
    pub(crate) fn of(tree: &Tree, node_idx: &NodeIdx) -> Self {
        if *node_idx == tree.root {
            ConditionalKind::Root
        } else if tree.node(node_idx).is_leaf() {
            ConditionalKind::Leaf
        } else {
            ConditionalKind::Internal
        }
    }
}

/// Everything a cached value was computed from: the model generation, the
/// branch length it was extended over and the versions of its inputs.
/// Versions are unique across the context, so they also identify which
/// entries were used.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Stamp {
    model: u64,
    blen: u64,
    inputs: Vec<u64>,
}

impl Stamp {
    fn inputs(inputs: Vec<u64>) -> Self {
        Stamp {
            inputs,
            ..Default::default()
        }
    }

    fn extension(model: u64, blen: f64, input: u64) -> Self {
        Stamp {
            model,
            blen: blen.to_bits(),
            inputs: vec![input],
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Cached<T> {
    pub(crate) value: T,
    stamp: Stamp,
    pub(crate) version: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct Patterns {
    pub(crate) info: PatternInfo,
    pub(crate) sources: Vec<Vec<usize>>,
}

type Slots<T> = Vec<Option<Cached<T>>>;

/// One of the directed conditionals meeting at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Down(usize),
    Up(usize),
}

impl Side {
    fn pick<'a, T>(&self, down: &'a Slots<T>, up: &'a Slots<T>) -> &'a Cached<T> {
        match *self {
            Side::Down(idx) => cached(&down[idx]),
            Side::Up(idx) => cached(&up[idx]),
        }
    }
}

/// Scratch state of one likelihood computation: memoised transition matrices
/// and the directed conditionals of every node.
///
/// `down` entries of a node describe its subtree, `up` entries describe the
/// rest of the tree as seen from the node. Flat entries sit at the node
/// itself, extended entries at the other end of the branch above the node.
#[derive(Debug, Clone)]
pub struct ComputationContext {
    caching: bool,
    next_version: u64,
    model_generation: Option<u64>,
    transitions: TransitionCache,
    recomputed: usize,
    down_patterns: Slots<Patterns>,
    up_patterns: Slots<Patterns>,
    down_flat: Slots<ConditionalStore>,
    down_ext: Slots<ConditionalStore>,
    up_flat: Slots<ConditionalStore>,
    up_ext: Slots<ConditionalStore>,
}

fn cached<T>(slot: &Option<Cached<T>>) -> &Cached<T> {
    slot.as_ref()
        .unwrap_or_else(|| unreachable!("Conditional used before it was computed."))
}

/// Recomputes the slot unless caching is on and the stamp is unchanged.
/// Returns whether the value was recomputed.
fn refresh<T>(
    slot: &mut Option<Cached<T>>,
    stamp: Stamp,
    caching: bool,
    next_version: &mut u64,
    compute: impl FnOnce() -> T,
) -> bool {
    if caching && slot.as_ref().is_some_and(|c| c.stamp == stamp) {
        return false;
    }
    *next_version += 1;
    *slot = Some(Cached {
        value: compute(),
        stamp,
        version: *next_version,
    });
    true
}

fn transitions_for<Q: QMatrix>(
    cache: &mut TransitionCache,
    model: &SubstModel<Q>,
    blen: f64,
) -> Vec<SubstMatrix> {
    (0..model.categories())
        .map(|r| cache.p(model, r, blen).clone())
        .collect()
}

impl ComputationContext {
    pub fn new(nodes: usize, caching: bool) -> Self {
        ComputationContext {
            caching,
            next_version: 0,
            model_generation: None,
            transitions: TransitionCache::new(),
            recomputed: 0,
            down_patterns: vec![None; nodes],
            up_patterns: vec![None; nodes],
            down_flat: vec![None; nodes],
            down_ext: vec![None; nodes],
            up_flat: vec![None; nodes],
            up_ext: vec![None; nodes],
        }
    }

    pub fn caching(&self) -> bool {
        self.caching
    }

    /// Number of conditional stores computed so far.
    pub fn recomputed(&self) -> usize {
        self.recomputed
    }

    pub(crate) fn transitions<Q: QMatrix>(
        &mut self,
        model: &SubstModel<Q>,
        blen: f64,
    ) -> Vec<SubstMatrix> {
        self.sync_model(model);
        transitions_for(&mut self.transitions, model, blen)
    }

    fn sync_model<Q: QMatrix>(&mut self, model: &SubstModel<Q>) {
        if self.model_generation != Some(model.generation()) {
            self.transitions.invalidate();
            self.model_generation = Some(model.generation());
        }
    }

    /// Brings the downward entries of every node up to date, children first.
    pub(crate) fn update_down<Q: QMatrix>(&mut self, info: &PhyloInfo, model: &SubstModel<Q>) {
        self.sync_model(model);
        for node_idx in info.tree.postorder() {
            let kind = ConditionalKind::of(&info.tree, node_idx);
            self.update_down_patterns(info, node_idx, kind);
            self.update_down_flat(info, model, node_idx, kind);
            if kind != ConditionalKind::Root {
                self.update_down_ext(&info.tree, model, node_idx);
            }
        }
    }

    fn update_down_patterns(&mut self, info: &PhyloInfo, node_idx: &NodeIdx, kind: ConditionalKind) {
        let idx = usize::from(node_idx);
        let children = info.tree.children(node_idx);
        let stamp = match kind {
            ConditionalKind::Leaf => Stamp::default(),
            _ => Stamp::inputs(
                children
                    .iter()
                    .map(|c| cached(&self.down_patterns[usize::from(c)]).version)
                    .collect(),
            ),
        };
        let mut slot = self.down_patterns[idx].take();
        refresh(&mut slot, stamp, self.caching, &mut self.next_version, || {
            match kind {
                ConditionalKind::Leaf => Patterns {
                    info: PatternInfo::leaf(info.leaf_states(node_idx)),
                    sources: Vec::new(),
                },
                _ => {
                    let inputs = children
                        .iter()
                        .map(|c| &cached(&self.down_patterns[usize::from(c)]).value.info)
                        .collect::<Vec<_>>();
                    let (merged, sources) = PatternInfo::merge_all(&inputs);
                    Patterns {
                        info: merged,
                        sources,
                    }
                }
            }
        });
        self.down_patterns[idx] = slot;
    }

    fn update_down_flat<Q: QMatrix>(
        &mut self,
        info: &PhyloInfo,
        model: &SubstModel<Q>,
        node_idx: &NodeIdx,
        kind: ConditionalKind,
    ) {
        let idx = usize::from(node_idx);
        let children = info.tree.children(node_idx);
        let mut inputs = vec![cached(&self.down_patterns[idx]).version];
        if kind != ConditionalKind::Leaf {
            inputs.extend(
                children
                    .iter()
                    .map(|c| cached(&self.down_ext[usize::from(c)]).version),
            );
        }
        let mut slot = self.down_flat[idx].take();
        let recomputed = refresh(
            &mut slot,
            Stamp::inputs(inputs),
            self.caching,
            &mut self.next_version,
            || {
                let patterns = &cached(&self.down_patterns[idx]).value;
                match kind {
                    ConditionalKind::Leaf => {
                        ConditionalStore::leaf(&patterns.info, model.n(), model.categories())
                    }
                    _ => {
                        let inputs = children
                            .iter()
                            .zip(&patterns.sources)
                            .map(|(c, sources)| {
                                (
                                    &cached(&self.down_ext[usize::from(c)]).value,
                                    sources.as_slice(),
                                )
                            })
                            .collect::<Vec<_>>();
                        ConditionalStore::product(&inputs, patterns.info.len())
                    }
                }
            },
        );
        self.down_flat[idx] = slot;
        self.recomputed += recomputed as usize;
    }

    fn update_down_ext<Q: QMatrix>(&mut self, tree: &Tree, model: &SubstModel<Q>, node_idx: &NodeIdx) {
        let idx = usize::from(node_idx);
        let blen = tree.blen(node_idx);
        let stamp = Stamp::extension(model.generation(), blen, cached(&self.down_flat[idx]).version);
        let mut slot = self.down_ext[idx].take();
        let recomputed = refresh(&mut slot, stamp, self.caching, &mut self.next_version, || {
            let transitions = transitions_for(&mut self.transitions, model, blen);
            cached(&self.down_flat[idx]).value.extend(&transitions)
        });
        self.down_ext[idx] = slot;
        self.recomputed += recomputed as usize;
    }

    /// Brings the upward entries on the path from the root to the node up to
    /// date. The downward entries must be current.
    pub(crate) fn update_up_path<Q: QMatrix>(
        &mut self,
        info: &PhyloInfo,
        model: &SubstModel<Q>,
        node_idx: &NodeIdx,
    ) {
        self.sync_model(model);
        let mut path = Vec::new();
        let mut current = *node_idx;
        while let Some(parent) = info.tree.parent(&current) {
            path.push(current);
            current = *parent;
        }
        for node in path.iter().rev() {
            self.update_up_node(&info.tree, model, node);
        }
    }

    /// Brings the upward entries of every non-root node up to date.
    pub(crate) fn update_up<Q: QMatrix>(&mut self, info: &PhyloInfo, model: &SubstModel<Q>) {
        self.sync_model(model);
        for node_idx in info.tree.preorder() {
            if *node_idx != info.tree.root {
                self.update_up_node(&info.tree, model, node_idx);
            }
        }
    }

    fn up_sides(tree: &Tree, node_idx: &NodeIdx) -> Vec<Side> {
        let parent = tree
            .parent(node_idx)
            .unwrap_or_else(|| unreachable!("The root has no upward conditional."));
        let mut sides = tree
            .siblings(node_idx)
            .iter()
            .map(|s| Side::Down(usize::from(s)))
            .collect::<Vec<_>>();
        if *parent != tree.root {
            sides.push(Side::Up(usize::from(parent)));
        }
        sides
    }

    fn update_up_node<Q: QMatrix>(&mut self, tree: &Tree, model: &SubstModel<Q>, node_idx: &NodeIdx) {
        let idx = usize::from(node_idx);
        let sides = Self::up_sides(tree, node_idx);

        let stamp = Stamp::inputs(
            sides
                .iter()
                .map(|s| s.pick(&self.down_patterns, &self.up_patterns).version)
                .collect(),
        );
        let mut slot = self.up_patterns[idx].take();
        refresh(&mut slot, stamp, self.caching, &mut self.next_version, || {
            let inputs = sides
                .iter()
                .map(|s| &s.pick(&self.down_patterns, &self.up_patterns).value.info)
                .collect::<Vec<_>>();
            let (info, sources) = PatternInfo::merge_all(&inputs);
            Patterns { info, sources }
        });
        self.up_patterns[idx] = slot;

        let mut inputs = vec![cached(&self.up_patterns[idx]).version];
        inputs.extend(
            sides
                .iter()
                .map(|s| s.pick(&self.down_ext, &self.up_ext).version),
        );
        let mut slot = self.up_flat[idx].take();
        let recomputed = refresh(
            &mut slot,
            Stamp::inputs(inputs),
            self.caching,
            &mut self.next_version,
            || {
                let patterns = &cached(&self.up_patterns[idx]).value;
                let inputs = sides
                    .iter()
                    .zip(&patterns.sources)
                    .map(|(s, sources)| {
                        (
                            &s.pick(&self.down_ext, &self.up_ext).value,
                            sources.as_slice(),
                        )
                    })
                    .collect::<Vec<_>>();
                ConditionalStore::product(&inputs, patterns.info.len())
            },
        );
        self.up_flat[idx] = slot;
        self.recomputed += recomputed as usize;

        let blen = tree.blen(node_idx);
        let stamp = Stamp::extension(model.generation(), blen, cached(&self.up_flat[idx]).version);
        let mut slot = self.up_ext[idx].take();
        let recomputed = refresh(&mut slot, stamp, self.caching, &mut self.next_version, || {
            let transitions = transitions_for(&mut self.transitions, model, blen);
            cached(&self.up_flat[idx]).value.extend(&transitions)
        });
        self.up_ext[idx] = slot;
        self.recomputed += recomputed as usize;
    }

    pub(crate) fn down_patterns(&self, node_idx: &NodeIdx) -> &PatternInfo {
        &cached(&self.down_patterns[usize::from(node_idx)]).value.info
    }

    pub(crate) fn up_patterns(&self, node_idx: &NodeIdx) -> &PatternInfo {
        &cached(&self.up_patterns[usize::from(node_idx)]).value.info
    }

    pub(crate) fn down_flat(&self, node_idx: &NodeIdx) -> &ConditionalStore {
        &cached(&self.down_flat[usize::from(node_idx)]).value
    }

    pub(crate) fn down_ext(&self, node_idx: &NodeIdx) -> &ConditionalStore {
        &cached(&self.down_ext[usize::from(node_idx)]).value
    }

    pub(crate) fn up_flat(&self, node_idx: &NodeIdx) -> &ConditionalStore {
        &cached(&self.up_flat[usize::from(node_idx)]).value
    }

    pub(crate) fn up_ext(&self, node_idx: &NodeIdx) -> &ConditionalStore {
        &cached(&self.up_ext[usize::from(node_idx)]).value
    }
}
