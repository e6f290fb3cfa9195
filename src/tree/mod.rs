use std::fmt::{Display, Formatter};

use anyhow::bail;
use hashbrown::HashSet;

use crate::Result;

pub mod tree_node;
pub use tree_node::*;
pub mod tree_parser;

#[derive(Debug, PartialEq, Clone, Copy, PartialOrd, Eq, Ord, Hash)]
pub enum NodeIdx {
    Internal(usize),
    Leaf(usize),
}

use NodeIdx::{Internal as Int, Leaf};

impl Display for NodeIdx {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Int(idx) => write!(f, "internal node {}", idx),
            Leaf(idx) => write!(f, "leaf node {}", idx),
        }
    }
}

impl From<NodeIdx> for usize {
    fn from(node_idx: NodeIdx) -> usize {
        match node_idx {
            Int(idx) => idx,
            Leaf(idx) => idx,
        }
    }
}

impl From<&NodeIdx> for usize {
    fn from(node_idx: &NodeIdx) -> usize {
        usize::from(*node_idx)
    }
}

/// Arena of tree nodes addressed by stable [`NodeIdx`] values.
///
/// The root has either two children (rooted tree) or three children (unrooted
/// tree rooted at a trifurcation), every other internal node has exactly two.
/// Rearrangements rewire parent and child references, nodes are never
/// recreated, so indices stay valid for the lifetime of the tree.
#[derive(Debug, Clone)]
pub struct Tree {
    pub root: NodeIdx,
    nodes: Vec<Node>,
    postorder: Vec<NodeIdx>,
    preorder: Vec<NodeIdx>,
    leaf_ids: Vec<String>,
    n: usize,
}

impl Tree {
    pub(crate) fn new_empty() -> Self {
        Self {
            root: Int(0),
            nodes: Vec::new(),
            postorder: Vec::new(),
            preorder: Vec::new(),
            leaf_ids: Vec::new(),
            n: 0,
        }
    }

    pub(crate) fn push(&mut self, node: Node) {
        debug_assert_eq!(usize::from(node.idx), self.nodes.len());
        self.nodes.push(node);
    }

    pub(crate) fn complete(&mut self) -> Result<()> {
        self.leaf_ids = self
            .nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.id.clone())
            .collect();
        self.n = self.leaf_ids.len();
        for node in &self.nodes {
            let expected = if node.idx == self.root { 2..=3 } else { 2..=2 };
            if !node.is_leaf() && !expected.contains(&node.children.len()) {
                bail!(
                    "Node {} has {} children, only bifurcating trees are supported.",
                    node,
                    node.children.len()
                );
            }
        }
        let mut seen = HashSet::new();
        for id in &self.leaf_ids {
            if id.is_empty() {
                bail!("All leaves must be labelled.");
            }
            if !seen.insert(id.as_str()) {
                bail!("Duplicate leaf id {}.", id);
            }
        }
        drop(seen);
        self.compute_postorder();
        self.compute_preorder();
        Ok(())
    }

    pub(crate) fn compute_postorder(&mut self) {
        let mut order = Vec::<NodeIdx>::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(node_idx) = stack.pop() {
            order.push(node_idx);
            stack.extend(self.children(&node_idx).iter());
        }
        order.reverse();
        self.postorder = order;
    }

    pub(crate) fn compute_preorder(&mut self) {
        self.preorder = self.preorder_subroot(&self.root);
    }

    pub fn preorder_subroot(&self, subroot_idx: &NodeIdx) -> Vec<NodeIdx> {
        let mut order = Vec::<NodeIdx>::with_capacity(self.nodes.len());
        let mut stack = vec![*subroot_idx];
        while let Some(node_idx) = stack.pop() {
            order.push(node_idx);
            stack.extend(self.children(&node_idx).iter().rev());
        }
        order
    }

    pub fn postorder(&self) -> &[NodeIdx] {
        &self.postorder
    }

    pub fn preorder(&self) -> &[NodeIdx] {
        &self.preorder
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of leaves.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn is_rooted(&self) -> bool {
        self.children(&self.root).len() == 2
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn leaves(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_leaf()).collect()
    }

    pub fn leaf_ids(&self) -> &[String] {
        &self.leaf_ids
    }

    pub fn node(&self, node_idx: &NodeIdx) -> &Node {
        &self.nodes[usize::from(node_idx)]
    }

    pub(crate) fn node_mut(&mut self, node_idx: &NodeIdx) -> &mut Node {
        &mut self.nodes[usize::from(node_idx)]
    }

    pub fn node_id(&self, node_idx: &NodeIdx) -> &str {
        &self.node(node_idx).id
    }

    pub fn parent(&self, node_idx: &NodeIdx) -> Option<&NodeIdx> {
        self.node(node_idx).parent.as_ref()
    }

    pub fn children(&self, node_idx: &NodeIdx) -> &[NodeIdx] {
        &self.node(node_idx).children
    }

    /// All other children of the node's parent.
    pub fn siblings(&self, node_idx: &NodeIdx) -> Vec<NodeIdx> {
        match self.parent(node_idx) {
            Some(parent) => self
                .children(parent)
                .iter()
                .filter(|&c| c != node_idx)
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn sibling(&self, node_idx: &NodeIdx) -> Option<NodeIdx> {
        self.siblings(node_idx).first().copied()
    }

    pub fn blen(&self, node_idx: &NodeIdx) -> f64 {
        self.node(node_idx).blen
    }

    /// Sets the length of the branch above the node, negative or non-finite
    /// lengths are rejected.
    pub fn set_blen(&mut self, node_idx: &NodeIdx, blen: f64) -> Result<()> {
        if !blen.is_finite() || blen < 0.0 {
            bail!("Invalid branch length {} for {}.", blen, node_idx);
        }
        if usize::from(node_idx) >= self.nodes.len() {
            bail!("No {} in the tree.", node_idx);
        }
        self.node_mut(node_idx).blen = blen;
        Ok(())
    }

    /// Sum of all branch lengths, the root branch excluded.
    pub fn height(&self) -> f64 {
        self.nodes
            .iter()
            .filter(|n| n.idx != self.root)
            .map(|n| n.blen)
            .sum()
    }

    pub fn try_idx(&self, id: &str) -> Result<NodeIdx> {
        match self.nodes.iter().find(|n| n.id == id) {
            Some(node) => Ok(node.idx),
            None => bail!("No node with id {} found in the tree", id),
        }
    }

    pub fn idx(&self, id: &str) -> NodeIdx {
        self.try_idx(id).unwrap()
    }

    pub fn by_id(&self, id: &str) -> &Node {
        self.node(&self.idx(id))
    }

    pub fn is_ancestor(&self, ancestor: &NodeIdx, node_idx: &NodeIdx) -> bool {
        let mut current = self.parent(node_idx);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Exchanges the positions of the subtrees rooted at `a` and `b` by swapping
    /// their parents. Both nodes keep their own branch lengths and the position
    /// they take in the new parent's child list is the one the other node held.
    pub fn swap_subtrees(&mut self, a: &NodeIdx, b: &NodeIdx) -> Result<()> {
        if usize::from(a) >= self.nodes.len() || usize::from(b) >= self.nodes.len() {
            bail!("The nodes to swap must be part of the tree.");
        }
        if *a == self.root || *b == self.root {
            bail!("Cannot swap the root of the tree.");
        }
        if self.is_ancestor(a, b) || self.is_ancestor(b, a) {
            bail!("Cannot swap {} and {}, one is an ancestor of the other.", a, b);
        }
        let (Some(pa), Some(pb)) = (self.node(a).parent, self.node(b).parent) else {
            bail!("Cannot swap {} and {}, both need a parent.", a, b);
        };
        if pa == pb {
            return Ok(());
        }
        let (Some(pos_a), Some(pos_b)) = (
            self.children(&pa).iter().position(|c| c == a),
            self.children(&pb).iter().position(|c| c == b),
        ) else {
            unreachable!("Parent and child references of {} and {} disagree.", a, b);
        };
        self.node_mut(&pa).children[pos_a] = *b;
        self.node_mut(&pb).children[pos_b] = *a;
        self.node_mut(a).parent = Some(pb);
        self.node_mut(b).parent = Some(pa);

        self.compute_postorder();
        self.compute_preorder();
        debug_assert_eq!(self.postorder.len(), self.nodes.len());
        Ok(())
    }

    /// Non-trivial bipartitions of the leaf set, each as a membership vector
    /// over [`Self::leaf_ids`] sorted by id, normalised so that the first leaf
    /// is never a member.
    pub fn splits(&self) -> HashSet<Vec<bool>> {
        let mut sorted_ids = self.leaf_ids.clone();
        sorted_ids.sort();
        let mut below: Vec<Vec<bool>> = vec![Vec::new(); self.nodes.len()];
        let mut splits = HashSet::new();
        for node_idx in &self.postorder {
            let node = self.node(node_idx);
            let mut members = vec![false; self.n];
            if node.is_leaf() {
                let pos = sorted_ids.binary_search(&node.id).unwrap();
                members[pos] = true;
            } else {
                for child in &node.children {
                    for (m, &c) in members.iter_mut().zip(&below[usize::from(child)]) {
                        *m |= c;
                    }
                }
            }
            let count = members.iter().filter(|&&m| m).count();
            if count >= 2 && count + 2 <= self.n {
                let split = if members[0] {
                    members.iter().map(|m| !m).collect()
                } else {
                    members.clone()
                };
                splits.insert(split);
            }
            below[usize::from(node_idx)] = members;
        }
        splits
    }

    /// Unrooted Robinson-Foulds distance, the trees must share the leaf set.
    pub fn robinson_foulds(&self, other: &Tree) -> usize {
        let ours = self.splits();
        let theirs = other.splits();
        ours.symmetric_difference(&theirs).count()
    }

    fn write_subtree(&self, f: &mut Formatter<'_>, node_idx: &NodeIdx) -> std::fmt::Result {
        let node = self.node(node_idx);
        if !node.is_leaf() {
            write!(f, "(")?;
            for (i, child) in node.children.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                self.write_subtree(f, child)?;
            }
            write!(f, ")")?;
        }
        write!(f, "{}", node.id)?;
        if *node_idx != self.root {
            write!(f, ":{}", node.blen)?;
        }
        Ok(())
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.write_subtree(f, &self.root)?;
        write!(f, ";")
    }
}
