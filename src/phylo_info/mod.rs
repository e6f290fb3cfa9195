use anyhow::bail;
use log::info;

use crate::alignment::Alignment;
use crate::tree::{NodeIdx, Tree};
use crate::Result;

/// The PhyloInfo struct binds a tree to the alignment whose sequences sit at
/// its leaves.
///
/// Built with [`PhyloInfoBuilder`], which checks that every leaf has exactly one
/// alignment row and every alignment row has exactly one leaf.
#[derive(Debug, Clone)]
pub struct PhyloInfo {
    /// Integer-encoded multiple sequence alignment.
    pub alignment: Alignment,
    /// Phylogenetic tree.
    pub tree: Tree,
    /// Alignment row of every leaf, indexed by node index, `None` for internal nodes.
    leaf_rows: Vec<Option<usize>>,
}

impl PhyloInfo {
    /// Number of alignment sites.
    pub fn msa_length(&self) -> usize {
        self.alignment.len()
    }

    pub fn n_states(&self) -> usize {
        self.alignment.n_states()
    }

    /// Observed states of the given leaf.
    pub fn leaf_states(&self, node_idx: &NodeIdx) -> &[u8] {
        let row = self.leaf_rows[usize::from(node_idx)]
            .unwrap_or_else(|| unreachable!("{} is not a leaf", node_idx));
        &self.alignment.rows()[row]
    }

    /// Replaces the alignment, e.g. with a single column of it.
    pub fn with_alignment(&self, alignment: Alignment) -> Result<PhyloInfo> {
        PhyloInfoBuilder::new(self.tree.clone(), alignment).build()
    }
}

pub struct PhyloInfoBuilder {
    tree: Tree,
    alignment: Alignment,
}

impl PhyloInfoBuilder {
    pub fn new(tree: Tree, alignment: Alignment) -> Self {
        PhyloInfoBuilder { tree, alignment }
    }

    pub fn build(self) -> Result<PhyloInfo> {
        if self.tree.n() < 2 {
            bail!("The tree must have at least two leaves.");
        }
        if self.tree.n() != self.alignment.taxa().len() {
            bail!(
                "The tree has {} leaves but the alignment has {} sequences.",
                self.tree.n(),
                self.alignment.taxa().len()
            );
        }
        let mut leaf_rows = vec![None; self.tree.len()];
        for leaf in self.tree.leaves() {
            match self.alignment.row_index(&leaf.id) {
                Some(row) => leaf_rows[usize::from(leaf.idx)] = Some(row),
                None => bail!("No sequence found for leaf {}.", leaf.id),
            }
        }
        info!(
            "Set up phylogenetic info with {} taxa and {} sites.",
            self.tree.n(),
            self.alignment.len()
        );
        Ok(PhyloInfo {
            alignment: self.alignment,
            tree: self.tree,
            leaf_rows,
        })
    }
}

#[cfg(test)]
mod tests;
