use std::fmt;

use anyhow::bail;
use log::{info, warn};
use pest::{error::Error as PestError, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::tree::{Node, NodeIdx, Tree};
use crate::Result;

#[derive(Parser)]
#[grammar = "./tree/newick.pest"]
pub struct NewickParser;

#[derive(Debug)]
pub(crate) struct ParsingError(pub(crate) Box<PestError<Rule>>);

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Malformed newick string")?;
        write!(f, "{}", self.0)
    }
}

/// Parses one or more `;`-terminated newick trees.
///
/// Rooted trees keep their bifurcating root, unrooted trees are rooted at the
/// trifurcation, so their root has three children.
pub fn from_newick(newick_string: &str) -> Result<Vec<Tree>> {
    info!("Parsing newick trees.");
    let newick_rule = match NewickParser::parse(Rule::newick, newick_string) {
        Ok(mut pairs) => pairs.next().unwrap(),
        Err(e) => bail!(ParsingError(Box::new(e))),
    };
    let mut trees = Vec::new();
    for tree_rule in newick_rule.into_inner() {
        if tree_rule.as_rule() != Rule::tree {
            continue;
        }
        let mut tree = Tree::new_empty();
        let root_rule = tree_rule.into_inner().next().unwrap();
        let root = tree.parse_node(root_rule, None);
        tree.root = root;
        tree.node_mut(&root).blen = 0.0;
        tree.complete()?;
        trees.push(tree);
    }
    info!("Finished parsing {} newick tree(s) successfully.", trees.len());
    Ok(trees)
}

impl Tree {
    fn parse_node(&mut self, rule: Pair<Rule>, parent: Option<NodeIdx>) -> NodeIdx {
        let idx = self.len();
        let is_leaf = rule.as_rule() == Rule::leaf;
        let node = if is_leaf {
            Node::new_leaf(idx, parent, 0.0, String::new())
        } else {
            Node::new_internal(idx, parent, Vec::new(), 0.0, String::new())
        };
        let node_idx = node.idx;
        self.push(node);

        let mut id = String::new();
        let mut blen = 0.0;
        let mut children = Vec::new();
        for inner in rule.into_inner() {
            match inner.as_rule() {
                Rule::label => id = inner.as_str().to_string(),
                Rule::branch_length => blen = Self::parse_branch_length(inner),
                Rule::internal | Rule::leaf => {
                    children.push(self.parse_node(inner, Some(node_idx)));
                }
                _ => unreachable!(),
            }
        }
        let node = self.node_mut(&node_idx);
        node.id = id;
        node.blen = blen;
        node.children = children;
        node_idx
    }

    fn parse_branch_length(rule: Pair<Rule>) -> f64 {
        let blen = rule
            .into_inner()
            .next()
            .unwrap()
            .as_str()
            .trim()
            .parse::<f64>()
            .unwrap_or_default();
        if blen < 0.0 {
            warn!("Negative branch length {} set to zero.", blen);
            return 0.0;
        }
        blen
    }
}
