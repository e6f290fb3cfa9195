use approx::assert_relative_eq;
use assert_matches::assert_matches;

use crate::alignment::Alignment;
use crate::likelihood::{LikelihoodCost, LikelihoodCostBuilder};
use crate::optimisers::{optimise_branch, BranchOptimiser, BranchOptimiserConfig};
use crate::phylo_info::PhyloInfoBuilder;
use crate::substitution_models::{SubstModel, HKY, JC69};

fn jc69_cost(newick: &str, alignment: Alignment) -> LikelihoodCost<JC69> {
    let info = PhyloInfoBuilder::new(tree!(newick), alignment).build().unwrap();
    LikelihoodCostBuilder::new(SubstModel::<JC69>::new(&[], &[]).unwrap(), info)
        .build()
        .unwrap()
}

fn quartet_alignment() -> Alignment {
    dna_alignment!(
        ("A", b"AACGTTACGTAACTGAACGT"),
        ("B", b"AACGTTACGAAACTGAACTT"),
        ("C", b"AGCGTCACGTTACTGAGCGT"),
        ("D", b"TGCATCACGTTTCTGAGCGA"),
    )
}

/// Maximum likelihood JC69 distance for a proportion `p` of differing sites.
fn jc69_distance(p: f64) -> f64 {
    -0.75 * (1.0 - 4.0 / 3.0 * p).ln()
}

#[test]
fn two_taxa_recovers_jc69_distance() {
    let mut cost = jc69_cost("(A:0.3,B:0.1);", dna_alignment!(("A", b"AAAA"), ("B", b"AAAG")));
    let a = cost.tree().idx("A");
    let start = cost.logl();

    let logl = optimise_branch(&mut cost, &a, &BranchOptimiserConfig::default()).unwrap();

    assert!(logl > start);
    assert_relative_eq!(cost.tree().blen(&a), jc69_distance(0.25) - 0.1, epsilon = 1e-4);
    assert_relative_eq!(logl, cost.logl());
}

#[test]
fn optimal_branch_is_kept() {
    let optimum = jc69_distance(0.25) - 0.1;
    let newick = format!("(A:{},B:0.1);", optimum);
    let mut cost = jc69_cost(&newick, dna_alignment!(("A", b"AAAA"), ("B", b"AAAG")));
    let a = cost.tree().idx("A");
    let start = cost.logl();

    let logl = optimise_branch(&mut cost, &a, &BranchOptimiserConfig::default()).unwrap();

    assert!(logl >= start);
    assert_relative_eq!(cost.tree().blen(&a), optimum, epsilon = 1e-4);
}

#[test]
fn identical_sequences_shrink_branch() {
    let mut cost = jc69_cost("(A:0.5,B:0.5);", dna_alignment!(("A", b"ACGT"), ("B", b"ACGT")));
    let config = BranchOptimiserConfig::default();
    let a = cost.tree().idx("A");
    let b = cost.tree().idx("B");
    optimise_branch(&mut cost, &a, &config).unwrap();
    optimise_branch(&mut cost, &b, &config).unwrap();
    assert!(cost.tree().blen(&a) + cost.tree().blen(&b) < 1e-3);
}

#[test]
fn single_branch_steps_never_decrease() {
    let mut cost = jc69_cost("((A:0.9,B:0.01)E:1.5,(C:0.2,D:2.0)F:0.3)G;", quartet_alignment());
    let config = BranchOptimiserConfig::default();
    let mut prev = cost.logl();
    let root = cost.tree().root;
    let nodes = cost.tree().preorder().to_vec();
    for node_idx in nodes.iter().filter(|&n| *n != root) {
        let logl = optimise_branch(&mut cost, node_idx, &config).unwrap();
        assert!(logl >= prev - 1e-9);
        prev = logl;
    }
}

#[test]
fn root_branch_is_rejected() {
    let mut cost = jc69_cost("((A:0.9,B:0.01)E:1.5,(C:0.2,D:2.0)F:0.3)G;", quartet_alignment());
    let root = cost.tree().root;
    assert_matches!(
        optimise_branch(&mut cost, &root, &BranchOptimiserConfig::default()),
        Err(_)
    );
}

#[test]
fn sweeps_converge() {
    let info = PhyloInfoBuilder::new(
        tree!("((A:0.9,B:0.01)E:1.5,(C:0.2,D:2.0)F:0.3)G;"),
        quartet_alignment(),
    )
    .build()
    .unwrap();
    let model = SubstModel::<HKY>::new(&[0.3, 0.2, 0.3, 0.2], &[2.0]).unwrap();
    let mut cost = LikelihoodCostBuilder::new(model, info).build().unwrap();

    let res = BranchOptimiser::new(&mut cost)
        .with_epsilon(1e-5)
        .run()
        .unwrap();

    assert!(res.final_logl > res.initial_logl);
    assert!(res.iterations >= 1);
    assert_relative_eq!(res.final_logl, cost.logl(), epsilon = 1e-9);

    let config = BranchOptimiserConfig::default();
    let converged = cost.logl();
    let root = cost.tree().root;
    let nodes = cost.tree().preorder().to_vec();
    for node_idx in nodes.iter().filter(|&n| *n != root) {
        let logl = optimise_branch(&mut cost, node_idx, &config).unwrap();
        assert!(logl - converged < 1e-3);
    }
}

#[test]
fn long_branch_extends_search_interval() {
    let mut cost = jc69_cost("(A:12.0,B:0.1);", dna_alignment!(("A", b"AAAA"), ("B", b"AAAG")));
    let config = BranchOptimiserConfig {
        max_blen: 5.0,
        ..Default::default()
    };
    let a = cost.tree().idx("A");
    let start = cost.logl();
    let logl = optimise_branch(&mut cost, &a, &config).unwrap();
    assert!(logl > start);
    assert_relative_eq!(cost.tree().blen(&a), jc69_distance(0.25) - 0.1, epsilon = 1e-4);
}
