use approx::assert_relative_eq;
use rstest::*;

use crate::alignment::Alignment;
use crate::likelihood::{LikelihoodCost, LikelihoodCostBuilder};
use crate::optimisers::{
    best_nni, evaluate_nni, nni_applicable, optimise_nni, BranchOptimiserConfig, NniConfiguration,
    NniEvaluation, NniOptimiser,
};
use crate::phylo_info::PhyloInfoBuilder;
use crate::substitution_models::{RateCategories, SubstModel, HKY, JC69};

fn jc69_cost(newick: &str, alignment: Alignment) -> LikelihoodCost<JC69> {
    let info = PhyloInfoBuilder::new(tree!(newick), alignment).build().unwrap();
    LikelihoodCostBuilder::new(SubstModel::<JC69>::new(&[], &[]).unwrap(), info)
        .build()
        .unwrap()
}

/// A and C identical, B and D identical.
fn ac_bd_alignment() -> Alignment {
    dna_alignment!(
        ("A", b"AAAACCCCGGGGTTTTACGT"),
        ("B", b"CCCCGGGGTTTTAAAAACGT"),
        ("C", b"AAAACCCCGGGGTTTTACGT"),
        ("D", b"CCCCGGGGTTTTAAAAACGT"),
    )
}

/// B and C identical, A and D identical.
fn bc_ad_alignment() -> Alignment {
    dna_alignment!(
        ("A", b"AAAACCCCGGGGTTTTACGT"),
        ("B", b"CCCCGGGGTTTTAAAAACGT"),
        ("C", b"CCCCGGGGTTTTAAAAACGT"),
        ("D", b"AAAACCCCGGGGTTTTACGT"),
    )
}

fn evaluation(configuration: NniConfiguration, logl: f64) -> NniEvaluation {
    NniEvaluation {
        configuration,
        logl,
        blen: 0.1,
    }
}

#[rstest]
#[case::all_equal(-5.0, -5.0, -5.0, NniConfiguration::Identity)]
#[case::swaps_tie(-7.0, -3.0, -3.0, NniConfiguration::SwapA)]
#[case::identity_ties_swap(-3.0, -3.0, -4.0, NniConfiguration::Identity)]
#[case::last_strictly_best(-3.0, -3.0, -2.5, NniConfiguration::SwapB)]
fn ties_prefer_earlier_configurations(
    #[case] identity: f64,
    #[case] swap_a: f64,
    #[case] swap_b: f64,
    #[case] expected: NniConfiguration,
) {
    let evaluations = [
        evaluation(NniConfiguration::Identity, identity),
        evaluation(NniConfiguration::SwapA, swap_a),
        evaluation(NniConfiguration::SwapB, swap_b),
    ];
    assert_eq!(best_nni(&evaluations).configuration, expected);
}

#[test]
fn applicability() {
    let cost = jc69_cost("(((A:0.1,B:0.1)E:0.1,C:0.1)F:0.1,D:0.1)G;", ac_bd_alignment());
    let tree = cost.tree();
    assert!(nni_applicable(&cost, &tree.idx("E")));
    // the other root branch ends in a leaf
    assert!(!nni_applicable(&cost, &tree.idx("F")));
    assert!(!nni_applicable(&cost, &tree.idx("A")));
    assert!(!nni_applicable(&cost, &tree.root));

    let cost = jc69_cost("(A:0.1,B:0.1,(C:0.1,D:0.1)E:0.1)R;", ac_bd_alignment());
    assert!(nni_applicable(&cost, &cost.tree().idx("E")));
    assert_eq!(
        evaluate_nni(&cost, &cost.tree().idx("A"), &BranchOptimiserConfig::default()).unwrap(),
        None
    );
}

#[test]
fn identity_scores_at_least_current_tree() {
    let cost = jc69_cost("(A:0.1,B:0.1,(C:0.1,D:0.1)E:0.7)R;", ac_bd_alignment());
    let e = cost.tree().idx("E");
    let evaluations = evaluate_nni(&cost, &e, &BranchOptimiserConfig::default())
        .unwrap()
        .unwrap();
    assert_eq!(evaluations[0].configuration, NniConfiguration::Identity);
    assert!(evaluations[0].logl >= cost.logl() - 1e-9);
}

#[test]
fn evaluation_matches_current_tree_at_fixed_length() {
    let cost = jc69_cost("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)R;", ac_bd_alignment());
    let e = cost.tree().idx("E");
    let config = BranchOptimiserConfig {
        min_blen: 0.5,
        max_blen: 0.5,
        ..Default::default()
    };
    let evaluations = evaluate_nni(&cost, &e, &config).unwrap().unwrap();
    assert_relative_eq!(evaluations[0].logl, cost.logl(), epsilon = 1e-9);
}

#[test]
fn impossible_configurations_score_negative_infinity() {
    let mut cost = jc69_cost(
        "(A:0.0,B:0.0,(C:0.0,D:0.0)E:0.0)R;",
        dna_alignment!(("A", b"A"), ("B", b"C"), ("C", b"A"), ("D", b"A")),
    );
    let e = cost.tree().idx("E");
    let config = BranchOptimiserConfig {
        min_blen: 0.0,
        max_blen: 0.0,
        ..Default::default()
    };

    let evaluations = evaluate_nni(&cost, &e, &config).unwrap().unwrap();
    assert!(evaluations.iter().all(|e| e.logl == f64::NEG_INFINITY));

    let before = cost.tree().clone();
    assert_eq!(optimise_nni(&mut cost, &e, &config).unwrap(), f64::NEG_INFINITY);
    assert_eq!(cost.tree().robinson_foulds(&before), 0);
}

#[test]
fn picks_supported_split_at_root_trifurcation() {
    let mut cost = jc69_cost("(A:0.1,B:0.1,(C:0.1,D:0.1)E:0.1)R;", ac_bd_alignment());
    let e = cost.tree().idx("E");
    let config = BranchOptimiserConfig::default();
    let start = cost.logl();

    let evaluations = evaluate_nni(&cost, &e, &config).unwrap().unwrap();
    let best = best_nni(&evaluations);
    assert_eq!(best.configuration, NniConfiguration::SwapB);
    assert!(best.logl > evaluations[0].logl);
    assert!(best.logl > evaluations[1].logl);

    let logl = optimise_nni(&mut cost, &e, &config).unwrap();
    assert!(logl > start);
    assert_relative_eq!(logl, best.logl, epsilon = 1e-8);
    assert_relative_eq!(cost.tree().blen(&e), best.blen);
    let expected = tree!("(A:0.1,C:0.1,(B:0.1,D:0.1)E:0.1)R;");
    assert_eq!(cost.tree().robinson_foulds(&expected), 0);
}

#[test]
fn rearranges_across_two_child_root() {
    let mut cost = jc69_cost("((A:0.1,B:0.1)E:0.1,(C:0.1,D:0.1)F:0.3)G;", ac_bd_alignment());
    let (e, f) = (cost.tree().idx("E"), cost.tree().idx("F"));
    assert!(nni_applicable(&cost, &e));
    assert!(nni_applicable(&cost, &f));
    let config = BranchOptimiserConfig::default();
    let start = cost.logl();

    let evaluations = evaluate_nni(&cost, &e, &config).unwrap().unwrap();
    assert!(evaluations[0].logl >= start - 1e-9);
    let best = best_nni(&evaluations);
    assert_eq!(best.configuration, NniConfiguration::SwapB);

    let logl = optimise_nni(&mut cost, &e, &config).unwrap();
    assert!(logl > start);
    assert_relative_eq!(logl, best.logl, epsilon = 1e-8);
    let tree = cost.tree();
    assert_relative_eq!(tree.blen(&e) + tree.blen(&f), best.blen, epsilon = 1e-12);
    assert_relative_eq!(tree.blen(&f), 3.0 * tree.blen(&e), epsilon = 1e-12);
    let expected = tree!("((A:0.1,C:0.1)E:0.1,(B:0.1,D:0.1)F:0.1)G;");
    assert_eq!(tree.robinson_foulds(&expected), 0);
}

#[test]
fn sweeps_recover_rooted_quartet() {
    let mut cost = jc69_cost("((A:0.1,B:0.1)E:0.1,(C:0.1,D:0.1)F:0.1)G;", ac_bd_alignment());

    let res = NniOptimiser::new(&mut cost).run().unwrap();

    assert!(res.final_logl > res.initial_logl);
    let expected = tree!("((A:0.1,C:0.1)E:0.1,(B:0.1,D:0.1)F:0.1)G;");
    assert_eq!(cost.tree().robinson_foulds(&expected), 0);
}

#[test]
fn picks_supported_split_below_inner_node() {
    let mut cost = jc69_cost("(((A:0.1,B:0.1)E:0.1,C:0.1)F:0.1,D:0.1)G;", bc_ad_alignment());
    let e = cost.tree().idx("E");
    let config = BranchOptimiserConfig::default();

    let evaluations = evaluate_nni(&cost, &e, &config).unwrap().unwrap();
    let best = best_nni(&evaluations);
    assert_eq!(best.configuration, NniConfiguration::SwapA);

    let logl = optimise_nni(&mut cost, &e, &config).unwrap();
    assert_relative_eq!(logl, best.logl, epsilon = 1e-8);
    let expected = tree!("(((C:0.1,B:0.1)E:0.1,A:0.1)F:0.1,D:0.1)G;");
    assert_eq!(cost.tree().robinson_foulds(&expected), 0);
    assert_eq!(cost.tree().parent(&cost.tree().idx("A")), Some(&cost.tree().idx("F")));
}

#[test]
fn supported_topology_is_kept() {
    let mut cost = jc69_cost("(A:0.1,C:0.1,(B:0.1,D:0.1)E:0.1)R;", ac_bd_alignment());
    let e = cost.tree().idx("E");
    let before = cost.tree().clone();
    let start = cost.logl();

    let logl = optimise_nni(&mut cost, &e, &BranchOptimiserConfig::default()).unwrap();

    assert!(logl >= start);
    assert_eq!(cost.tree().robinson_foulds(&before), 0);
    assert_eq!(cost.tree().children(&e), before.children(&e));
}

#[test]
fn evaluation_is_deterministic() {
    let model = SubstModel::<HKY>::new(&[0.3, 0.2, 0.3, 0.2], &[2.5])
        .unwrap()
        .with_rates(RateCategories::gamma(0.7, 4).unwrap());
    let info = PhyloInfoBuilder::new(
        tree!("(A:0.2,B:0.4,(C:0.1,D:0.3)E:0.05)R;"),
        ac_bd_alignment(),
    )
    .build()
    .unwrap();
    let cost = LikelihoodCostBuilder::new(model, info).build().unwrap();
    let e = cost.tree().idx("E");
    let config = BranchOptimiserConfig::default();

    let first = evaluate_nni(&cost, &e, &config).unwrap();
    let second = evaluate_nni(&cost.clone(), &e, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn leaf_branch_falls_back_to_length_optimisation() {
    let mut cost = jc69_cost("(A:0.1,C:0.1,(B:0.1,D:2.0)E:0.1)R;", ac_bd_alignment());
    let d = cost.tree().idx("D");
    let before = cost.tree().clone();
    let start = cost.logl();

    let logl = optimise_nni(&mut cost, &d, &BranchOptimiserConfig::default()).unwrap();

    assert!(logl > start);
    assert!(cost.tree().blen(&d) < 2.0);
    assert_eq!(cost.tree().robinson_foulds(&before), 0);
}

#[test]
fn sweeps_recover_topology() {
    let info = PhyloInfoBuilder::new(
        tree!("((A:0.1,B:0.1)E:0.1,C:0.1,(D:0.1,X:0.1)F:0.1)R;"),
        dna_alignment!(
            ("A", b"AAAACCCCGGGGTTTTACGTAC"),
            ("B", b"CCCCGGGGTTTTAAAAACGTAC"),
            ("C", b"AAAACCCCGGGGTTTTACGTTT"),
            ("D", b"CCCCGGGGTTTTAAAAACGTAA"),
            ("X", b"CCCCGGGGTTTTAAAAACGTAA"),
        ),
    )
    .build()
    .unwrap();
    let mut cost = LikelihoodCostBuilder::new(SubstModel::<JC69>::new(&[], &[]).unwrap(), info)
        .build()
        .unwrap();

    let res = NniOptimiser::new(&mut cost).run().unwrap();

    assert!(res.final_logl > res.initial_logl);
    let expected = tree!("((A:0.1,C:0.1)E:0.1,B:0.1,(D:0.1,X:0.1)F:0.1)R;");
    assert_eq!(cost.tree().robinson_foulds(&expected), 0);
}
