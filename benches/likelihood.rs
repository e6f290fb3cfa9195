use std::hint::black_box;
use std::ops::ControlFlow;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use phylo_ml::alignment::Alignment;
use phylo_ml::likelihood::{LikelihoodCost, LikelihoodCostBuilder};
use phylo_ml::optimisers::{RoundDriver, StoppingCriterion};
use phylo_ml::phylo_info::PhyloInfoBuilder;
use phylo_ml::substitution_models::{RateCategories, SubstModel, HKY};
use phylo_ml::tree::tree_parser::from_newick;

const SIZES: [usize; 3] = [100, 1000, 10000];

/// Caterpillar tree on `n` taxa with random branch lengths.
fn caterpillar(n: usize, rng: &mut StdRng) -> String {
    let mut newick = format!("(t0:{:.3},t1:{:.3})", rng.gen_range(0.01..0.3), rng.gen_range(0.01..0.3));
    for i in 2..n {
        newick = format!("({}:{:.3},t{}:{:.3})", newick, rng.gen_range(0.01..0.3), i, rng.gen_range(0.01..0.3));
    }
    newick + ";"
}

/// Random sequences biased towards the first taxon's so that sites repeat.
fn alignment(n: usize, length: usize, rng: &mut StdRng) -> Alignment {
    let base = (0..length).map(|_| rng.gen_range(0..4u8)).collect::<Vec<_>>();
    let states = (0..n)
        .map(|_| {
            base.iter()
                .map(|&s| if rng.gen_bool(0.2) { rng.gen_range(0..4u8) } else { s })
                .collect()
        })
        .collect();
    let ids = (0..n).map(|i| format!("t{}", i)).collect();
    Alignment::new(ids, states, 4).expect("valid alignment")
}

fn cost(n: usize, length: usize) -> LikelihoodCost<HKY> {
    let mut rng = StdRng::seed_from_u64(42);
    let tree = from_newick(&caterpillar(n, &mut rng))
        .expect("valid newick")
        .pop()
        .expect("one tree");
    let info = PhyloInfoBuilder::new(tree, alignment(n, length, &mut rng))
        .build()
        .expect("valid phylo info");
    let model = SubstModel::<HKY>::new(&[0.3, 0.2, 0.3, 0.2], &[2.0])
        .expect("valid model")
        .with_rates(RateCategories::gamma(0.5, 4).expect("valid gamma"));
    LikelihoodCostBuilder::new(model, info)
        .build()
        .expect("valid cost")
}

fn full_evaluation(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("Full evaluation");
    for length in SIZES {
        let cost = cost(16, length);
        group.bench_with_input(BenchmarkId::from_parameter(length), &cost, |bench, cost| {
            bench.iter(|| {
                let fresh = LikelihoodCostBuilder::new(cost.model().clone(), cost.info().clone())
                    .build()
                    .expect("valid cost");
                black_box(fresh.logl())
            });
        });
    }
    group.finish();
}

fn branch_update(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("Branch update");
    for length in SIZES {
        let mut cost = cost(16, length);
        let leaf = cost.tree().idx("t0");
        cost.logl();
        let mut blen = 0.1;
        group.bench_function(BenchmarkId::from_parameter(length), |bench| {
            bench.iter(|| {
                blen = if blen > 0.2 { 0.1 } else { blen + 0.01 };
                cost.set_blen(&leaf, blen).expect("valid branch length");
                black_box(cost.logl())
            });
        });
    }
    group.finish();
}

fn optimisation_round(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("Optimisation round");
    group.sample_size(10);
    for length in [100, 1000] {
        let cost = cost(8, length);
        group.bench_with_input(BenchmarkId::from_parameter(length), &cost, |bench, cost| {
            bench.iter(|| {
                let criterion = StoppingCriterion::FixedIter(std::num::NonZeroUsize::MIN);
                let res = RoundDriver::new(cost.clone(), criterion)
                    .run(|_| ControlFlow::Continue(()))
                    .expect("optimisation succeeds");
                black_box(res.final_logl)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, full_evaluation, branch_update, optimisation_round);
criterion_main!(benches);
