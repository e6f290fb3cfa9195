use rstest::*;

use crate::alphabets::UNKNOWN;
use crate::patterns::PatternInfo;

const X: u8 = UNKNOWN;

#[test]
fn leaf_patterns_one_per_state() {
    let info = PatternInfo::leaf(&[2, 2, 0, X, 2, X, 3]);
    assert_eq!(info.len(), 4);
    assert_eq!(info.site_patterns, vec![0, 0, 1, 2, 0, 2, 3]);
    assert_eq!(info.weights, vec![3, 1, 2, 1]);
    assert_eq!(info.leaf_state(1), 0);
    assert!(info.is_unknown(2));
    assert!(!info.is_unknown(0));
    assert_eq!(info.total_sites(), 7);
}

#[test]
fn build_merges_co_occurring_pairs() {
    let left = PatternInfo::leaf(&[0, 0, 1, 1, 0]);
    let right = PatternInfo::leaf(&[2, 2, 2, 3, 2]);
    let mut info = PatternInfo::default();
    let count = info.build(&left, &right, 5);
    assert_eq!(count, 3);
    assert_eq!(info.site_patterns, vec![0, 0, 1, 2, 0]);
    assert_eq!(info.weights, vec![3, 1, 1]);
    assert_eq!(info.left, vec![0, 1, 1]);
    assert_eq!(info.right, vec![0, 0, 1]);
}

#[test]
fn build_reuses_existing_info() {
    let left = PatternInfo::leaf(&[0, 1, 2]);
    let right = PatternInfo::leaf(&[0, 1, 2]);
    let mut info = PatternInfo::merge(&left, &right);
    assert_eq!(info.len(), 3);
    let constant = PatternInfo::leaf(&[1, 1, 1]);
    assert_eq!(info.build(&constant, &constant, 3), 1);
    assert_eq!(info.weights, vec![3]);
    assert_eq!(info.site_patterns, vec![0, 0, 0]);
}

#[rstest]
#[case::constant(&[0, 0, 0, 0], &[1, 1, 1, 1], 1)]
#[case::all_distinct(&[0, 1, 2, 3], &[0, 0, 0, 0], 4)]
#[case::unknowns(&[X, X, 0, 0], &[1, X, 1, X], 4)]
#[case::empty(&[], &[], 0)]
fn merged_weights_sum_to_sites(#[case] a: &[u8], #[case] b: &[u8], #[case] expected: usize) {
    let info = PatternInfo::merge(&PatternInfo::leaf(a), &PatternInfo::leaf(b));
    assert_eq!(info.len(), expected);
    assert_eq!(info.weights.iter().sum::<usize>(), a.len());
    assert!(info.len() <= a.len());
}

#[test]
fn merge_all_three_inputs() {
    let a = PatternInfo::leaf(&[0, 0, 1, 1, 0, 0]);
    let b = PatternInfo::leaf(&[2, 2, 2, 2, 3, 2]);
    let c = PatternInfo::leaf(&[1, 1, 1, 1, 1, 0]);
    let (info, sources) = PatternInfo::merge_all(&[&a, &b, &c]);
    assert_eq!(info.len(), 4);
    assert_eq!(info.weights, vec![2, 2, 1, 1]);
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0], vec![0, 1, 0, 0]);
    assert_eq!(sources[1], vec![0, 0, 1, 0]);
    assert_eq!(sources[2], vec![0, 0, 0, 1]);
    assert_eq!(info.left, sources[0]);
    assert_eq!(info.right, sources[1]);
    for (site, &pattern) in info.site_patterns.iter().enumerate() {
        assert_eq!(sources[0][pattern], a.site_patterns[site]);
        assert_eq!(sources[1][pattern], b.site_patterns[site]);
        assert_eq!(sources[2][pattern], c.site_patterns[site]);
    }
}

#[test]
fn merge_all_single_input_keeps_patterns() {
    let a = PatternInfo::leaf(&[3, 0, 3, X]);
    let (info, sources) = PatternInfo::merge_all(&[&a]);
    assert_eq!(info.site_patterns, a.site_patterns);
    assert_eq!(info.weights, a.weights);
    assert_eq!(sources, vec![vec![0, 1, 2]]);
}

#[test]
fn merge_all_equals_nested_build() {
    let a = PatternInfo::leaf(&[0, 1, 0, 1, 2, 0, 1]);
    let b = PatternInfo::leaf(&[0, 0, 0, 1, 2, 0, 3]);
    let (all, _) = PatternInfo::merge_all(&[&a, &b]);
    let pair = PatternInfo::merge(&a, &b);
    assert_eq!(all, pair);
}
