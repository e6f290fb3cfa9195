use approx::assert_relative_eq;
use rstest::*;

use crate::optimisers::UnivariateMinimiser;

#[rstest]
#[case::inside(0.5, 2.0)]
#[case::at_minimum(2.0, 2.0)]
#[case::far(4.9, 2.0)]
fn quadratic_minimum(#[case] start: f64, #[case] expected: f64) {
    let res = UnivariateMinimiser::new(0.0, 5.0)
        .minimise(|x| (x - 2.0).powi(2) + 1.0, start)
        .unwrap();
    assert_relative_eq!(res.value, expected, epsilon = 1e-4);
    assert_relative_eq!(res.final_cost, 1.0, epsilon = 1e-8);
}

#[test]
fn minimum_at_boundary() {
    let res = UnivariateMinimiser::new(0.0, 5.0)
        .with_tolerance(1e-8)
        .minimise(|x| x, 3.0)
        .unwrap();
    assert!(res.value < 1e-3);
    assert!(res.final_cost <= 3.0);
}

#[test]
fn non_finite_objective_keeps_start() {
    let res = UnivariateMinimiser::new(0.0, 1.0)
        .minimise(|_| f64::NAN, 0.3)
        .unwrap();
    assert_eq!(res.value, 0.3);
    assert_eq!(res.final_cost, f64::INFINITY);

    let res = UnivariateMinimiser::new(1.0, 1.0)
        .minimise(|_| f64::INFINITY, 1.0)
        .unwrap();
    assert_eq!(res.final_cost, f64::INFINITY);
}

#[test]
fn never_worse_than_start() {
    let f = |x: f64| (20.0 * x).sin() + x;
    for start in [0.1, 0.5, 0.9, 1.7] {
        let res = UnivariateMinimiser::new(0.0, 2.0).minimise(f, start).unwrap();
        assert!(res.final_cost <= f(start));
    }
}

#[test]
fn start_outside_bounds_is_clamped() {
    let res = UnivariateMinimiser::new(1.0, 3.0)
        .minimise(|_| 0.0, 7.0)
        .unwrap();
    assert_eq!(res.value, 3.0);
    assert_eq!(res.final_cost, 0.0);
}

#[test]
fn empty_interval_returns_start() {
    let res = UnivariateMinimiser::new(1.0, 1.0)
        .minimise(|x| x * x, 1.0)
        .unwrap();
    assert_eq!(res.value, 1.0);
    assert_eq!(res.final_cost, 1.0);
}
