//! Properties of the projections and penalty proxes.

use nalgebra::{DMatrix, DVector};
use penglm::prelude::*;
use proptest::prelude::*;

const TOL: f64 = 1e-9;

fn col(values: &[f64]) -> DMatrix<f64> {
    DMatrix::from_column_slice(values.len(), 1, values)
}

/// Exhaustive least squares monotone fit over all partitions into consecutive
/// blocks; each block is fit by its mean.
fn brute_force_isotonic(v: &[f64]) -> Vec<f64> {
    let n = v.len();
    let mut best: Option<(f64, Vec<f64>)> = None;
    // bit i set means a block boundary after position i
    for cuts in 0..(1u32 << (n - 1)) {
        let mut fit = Vec::with_capacity(n);
        let mut start = 0;
        for end in 1..=n {
            if end == n || cuts & (1 << (end - 1)) != 0 {
                let mean = v[start..end].iter().sum::<f64>() / (end - start) as f64;
                fit.extend(std::iter::repeat(mean).take(end - start));
                start = end;
            }
        }
        if fit.windows(2).any(|w| w[1] < w[0] - TOL) {
            continue;
        }
        let sse: f64 = fit.iter().zip(v).map(|(f, x)| (f - x).powi(2)).sum();
        if best.as_ref().map_or(true, |(b, _)| sse < *b) {
            best = Some((sse, fit));
        }
    }
    best.map(|(_, fit)| fit).unwrap_or_default()
}

#[test]
fn test_isotonic_known_fits() {
    let fit = isotonic_regression(&[1.0, 3.0, 2.0, 4.0], true);
    assert_eq!(fit, vec![1.0, 2.5, 2.5, 4.0]);

    let fit = isotonic_regression(&[4.0, 1.0, 2.0, 3.0], true);
    for (got, expected) in fit.iter().zip([7.0 / 3.0, 7.0 / 3.0, 7.0 / 3.0, 3.0]) {
        assert!((got - expected).abs() < TOL);
    }

    let fit = isotonic_regression(&[1.0, 3.0, 2.0], false);
    assert_eq!(fit, vec![2.0, 2.0, 2.0]);
}

#[test]
fn test_linear_equality_reuses_pseudo_inverse() {
    let a = DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
    let b = DVector::from_vec(vec![1.0, 2.0]);
    let constraint = LinearEquality::new(a.clone(), b.clone()).unwrap();
    assert!(!constraint.is_cached());

    for x in [col(&[0.0, 0.0, 0.0]), col(&[5.0, -1.0, 2.0])] {
        let projected = constraint.prox(&x, 1.0).unwrap();
        let residual = &a * DVector::from_column_slice(projected.as_slice()) - &b;
        assert!(residual.amax() < 1e-10);
        assert!(constraint.is_cached());
    }
}

#[test]
fn test_penalty_proxes_at_zero_strength_are_identity() {
    let x = DMatrix::from_row_slice(3, 2, &[1.0, -2.0, 0.5, 0.0, -3.0, 4.0]);
    let penalties = [
        PenaltyConfig::lasso(0.0),
        PenaltyConfig::group_lasso(vec![vec![0, 2], vec![1]], 0.0),
        PenaltyConfig::multi_task(0.0),
        PenaltyConfig::nuclear(0.0),
    ];
    for config in penalties {
        let func = penalty_func(&config).unwrap();
        let out = func.prox(&x, 1.0).unwrap();
        assert!(
            (out - &x).amax() < 1e-10,
            "{} prox should be the identity",
            config.kind.name()
        );
    }
}

#[test]
fn test_strong_penalties_zero_everything() {
    let x = DMatrix::from_row_slice(3, 2, &[1.0, -2.0, 0.5, 0.0, -3.0, 4.0]);
    let penalties = [
        PenaltyConfig::lasso(10.0),
        PenaltyConfig::group_lasso(vec![vec![0, 2], vec![1]], 10.0),
        PenaltyConfig::multi_task(10.0),
        PenaltyConfig::nuclear(10.0),
    ];
    for config in penalties {
        let out = penalty_func(&config).unwrap().prox(&x, 1.0).unwrap();
        assert!(out.amax() < 1e-12, "{} prox should vanish", config.kind.name());
    }
}

proptest! {
    #[test]
    fn prop_simplex_projection_is_feasible_and_idempotent(
        v in prop::collection::vec(-10.0f64..10.0, 1..12),
        radius in 0.1f64..5.0,
    ) {
        let p = project_simplex(&v, radius);
        prop_assert!(p.iter().all(|&x| x >= 0.0));
        prop_assert!((p.iter().sum::<f64>() - radius).abs() < 1e-8);

        let again = project_simplex(&p, radius);
        for (a, b) in again.iter().zip(&p) {
            prop_assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn prop_l1_ball_projection(
        v in prop::collection::vec(-10.0f64..10.0, 1..12),
        radius in 0.1f64..5.0,
    ) {
        let p = project_l1_ball(&v, radius);
        let l1: f64 = p.iter().map(|x| x.abs()).sum();
        prop_assert!(l1 <= radius + 1e-8);
        for (out, inp) in p.iter().zip(&v) {
            prop_assert!(out * inp >= 0.0);
            prop_assert!(out.abs() <= inp.abs() + 1e-12);
        }
        if v.iter().map(|x| x.abs()).sum::<f64>() <= radius {
            prop_assert_eq!(&p, &v);
        }
    }

    #[test]
    fn prop_l2_ball_projection(
        v in prop::collection::vec(-10.0f64..10.0, 1..12),
        mult in 0.1f64..5.0,
    ) {
        let x = col(&v);
        let p = L2Ball::new(mult).unwrap().prox(&x, 1.0).unwrap();
        prop_assert!(p.norm() <= mult + 1e-10);
        if x.norm() <= mult {
            prop_assert!((p - x).amax() < 1e-12);
        } else {
            // radial projection keeps the direction
            let cos = p.dot(&x) / (p.norm() * x.norm());
            prop_assert!((cos - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn prop_isotonic_matches_brute_force(v in prop::collection::vec(-5.0f64..5.0, 1..8)) {
        let fit = isotonic_regression(&v, true);
        let expected = brute_force_isotonic(&v);
        prop_assert_eq!(fit.len(), expected.len());
        for (a, b) in fit.iter().zip(&expected) {
            prop_assert!((a - b).abs() < 1e-9, "pava {:?} vs brute force {:?}", fit, expected);
        }
    }

    #[test]
    fn prop_isotonic_decreasing_mirrors_increasing(
        v in prop::collection::vec(-5.0f64..5.0, 1..10),
    ) {
        let down = isotonic_regression(&v, false);
        let negated: Vec<f64> = v.iter().map(|x| -x).collect();
        let up = isotonic_regression(&negated, true);
        for (d, u) in down.iter().zip(&up) {
            prop_assert!((d + u).abs() < 1e-12);
        }
    }

    #[test]
    fn prop_lasso_prox_soft_thresholds(
        v in prop::collection::vec(-10.0f64..10.0, 1..10),
        pen_val in 0.0f64..3.0,
        step in 0.1f64..2.0,
    ) {
        let x = col(&v);
        let func = penalty_func(&PenaltyConfig::lasso(pen_val)).unwrap();
        let out = func.prox(&x, step).unwrap();
        let thresh = pen_val * step;
        for (o, i) in out.iter().zip(&v) {
            let expected = i.signum() * (i.abs() - thresh).max(0.0);
            prop_assert!((o - expected).abs() < 1e-12);
        }
    }
}
