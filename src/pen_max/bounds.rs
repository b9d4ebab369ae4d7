//! Path-top bounds for the lasso, group lasso, multi-response L1-to-L2 and
//! nuclear norm penalties.
//!
//! Each bound is the smallest penalty strength at which the penalized solution
//! is zero on every penalized coordinate. Entries whose weight is zero or NaN are
//! unpenalized and do not take part in the maximum.

use nalgebra::DMatrix;

use super::grad_zero::grad_at_zero;
use crate::config::{check_weight_values, is_penalized, LossSpec, PenaltyConfig, PenaltyKind};
use crate::error::{GlmError, Result};
use crate::linalg::leading_sval;

/// Lasso path-top bound: `max_j |g_j| / w_j` over penalized coordinates.
///
/// If `y` has several columns but the loss is not natively multi-response, each
/// response is treated as its own problem (using the matching weight column) and
/// the largest per-response bound is returned.
pub fn lasso_max(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    fit_intercept: bool,
    loss: &LossSpec,
    weights: Option<&DMatrix<f64>>,
) -> Result<f64> {
    if y.ncols() > 1 && !loss.multi_response {
        if let Some(w) = weights {
            check_weight_shape(w, (x.ncols(), y.ncols()))?;
        }

        let mut best = f64::NEG_INFINITY;
        for c in 0..y.ncols() {
            let y_c = y.columns(c, 1).into_owned();
            let w_c = weights.map(|w| w.columns(c, 1).into_owned());
            best = best.max(lasso_max(x, &y_c, fit_intercept, loss, w_c.as_ref())?);
        }
        return Ok(best);
    }

    let grad = grad_at_zero(x, y, fit_intercept, loss)?;
    if let Some(w) = weights {
        check_weight_shape(w, grad.shape())?;
    }

    let bound = weighted_max(
        grad.iter().enumerate().map(|(i, g)| (g.abs(), weight_at(weights, i))),
        "lasso",
    )?;
    log::debug!("lasso_max for {}: {:.6e}", loss, bound);
    Ok(bound)
}

/// Multi-response L1-to-L2 bound: `max_j ||g_j,:||_2 / w_j` over penalized rows.
///
/// `weights` holds one entry per feature.
pub fn l1_to_l2_max(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    fit_intercept: bool,
    loss: &LossSpec,
    weights: Option<&DMatrix<f64>>,
) -> Result<f64> {
    require_multi_response(loss, "L1-to-L2")?;
    let grad = grad_at_zero(x, y, fit_intercept, loss)?;
    if let Some(w) = weights {
        check_weight_len(w, grad.nrows(), "one weight per feature")?;
    }

    let row_norms = grad.row_iter().map(|row| row.norm());
    weighted_max(
        row_norms
            .enumerate()
            .map(|(j, norm)| (norm, weight_at(weights, j))),
        "L1-to-L2",
    )
}

/// Group lasso bound: `max_g ||g_G||_2 / w_g` over penalized groups.
///
/// Gradient rows (all responses) belonging to each group are pooled. Missing
/// weights default to `sqrt(group size)`.
pub fn group_lasso_max(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    groups: &[Vec<usize>],
    fit_intercept: bool,
    loss: &LossSpec,
    weights: Option<&DMatrix<f64>>,
) -> Result<f64> {
    let grad = grad_at_zero(x, y, fit_intercept, loss)?;
    check_groups(groups, grad.nrows())?;

    let weights = match weights {
        Some(w) => {
            check_weight_len(w, groups.len(), "one weight per group")?;
            w.clone()
        }
        None => default_group_weights(groups),
    };

    let group_norms = groups.iter().map(|idxs| {
        idxs.iter()
            .map(|&j| grad.row(j).norm_squared())
            .sum::<f64>()
            .sqrt()
    });
    weighted_max(
        group_norms
            .enumerate()
            .map(|(g, norm)| (norm, weights[g])),
        "group lasso",
    )
}

/// Nuclear norm bound: leading singular value of the gradient over the smallest
/// penalized weight.
///
/// With weights, this is exact only when the largest singular value carries the
/// smallest weight. Otherwise it is still a valid upper bound, possibly a
/// conservative one.
pub fn nuclear_norm_max(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    fit_intercept: bool,
    loss: &LossSpec,
    weights: Option<&DMatrix<f64>>,
) -> Result<f64> {
    require_multi_response(loss, "nuclear norm")?;
    let grad = grad_at_zero(x, y, fit_intercept, loss)?;
    let sval_max = leading_sval(&grad);

    let Some(w) = weights else {
        return Ok(sval_max);
    };
    check_weight_len(w, grad.nrows().min(grad.ncols()), "one weight per singular value")?;

    let smallest = w
        .iter()
        .copied()
        .filter(|&w| is_penalized(w))
        .fold(f64::INFINITY, f64::min);
    if !smallest.is_finite() {
        return Err(GlmError::NumericalDegeneracy(
            "nuclear norm bound has no penalized singular directions".into(),
        ));
    }
    Ok(sval_max / smallest)
}

/// Path-top bound for a penalty configuration, using its structure and weights.
pub fn penalty_max(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    fit_intercept: bool,
    loss: &LossSpec,
    penalty: &PenaltyConfig,
) -> Result<f64> {
    let weights = penalty.weights.as_ref();
    match &penalty.kind {
        PenaltyKind::None => Err(GlmError::InvalidConfig(
            "no penalty, so there is no path-top bound".into(),
        )),
        PenaltyKind::Lasso => lasso_max(x, y, fit_intercept, loss, weights),
        PenaltyKind::GroupLasso { groups } => {
            group_lasso_max(x, y, groups, fit_intercept, loss, weights)
        }
        PenaltyKind::MultiTask => l1_to_l2_max(x, y, fit_intercept, loss, weights),
        PenaltyKind::Nuclear => nuclear_norm_max(x, y, fit_intercept, loss, weights),
    }
}

/// Default group lasso weights: square root of each group's size.
pub fn default_group_weights(groups: &[Vec<usize>]) -> DMatrix<f64> {
    DMatrix::from_iterator(
        groups.len(),
        1,
        groups.iter().map(|g| (g.len() as f64).sqrt()),
    )
}

/// Max of `value / weight` over penalized pairs.
fn weighted_max(pairs: impl Iterator<Item = (f64, f64)>, what: &str) -> Result<f64> {
    let mut best: Option<f64> = None;
    for (value, w) in pairs {
        if is_penalized(w) {
            let ratio = value / w;
            best = Some(best.map_or(ratio, |b| b.max(ratio)));
        }
    }
    best.ok_or_else(|| {
        GlmError::NumericalDegeneracy(format!("{} bound has no penalized coordinates", what))
    })
}

fn weight_at(weights: Option<&DMatrix<f64>>, idx: usize) -> f64 {
    weights.map_or(1.0, |w| w[idx])
}

fn require_multi_response(loss: &LossSpec, penalty: &str) -> Result<()> {
    if loss.multi_response {
        Ok(())
    } else {
        Err(GlmError::InvalidConfig(format!(
            "{} bound requires a multi-response loss, got {}",
            penalty, loss
        )))
    }
}

fn check_weight_shape(w: &DMatrix<f64>, expected: (usize, usize)) -> Result<()> {
    if w.shape() == expected {
        check_weight_values(w)
    } else {
        Err(GlmError::shape(
            format!("weights of shape {:?}", expected),
            format!("{:?}", w.shape()),
        ))
    }
}

fn check_weight_len(w: &DMatrix<f64>, expected: usize, what: &str) -> Result<()> {
    if w.len() == expected {
        check_weight_values(w)
    } else {
        Err(GlmError::shape(
            format!("{} ({})", what, expected),
            format!("{} weights", w.len()),
        ))
    }
}

pub(crate) fn check_groups(groups: &[Vec<usize>], n_features: usize) -> Result<()> {
    let mut seen = vec![false; n_features];
    for &j in groups.iter().flatten() {
        if j >= n_features {
            return Err(GlmError::shape(
                format!("group indices below {}", n_features),
                format!("index {}", j),
            ));
        }
        if std::mem::replace(&mut seen[j], true) {
            return Err(GlmError::InvalidConfig(format!(
                "feature {} appears in more than one group",
                j
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// X = n I, y chosen so that the linear regression gradient at zero
    /// (without intercept) is exactly `-target`.
    fn with_gradient(target: &[f64]) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = target.len();
        let x = DMatrix::identity(n, n) * (n as f64);
        let y = DMatrix::from_column_slice(n, 1, target);
        (x, y)
    }

    #[test]
    fn test_lasso_max_masks_unpenalized() {
        let (x, y) = with_gradient(&[5.0, 100.0, 3.0]);
        let w = DMatrix::from_column_slice(3, 1, &[1.0, 0.0, 1.0]);
        let bound = lasso_max(&x, &y, false, &LossSpec::lin_reg(), Some(&w)).unwrap();
        assert!((bound - 5.0).abs() < 1e-12, "got {}", bound);
    }

    #[test]
    fn test_lasso_max_weighted() {
        let (x, y) = with_gradient(&[2.0, -4.0]);
        let loss = LossSpec::lin_reg();
        let ones = DMatrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let w = DMatrix::from_column_slice(2, 1, &[1.0, 2.0]);
        assert!((lasso_max(&x, &y, false, &loss, Some(&ones)).unwrap() - 4.0).abs() < 1e-12);
        assert!((lasso_max(&x, &y, false, &loss, Some(&w)).unwrap() - 2.0).abs() < 1e-12);
        assert!((lasso_max(&x, &y, false, &loss, None).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_lasso_max_all_unpenalized() {
        let (x, y) = with_gradient(&[2.0, -4.0]);
        let w = DMatrix::from_column_slice(2, 1, &[0.0, f64::NAN]);
        let err = lasso_max(&x, &y, false, &LossSpec::lin_reg(), Some(&w)).unwrap_err();
        assert!(matches!(err, GlmError::NumericalDegeneracy(_)));
    }

    #[test]
    fn test_lasso_max_per_response() {
        let x = DMatrix::identity(2, 2) * 2.0;
        let y = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, -3.0, 0.25]);
        let bound = lasso_max(&x, &y, false, &LossSpec::lin_reg(), None).unwrap();
        assert!((bound - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_l1_to_l2_max() {
        let x = DMatrix::identity(2, 2) * 2.0;
        let y = DMatrix::from_row_slice(2, 2, &[3.0, 4.0, 1.0, 0.0]);
        let loss = LossSpec::lin_reg_mr();
        let bound = l1_to_l2_max(&x, &y, false, &loss, None).unwrap();
        assert!((bound - 5.0).abs() < 1e-12);

        let w = DMatrix::from_column_slice(2, 1, &[10.0, 1.0]);
        let bound = l1_to_l2_max(&x, &y, false, &loss, Some(&w)).unwrap();
        assert!((bound - 1.0).abs() < 1e-12);

        let err = l1_to_l2_max(&x, &y, false, &LossSpec::lin_reg(), None).unwrap_err();
        assert!(matches!(err, GlmError::InvalidConfig(_)));
    }

    #[test]
    fn test_group_lasso_max() {
        let (x, y) = with_gradient(&[3.0, 4.0, 1.0]);
        let groups = vec![vec![0, 1], vec![2]];
        let loss = LossSpec::lin_reg();

        let w = DMatrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let bound = group_lasso_max(&x, &y, &groups, false, &loss, Some(&w)).unwrap();
        assert!((bound - 5.0).abs() < 1e-12);

        let bound = group_lasso_max(&x, &y, &groups, false, &loss, None).unwrap();
        assert!((bound - 5.0 / 2f64.sqrt()).abs() < 1e-12);

        let bad = vec![vec![0, 5]];
        assert!(group_lasso_max(&x, &y, &bad, false, &loss, None).is_err());
    }

    #[test]
    fn test_nuclear_norm_max() {
        let x = DMatrix::identity(2, 2) * 2.0;
        let y = DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, 1.0]);
        let loss = LossSpec::lin_reg_mr();
        let bound = nuclear_norm_max(&x, &y, false, &loss, None).unwrap();
        assert!((bound - 3.0).abs() < 1e-10);

        let w = DMatrix::from_column_slice(2, 1, &[2.0, 0.0]);
        let bound = nuclear_norm_max(&x, &y, false, &loss, Some(&w)).unwrap();
        assert!((bound - 1.5).abs() < 1e-10);

        let none = DMatrix::from_column_slice(2, 1, &[0.0, 0.0]);
        assert!(matches!(
            nuclear_norm_max(&x, &y, false, &loss, Some(&none)),
            Err(GlmError::NumericalDegeneracy(_))
        ));

        let three = DMatrix::from_element(3, 1, 1.0);
        assert!(matches!(
            nuclear_norm_max(&x, &y, false, &loss, Some(&three)),
            Err(GlmError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_negative_or_infinite_weights_rejected() {
        let (x, y) = with_gradient(&[2.0, -4.0]);
        let loss = LossSpec::lin_reg();
        for bad in [-1.0, f64::INFINITY] {
            let w = DMatrix::from_column_slice(2, 1, &[1.0, bad]);
            assert!(matches!(
                lasso_max(&x, &y, false, &loss, Some(&w)),
                Err(GlmError::InvalidConfig(_))
            ));
        }
        let groups = vec![vec![0], vec![1]];
        let w = DMatrix::from_column_slice(2, 1, &[-2.0, 1.0]);
        assert!(group_lasso_max(&x, &y, &groups, false, &loss, Some(&w)).is_err());
    }

    #[test]
    fn test_penalty_max_dispatch() {
        let (x, y) = with_gradient(&[2.0, -4.0]);
        let loss = LossSpec::lin_reg();
        let penalty = PenaltyConfig::lasso(1.0).with_weight_vec(&[1.0, 2.0]);
        assert!((penalty_max(&x, &y, false, &loss, &penalty).unwrap() - 2.0).abs() < 1e-12);
        assert!(penalty_max(&x, &y, false, &loss, &PenaltyConfig::none()).is_err());
    }
}
