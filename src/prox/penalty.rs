//! Proximal operators of the convex sparsity penalties.
//!
//! Unlike constraints, penalty proxes scale the penalty by `step`: the
//! threshold applied to each entry, row, group or singular value is
//! `step * pen_val * weight`.

use nalgebra::{DMatrix, DVector};

use super::{check_step, Func};
use crate::config::{check_weight_values, effective_weight};
use crate::error::{GlmError, Result};
use crate::linalg::singular_values;
use crate::pen_max::bounds::check_groups;
use crate::pen_max::default_group_weights;

/// Weight of entry `idx`; zero or NaN weights leave the entry unpenalized.
fn weight(weights: Option<&DMatrix<f64>>, idx: usize) -> f64 {
    weights.map_or(1.0, |w| effective_weight(w[idx]))
}

fn check_weights(weights: Option<&DMatrix<f64>>, expected: usize, what: &str) -> Result<()> {
    let Some(w) = weights else {
        return Ok(());
    };
    if w.len() != expected {
        return Err(GlmError::shape(
            format!("{} {} weights", expected, what),
            format!("{}", w.len()),
        ));
    }
    check_weight_values(w)
}

/// Shrink a block with Euclidean norm `norm` toward zero by `thresh`.
fn block_scale(norm: f64, thresh: f64) -> f64 {
    if norm <= thresh {
        0.0
    } else {
        1.0 - thresh / norm
    }
}

/// The zero function.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPenalty;

impl Func for NoPenalty {
    fn eval(&self, _x: &DMatrix<f64>) -> Result<f64> {
        Ok(0.0)
    }

    fn prox(&self, x: &DMatrix<f64>, step: f64) -> Result<DMatrix<f64>> {
        check_step(step)?;
        Ok(x.clone())
    }

    fn is_smooth(&self) -> bool {
        true
    }
}

/// Weighted L1 norm `pen_val * sum_j w_j |x_j|`.
#[derive(Debug, Clone)]
pub struct Lasso {
    pub pen_val: f64,
    /// One weight per entry, in column-major order.
    pub weights: Option<DMatrix<f64>>,
}

impl Lasso {
    pub fn new(pen_val: f64, weights: Option<DMatrix<f64>>) -> Self {
        Lasso { pen_val, weights }
    }
}

impl Func for Lasso {
    fn eval(&self, x: &DMatrix<f64>) -> Result<f64> {
        check_weights(self.weights.as_ref(), x.len(), "entry")?;
        let total: f64 = x
            .iter()
            .enumerate()
            .map(|(i, v)| weight(self.weights.as_ref(), i) * v.abs())
            .sum();
        Ok(self.pen_val * total)
    }

    fn prox(&self, x: &DMatrix<f64>, step: f64) -> Result<DMatrix<f64>> {
        check_step(step)?;
        check_weights(self.weights.as_ref(), x.len(), "entry")?;
        let mut out = x.clone();
        for (i, v) in out.iter_mut().enumerate() {
            let thresh = step * self.pen_val * weight(self.weights.as_ref(), i);
            *v = v.signum() * (v.abs() - thresh).max(0.0);
        }
        Ok(out)
    }

    fn is_smooth(&self) -> bool {
        false
    }
}

/// Group lasso `pen_val * sum_g w_g ||x_g||_2`, with groups of rows.
///
/// Weights default to the square root of each group's size.
#[derive(Debug, Clone)]
pub struct GroupLasso {
    pub pen_val: f64,
    pub groups: Vec<Vec<usize>>,
    pub weights: DMatrix<f64>,
}

impl GroupLasso {
    pub fn new(pen_val: f64, groups: Vec<Vec<usize>>, weights: Option<DMatrix<f64>>) -> Self {
        let weights = weights.unwrap_or_else(|| default_group_weights(&groups));
        GroupLasso {
            pen_val,
            groups,
            weights,
        }
    }

    fn group_norm(x: &DMatrix<f64>, idxs: &[usize]) -> f64 {
        idxs.iter()
            .map(|&j| x.row(j).norm_squared())
            .sum::<f64>()
            .sqrt()
    }

    fn check(&self, x: &DMatrix<f64>) -> Result<()> {
        check_groups(&self.groups, x.nrows())?;
        check_weights(Some(&self.weights), self.groups.len(), "group")
    }
}

impl Func for GroupLasso {
    fn eval(&self, x: &DMatrix<f64>) -> Result<f64> {
        self.check(x)?;
        let total: f64 = self
            .groups
            .iter()
            .zip(self.weights.iter())
            .map(|(idxs, &w)| effective_weight(w) * Self::group_norm(x, idxs))
            .sum();
        Ok(self.pen_val * total)
    }

    fn prox(&self, x: &DMatrix<f64>, step: f64) -> Result<DMatrix<f64>> {
        check_step(step)?;
        self.check(x)?;
        let mut out = x.clone();
        for (idxs, &w) in self.groups.iter().zip(self.weights.iter()) {
            let thresh = step * self.pen_val * effective_weight(w);
            let scale = block_scale(Self::group_norm(x, idxs), thresh);
            for &j in idxs {
                out.row_mut(j).scale_mut(scale);
            }
        }
        Ok(out)
    }

    fn is_smooth(&self) -> bool {
        false
    }
}

/// Multi-response L1-to-L2 norm `pen_val * sum_j w_j ||x_j,:||_2`.
#[derive(Debug, Clone)]
pub struct MultiTaskL1ToL2 {
    pub pen_val: f64,
    /// One weight per row (feature).
    pub weights: Option<DMatrix<f64>>,
}

impl MultiTaskL1ToL2 {
    pub fn new(pen_val: f64, weights: Option<DMatrix<f64>>) -> Self {
        MultiTaskL1ToL2 { pen_val, weights }
    }
}

impl Func for MultiTaskL1ToL2 {
    fn eval(&self, x: &DMatrix<f64>) -> Result<f64> {
        check_weights(self.weights.as_ref(), x.nrows(), "row")?;
        let total: f64 = x
            .row_iter()
            .enumerate()
            .map(|(j, row)| weight(self.weights.as_ref(), j) * row.norm())
            .sum();
        Ok(self.pen_val * total)
    }

    fn prox(&self, x: &DMatrix<f64>, step: f64) -> Result<DMatrix<f64>> {
        check_step(step)?;
        check_weights(self.weights.as_ref(), x.nrows(), "row")?;
        let mut out = x.clone();
        for j in 0..x.nrows() {
            let thresh = step * self.pen_val * weight(self.weights.as_ref(), j);
            let scale = block_scale(x.row(j).norm(), thresh);
            out.row_mut(j).scale_mut(scale);
        }
        Ok(out)
    }

    fn is_smooth(&self) -> bool {
        false
    }
}

/// Weighted nuclear norm `pen_val * sum_k w_k sigma_k`, singular values largest
/// first.
///
/// The prox soft-thresholds singular values, which is exact when the weights are
/// nondecreasing along the singular values.
#[derive(Debug, Clone)]
pub struct NuclearNorm {
    pub pen_val: f64,
    pub weights: Option<DMatrix<f64>>,
}

impl NuclearNorm {
    pub fn new(pen_val: f64, weights: Option<DMatrix<f64>>) -> Self {
        NuclearNorm { pen_val, weights }
    }
}

impl Func for NuclearNorm {
    fn eval(&self, x: &DMatrix<f64>) -> Result<f64> {
        let svals = singular_values(x);
        check_weights(self.weights.as_ref(), svals.len(), "singular value")?;
        let total: f64 = svals
            .iter()
            .enumerate()
            .map(|(k, s)| weight(self.weights.as_ref(), k) * s)
            .sum();
        Ok(self.pen_val * total)
    }

    fn prox(&self, x: &DMatrix<f64>, step: f64) -> Result<DMatrix<f64>> {
        check_step(step)?;
        if x.is_empty() {
            return Ok(x.clone());
        }
        let svd = x.clone().svd(true, true);
        check_weights(self.weights.as_ref(), svd.singular_values.len(), "singular value")?;

        // pair each singular value with its rank so weights follow the sorted order
        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
        let mut shrunk = DVector::zeros(order.len());
        for (rank, &k) in order.iter().enumerate() {
            let thresh = step * self.pen_val * weight(self.weights.as_ref(), rank);
            shrunk[k] = (svd.singular_values[k] - thresh).max(0.0);
        }

        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(GlmError::NumericalError(
                "SVD did not return singular vectors".into(),
            ));
        };
        Ok(u * DMatrix::from_diagonal(&shrunk) * v_t)
    }

    fn is_smooth(&self) -> bool {
        false
    }
}
