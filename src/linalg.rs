//! Dense linear algebra and scalar helpers shared by the bound, prox and solver modules.

use nalgebra::{DMatrix, DVector};

use crate::error::{GlmError, Result};

/// Empirical quantile with linear interpolation between order statistics.
///
/// Returns `None` for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Derivative of the Huber function: the residual clipped to `[-knot, knot]`.
pub fn huber_deriv(r: f64, knot: f64) -> f64 {
    r.clamp(-knot, knot)
}

/// Subgradient of the tilted L1 (check) function, taking 0 at the kink.
pub fn tilted_l1_deriv(r: f64, quantile: f64) -> f64 {
    if r > 0.0 {
        quantile
    } else if r < 0.0 {
        quantile - 1.0
    } else {
        0.0
    }
}

/// Singular values of a matrix, largest first.
pub fn singular_values(m: &DMatrix<f64>) -> DVector<f64> {
    if m.is_empty() {
        return DVector::zeros(0);
    }
    let mut svals = m.clone().svd(false, false).singular_values;
    svals
        .as_mut_slice()
        .sort_by(|a, b| b.total_cmp(a));
    svals
}

/// Largest singular value of a matrix (zero for an empty matrix).
pub fn leading_sval(m: &DMatrix<f64>) -> f64 {
    singular_values(m).iter().copied().fold(0.0, f64::max)
}

/// Moore-Penrose pseudo-inverse.
pub fn pinv(m: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let eps = f64::EPSILON * (m.nrows().max(m.ncols()) as f64) * m.amax().max(1.0);
    m.clone()
        .pseudo_inverse(eps)
        .map_err(|e| GlmError::NumericalError(format!("pseudo-inverse failed: {}", e)))
}

/// Set entries with magnitude at most `zero_tol` to exactly zero.
pub fn clip_zero(m: &mut DMatrix<f64>, zero_tol: f64) {
    for v in m.iter_mut() {
        if v.abs() <= zero_tol {
            *v = 0.0;
        }
    }
}

/// Stack the columns of a matrix into one vector.
pub fn vec_of(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_column_slice(m.as_slice())
}
