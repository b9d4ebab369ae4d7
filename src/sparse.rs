//! Sparse matrix utilities.
//!
//! Helper functions for assembling the nalgebra-sparse matrices of a conic program.

use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Create a CSC matrix from triplets (row, col, value).
///
/// Duplicates are summed together; out-of-range triplets are dropped.
pub fn csc_from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: impl IntoIterator<Item = (usize, usize, f64)>,
) -> CscMatrix<f64> {
    let mut coo = CooMatrix::new(nrows, ncols);
    for (row, col, val) in triplets {
        if row < nrows && col < ncols {
            coo.push(row, col, val);
        }
    }
    CscMatrix::from(&coo)
}

/// Evaluate `(1/2) x' P x` for a matrix storing only its upper triangle.
pub fn half_quad_form(p: &CscMatrix<f64>, x: &[f64]) -> f64 {
    let mut total = 0.0;
    for (row, col, val) in p.triplet_iter() {
        if row == col {
            total += 0.5 * *val * x[row] * x[col];
        } else {
            // upper triangle stored once
            total += *val * x[row] * x[col];
        }
    }
    total
}

/// Matrix-vector product `A x`.
pub fn csc_mul_vec(a: &CscMatrix<f64>, x: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.nrows()];
    for (row, col, val) in a.triplet_iter() {
        out[row] += *val * x[col];
    }
    out
}
