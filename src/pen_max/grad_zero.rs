//! Gradient of the unpenalized average loss at coefficient zero.
//!
//! When an intercept is fit it takes its loss-optimal null value, so the
//! gradient measures how much each feature can improve on the null model.

use nalgebra::{DMatrix, DVector};

use crate::config::{LossKind, LossSpec};
use crate::error::{GlmError, Result};
use crate::linalg::{huber_deriv, quantile, tilted_l1_deriv};

/// Gradient of the average loss at `coef = 0`.
///
/// `y` has one column per response (a single response is an n x 1 column; the
/// multinomial response is an indicator matrix). The result is
/// n_features x n_responses. Every loss decomposes over response columns, so
/// multi-response inputs are handled by stacking the single-response gradient
/// column-wise; the multinomial null model couples columns only through the
/// class count.
pub fn grad_at_zero(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    fit_intercept: bool,
    loss: &LossSpec,
) -> Result<DMatrix<f64>> {
    check_xy(x, y)?;
    loss.validate()?;

    let n_samples = x.nrows() as f64;
    let n_responses = y.ncols();
    let mut grad = DMatrix::zeros(x.ncols(), n_responses);

    for (c, y_col) in y.column_iter().enumerate() {
        let y_col: DVector<f64> = y_col.into_owned();
        // Negative loss derivative in the linear predictor at the null model.
        let score = null_score(&y_col, fit_intercept, loss.kind, n_responses)?;
        let g = -(x.transpose() * score) / n_samples;
        grad.set_column(c, &g);
    }

    Ok(grad)
}

/// `-d loss_i / d z_i` at the null prediction for one response column.
fn null_score(
    y: &DVector<f64>,
    fit_intercept: bool,
    kind: LossKind,
    n_responses: usize,
) -> Result<DVector<f64>> {
    let mean = y.mean();
    let score = match kind {
        LossKind::LinReg => {
            let pred = if fit_intercept { mean } else { 0.0 };
            y.map(|v| v - pred)
        }
        LossKind::Huber { knot } => {
            let pred = if fit_intercept { mean } else { 0.0 };
            y.map(|v| huber_deriv(v - pred, knot))
        }
        LossKind::LogReg => {
            let prob = if fit_intercept { mean } else { 0.5 };
            y.map(|v| v - prob)
        }
        LossKind::Multinomial => {
            let prob = if fit_intercept {
                mean
            } else {
                1.0 / n_responses as f64
            };
            y.map(|v| v - prob)
        }
        LossKind::Poisson => {
            // exp(0) = 1 without an intercept
            let rate = if fit_intercept { mean } else { 1.0 };
            y.map(|v| v - rate)
        }
        LossKind::Quantile { quantile: q } => {
            let pred = if fit_intercept {
                quantile(y.as_slice(), q)
                    .ok_or_else(|| GlmError::shape("at least one sample", "0 samples"))?
            } else {
                0.0
            };
            y.map(|v| tilted_l1_deriv(v - pred, q))
        }
    };
    Ok(score)
}

pub(crate) fn check_xy(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<()> {
    if x.nrows() != y.nrows() {
        return Err(GlmError::shape(
            format!("y with {} rows", x.nrows()),
            format!("y with {} rows", y.nrows()),
        ));
    }
    if x.nrows() == 0 {
        return Err(GlmError::shape("at least one sample", "0 samples"));
    }
    if y.ncols() == 0 {
        return Err(GlmError::shape("at least one response", "0 responses"));
    }
    Ok(())
}
