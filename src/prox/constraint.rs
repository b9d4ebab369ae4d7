//! Projections onto convex feasible sets.
//!
//! Constraints are indicator functions: they evaluate to 0 on the feasible set
//! and their prox is the Euclidean projection, independent of the step size.

use std::cell::OnceCell;

use nalgebra::{DMatrix, DVector};

use super::Func;
use crate::error::{GlmError, Result};
use crate::linalg::{pinv, vec_of};

/// Implements the parts of `Func` shared by every constraint.
macro_rules! constraint_flags {
    () => {
        fn eval(&self, _x: &DMatrix<f64>) -> Result<f64> {
            Ok(0.0)
        }

        fn is_smooth(&self) -> bool {
            false
        }
    };
}

fn positive_param(value: f64, what: &str) -> Result<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(GlmError::InvalidConfig(format!(
            "{} must be positive and finite, got {}",
            what, value
        )))
    }
}

/// Nonnegative orthant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Positive;

impl Func for Positive {
    constraint_flags!();

    fn prox(&self, x: &DMatrix<f64>, _step: f64) -> Result<DMatrix<f64>> {
        Ok(x.map(|v| v.max(0.0)))
    }
}

/// Affine set `{x : A vec(x) = b}`.
///
/// The pseudo-inverse of `A` is computed on the first projection and cached.
/// The cache is a `OnceCell`, so the type is `!Sync` and a shared instance cannot
/// be projected from several threads at once.
#[derive(Debug, Clone)]
pub struct LinearEquality {
    a: DMatrix<f64>,
    b: DVector<f64>,
    pinv_a: OnceCell<DMatrix<f64>>,
}

impl LinearEquality {
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Result<Self> {
        if a.nrows() != b.len() {
            return Err(GlmError::shape(
                format!("b of length {}", a.nrows()),
                format!("length {}", b.len()),
            ));
        }
        Ok(LinearEquality {
            a,
            b,
            pinv_a: OnceCell::new(),
        })
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    /// Moore-Penrose pseudo-inverse of `A`, computed once.
    pub fn pinv_a(&self) -> Result<&DMatrix<f64>> {
        if self.pinv_a.get().is_none() {
            let computed = pinv(&self.a)?;
            let _ = self.pinv_a.set(computed);
        }
        self.pinv_a
            .get()
            .ok_or_else(|| GlmError::NumericalError("pseudo-inverse cache is empty".into()))
    }

    /// Whether the pseudo-inverse has been computed yet.
    pub fn is_cached(&self) -> bool {
        self.pinv_a.get().is_some()
    }
}

impl Func for LinearEquality {
    constraint_flags!();

    fn prox(&self, x: &DMatrix<f64>, _step: f64) -> Result<DMatrix<f64>> {
        if x.len() != self.a.ncols() {
            return Err(GlmError::shape(
                format!("{} coefficients", self.a.ncols()),
                format!("{}", x.len()),
            ));
        }
        let v = vec_of(x);
        let residual = &self.a * &v - &self.b;
        let projected = v - self.pinv_a()? * residual;
        Ok(DMatrix::from_column_slice(
            x.nrows(),
            x.ncols(),
            projected.as_slice(),
        ))
    }
}

/// Scaled probability simplex `{x >= 0, sum(x) = radius}`.
#[derive(Debug, Clone, Copy)]
pub struct Simplex {
    radius: f64,
}

impl Simplex {
    pub fn new(radius: f64) -> Result<Self> {
        Ok(Simplex {
            radius: positive_param(radius, "simplex radius")?,
        })
    }
}

impl Func for Simplex {
    constraint_flags!();

    fn prox(&self, x: &DMatrix<f64>, _step: f64) -> Result<DMatrix<f64>> {
        let p = project_simplex(x.as_slice(), self.radius);
        Ok(DMatrix::from_column_slice(x.nrows(), x.ncols(), &p))
    }
}

/// L1 ball `{||x||_1 <= mult}`.
#[derive(Debug, Clone, Copy)]
pub struct L1Ball {
    mult: f64,
}

impl L1Ball {
    pub fn new(mult: f64) -> Result<Self> {
        Ok(L1Ball {
            mult: positive_param(mult, "L1 ball radius")?,
        })
    }
}

impl Func for L1Ball {
    constraint_flags!();

    fn prox(&self, x: &DMatrix<f64>, _step: f64) -> Result<DMatrix<f64>> {
        let p = project_l1_ball(x.as_slice(), self.mult);
        Ok(DMatrix::from_column_slice(x.nrows(), x.ncols(), &p))
    }
}

/// L2 ball `{||x||_2 <= mult}`.
#[derive(Debug, Clone, Copy)]
pub struct L2Ball {
    mult: f64,
}

impl L2Ball {
    pub fn new(mult: f64) -> Result<Self> {
        Ok(L2Ball {
            mult: positive_param(mult, "L2 ball radius")?,
        })
    }
}

impl Func for L2Ball {
    constraint_flags!();

    fn prox(&self, x: &DMatrix<f64>, _step: f64) -> Result<DMatrix<f64>> {
        Ok(x / (x.norm() / self.mult).max(1.0))
    }
}

/// Monotone cone: `x_1 <= ... <= x_n`, or `x_1 >= ... >= x_n` when decreasing.
#[derive(Debug, Clone, Copy)]
pub struct Isotonic {
    increasing: bool,
}

impl Isotonic {
    pub fn new(increasing: bool) -> Self {
        Isotonic { increasing }
    }
}

impl Func for Isotonic {
    constraint_flags!();

    fn prox(&self, x: &DMatrix<f64>, _step: f64) -> Result<DMatrix<f64>> {
        if x.nrows() != 1 && x.ncols() != 1 {
            return Err(GlmError::shape(
                "a vector",
                format!("a {}x{} matrix", x.nrows(), x.ncols()),
            ));
        }
        let p = isotonic_regression(x.as_slice(), self.increasing);
        Ok(DMatrix::from_column_slice(x.nrows(), x.ncols(), &p))
    }
}

/// Euclidean projection of `v` onto `{w >= 0, sum(w) = z}`.
///
/// Sorts in decreasing order, finds the largest `k` with
/// `u_k - (sum_{i<=k} u_i - z) / k > 0`, and thresholds at that level.
pub fn project_simplex(v: &[f64], z: f64) -> Vec<f64> {
    if v.is_empty() {
        return Vec::new();
    }
    let mut u = v.to_vec();
    u.sort_by(|a, b| b.total_cmp(a));

    let mut cumsum = 0.0;
    let mut theta = 0.0;
    for (k, &u_k) in u.iter().enumerate() {
        cumsum += u_k;
        let candidate = (cumsum - z) / (k + 1) as f64;
        if u_k - candidate > 0.0 {
            theta = candidate;
        }
    }

    v.iter().map(|&x| (x - theta).max(0.0)).collect()
}

/// Euclidean projection of `v` onto `{||w||_1 <= z}`.
pub fn project_l1_ball(v: &[f64], z: f64) -> Vec<f64> {
    let l1: f64 = v.iter().map(|x| x.abs()).sum();
    if l1 <= z {
        return v.to_vec();
    }
    let abs: Vec<f64> = v.iter().map(|x| x.abs()).collect();
    project_simplex(&abs, z)
        .into_iter()
        .zip(v)
        .map(|(p, &x)| p * x.signum())
        .collect()
}

/// Least squares monotone fit by pool adjacent violators.
pub fn isotonic_regression(v: &[f64], increasing: bool) -> Vec<f64> {
    let sign = if increasing { 1.0 } else { -1.0 };

    // (sum, count) per block
    let mut blocks: Vec<(f64, usize)> = Vec::with_capacity(v.len());
    for &x in v {
        blocks.push((sign * x, 1));
        while let [.., (prev_sum, prev_n), (last_sum, last_n)] = blocks[..] {
            if last_sum / last_n as f64 >= prev_sum / prev_n as f64 {
                break;
            }
            blocks.truncate(blocks.len() - 2);
            blocks.push((prev_sum + last_sum, prev_n + last_n));
        }
    }

    blocks
        .into_iter()
        .flat_map(|(sum, n)| std::iter::repeat(sign * sum / n as f64).take(n))
        .collect()
}
