//! Conic programs in standard form.
//!
//! A program minimizes `(1/2) x' P x + q' x` subject to affine expressions
//! `a' x + c` lying in a product of cones. `stuff` converts the program into the
//! matrices (P, q, A, b) expected by interior-point solvers, using the
//! convention `A x + s = b, s in K`, so each row `a' x + c` becomes
//! `A = -a`, `b = c`.

use std::f64::consts::SQRT_2;
use std::fmt;
use std::ops::Range;

use nalgebra_sparse::CscMatrix;

use crate::sparse::{csc_from_triplets, half_quad_form};

/// A single affine expression `sum_k coef_k x_{var_k} + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AffineRow {
    pub terms: Vec<(usize, f64)>,
    pub constant: f64,
}

impl AffineRow {
    pub fn constant(constant: f64) -> Self {
        AffineRow {
            terms: Vec::new(),
            constant,
        }
    }

    pub fn var(var: usize) -> Self {
        AffineRow::constant(0.0).plus(var, 1.0)
    }

    /// Add `coef * x_var`.
    pub fn plus(mut self, var: usize, coef: f64) -> Self {
        self.terms.push((var, coef));
        self
    }

    /// Add every `(var, coef)` term of an iterator.
    pub fn plus_terms(mut self, terms: impl IntoIterator<Item = (usize, f64)>) -> Self {
        self.terms.extend(terms);
        self
    }

    pub fn offset(mut self, constant: f64) -> Self {
        self.constant += constant;
        self
    }

    /// Multiply every term and the constant by `factor`.
    pub fn scaled(mut self, factor: f64) -> Self {
        for (_, coef) in &mut self.terms {
            *coef *= factor;
        }
        self.constant *= factor;
        self
    }

    pub fn eval(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coef)| coef * x[var])
            .sum::<f64>()
            + self.constant
    }
}

/// Cone kinds supported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cone {
    /// `s = 0` (equalities), with the given dimension.
    Zero(usize),
    /// `s >= 0`, with the given dimension.
    NonNeg(usize),
    /// `s_0 >= ||s_1..||_2`, with the given dimension.
    SecondOrder(usize),
    /// `{(x, y, z) : y > 0, y exp(x / y) <= z}` closure, dimension 3.
    Exponential,
    /// Positive semidefinite `n x n` matrices, stored as the packed upper
    /// triangle with off-diagonal entries scaled by `sqrt(2)`.
    PsdTriangle(usize),
}

impl Cone {
    pub fn dim(&self) -> usize {
        match *self {
            Cone::Zero(d) | Cone::NonNeg(d) | Cone::SecondOrder(d) => d,
            Cone::Exponential => 3,
            Cone::PsdTriangle(n) => n * (n + 1) / 2,
        }
    }
}

/// A conic program under construction.
#[derive(Debug, Clone, Default)]
pub struct ConicProgram {
    n_vars: usize,
    /// Upper-triangular entries of P.
    quad: Vec<(usize, usize, f64)>,
    linear: Vec<f64>,
    cones: Vec<Cone>,
    rows: Vec<AffineRow>,
}

impl ConicProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `n` new variables and return their index range.
    pub fn add_vars(&mut self, n: usize) -> Range<usize> {
        let start = self.n_vars;
        self.n_vars += n;
        self.linear.resize(self.n_vars, 0.0);
        start..self.n_vars
    }

    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cones(&self) -> &[Cone] {
        &self.cones
    }

    /// Add `(1/2) coef x_var^2` to the objective.
    pub fn add_square(&mut self, var: usize, coef: f64) {
        self.quad.push((var, var, coef));
    }

    /// Add `coef x_var` to the objective.
    pub fn add_linear(&mut self, var: usize, coef: f64) {
        self.linear[var] += coef;
    }

    pub fn linear(&self) -> &[f64] {
        &self.linear
    }

    pub fn push_zero(&mut self, rows: Vec<AffineRow>) {
        self.push_block(Cone::Zero(rows.len()), rows);
    }

    pub fn push_nonneg(&mut self, rows: Vec<AffineRow>) {
        self.push_block(Cone::NonNeg(rows.len()), rows);
    }

    /// `rows[0] >= ||rows[1..]||_2`.
    pub fn push_soc(&mut self, rows: Vec<AffineRow>) {
        self.push_block(Cone::SecondOrder(rows.len()), rows);
    }

    /// `(x, y, z)` in the exponential cone, i.e. `z >= y exp(x / y)`.
    pub fn push_exp(&mut self, x: AffineRow, y: AffineRow, z: AffineRow) {
        self.push_block(Cone::Exponential, vec![x, y, z]);
    }

    /// The symmetric `n x n` matrix with upper entries `entry(i, j)`, `i <= j`,
    /// is positive semidefinite.
    ///
    /// Rows run over the upper triangle column by column.
    pub fn push_psd(&mut self, n: usize, mut entry: impl FnMut(usize, usize) -> AffineRow) {
        let mut rows = Vec::with_capacity(n * (n + 1) / 2);
        for j in 0..n {
            for i in 0..=j {
                let row = entry(i, j);
                rows.push(if i == j { row } else { row.scaled(SQRT_2) });
            }
        }
        self.push_block(Cone::PsdTriangle(n), rows);
    }

    fn push_block(&mut self, cone: Cone, rows: Vec<AffineRow>) {
        if rows.is_empty() {
            return;
        }
        self.cones.push(cone);
        self.rows.extend(rows);
    }

    /// Build the solver matrices.
    pub fn stuff(&self) -> StuffedProblem {
        let n = self.n_vars;
        let m = self.rows.len();

        let p = csc_from_triplets(
            n,
            n,
            self.quad
                .iter()
                .map(|&(i, j, v)| if i <= j { (i, j, v) } else { (j, i, v) }),
        );

        let mut b = Vec::with_capacity(m);
        let mut triplets = Vec::new();
        for (r, row) in self.rows.iter().enumerate() {
            for &(var, coef) in &row.terms {
                triplets.push((r, var, -coef));
            }
            b.push(row.constant);
        }
        let a = csc_from_triplets(m, n, triplets);

        StuffedProblem {
            p,
            q: self.linear.clone(),
            a,
            b,
            cones: self.cones.clone(),
        }
    }
}

/// Program matrices ready for a conic solver.
#[derive(Debug, Clone)]
pub struct StuffedProblem {
    /// Quadratic cost matrix P (n x n, upper triangle).
    pub p: CscMatrix<f64>,
    /// Linear cost vector q (n).
    pub q: Vec<f64>,
    /// Constraint matrix A (m x n).
    pub a: CscMatrix<f64>,
    /// Constraint vector b (m).
    pub b: Vec<f64>,
    /// Cones in row order.
    pub cones: Vec<Cone>,
}

impl StuffedProblem {
    /// Objective value `(1/2) x' P x + q' x` for the linear cost `q`.
    pub fn objective(&self, q: &[f64], x: &[f64]) -> f64 {
        let linear: f64 = q.iter().zip(x).map(|(qi, xi)| qi * xi).sum();
        linear + half_quad_form(&self.p, x)
    }
}

/// Solution status from the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Solved to reduced accuracy.
    AlmostOptimal,
    /// Problem is infeasible.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// Maximum iterations reached.
    MaxIterations,
    /// Time limit reached.
    MaxTime,
    /// Numerical difficulties.
    NumericalError,
    /// Unknown status.
    Unknown,
}

impl SolveStatus {
    /// Whether the primal iterate can be used as a solution.
    pub fn is_solved(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::AlmostOptimal)
    }

    /// Whether the solver stopped with a primal iterate worth returning.
    ///
    /// Infeasibility and unboundedness certificates carry no coefficient.
    pub fn has_iterate(self) -> bool {
        !matches!(self, SolveStatus::Infeasible | SolveStatus::Unbounded)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::AlmostOptimal => "optimal_inaccurate",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::MaxIterations => "max_iterations",
            SolveStatus::MaxTime => "max_time",
            SolveStatus::NumericalError => "numerical_error",
            SolveStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Raw result of one conic solve.
#[derive(Debug, Clone)]
pub struct ConicSolution {
    pub status: SolveStatus,
    /// Primal variables.
    pub x: Vec<f64>,
    /// Dual variables, one per constraint row.
    pub z: Vec<f64>,
    /// Solver-reported time in seconds.
    pub solve_time: f64,
    pub iterations: u32,
}
