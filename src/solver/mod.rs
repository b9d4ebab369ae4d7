//! Solver backends for penalized GLMs.
//!
//! This module provides:
//! - The `GlmSolver` contract: capability check, one-time setup, penalty
//!   updates along a path and warm-started solves
//! - A registry of available backends selected by capability matching
//! - `ConvexSolver`, which compiles the whole problem into one conic program
//!   solved by Clarabel (feature `clarabel`)

#[cfg(feature = "clarabel")]
pub mod clarabel;
pub mod convex;
pub mod program;

use nalgebra::{DMatrix, DVector};

use crate::config::{ConstraintConfig, LossSpec, PenaltyConfig, PenaltyUpdate};
use crate::error::Result;

pub use convex::ConvexSolver;
pub use program::{AffineRow, Cone, ConicProgram, ConicSolution, SolveStatus, StuffedProblem};

/// Solver settings.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Print solver output.
    pub verbose: bool,
    /// Maximum iterations.
    pub max_iter: u32,
    /// Time limit in seconds.
    pub time_limit: f64,
    /// Absolute tolerance.
    pub tol_gap_abs: f64,
    /// Relative tolerance.
    pub tol_gap_rel: f64,
    /// Coefficients with magnitude at most this are set to exactly zero.
    pub zero_tol: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            verbose: false,
            max_iter: 200,
            time_limit: f64::INFINITY,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            zero_tol: 1e-8,
        }
    }
}

/// The loss, penalty and constraint of one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct GlmProblem {
    pub loss: LossSpec,
    pub penalty: PenaltyConfig,
    pub constraint: ConstraintConfig,
    pub fit_intercept: bool,
}

impl GlmProblem {
    /// An unpenalized, unconstrained problem with an intercept.
    pub fn new(loss: LossSpec) -> Self {
        GlmProblem {
            loss,
            penalty: PenaltyConfig::none(),
            constraint: ConstraintConfig::None,
            fit_intercept: true,
        }
    }

    pub fn penalty(mut self, penalty: PenaltyConfig) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn constraint(mut self, constraint: ConstraintConfig) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }
}

/// Initial values for a solve.
#[derive(Debug, Clone, Default)]
pub struct WarmStart {
    /// n_features x n_responses.
    pub coef: Option<DMatrix<f64>>,
    /// One entry per response.
    pub intercept: Option<DVector<f64>>,
    /// Solver-specific state from a previous solve.
    pub other: Option<AuxState>,
}

impl WarmStart {
    /// Start from a previous solution.
    pub fn from_output(output: &SolverOutput, aux: Option<AuxState>) -> Self {
        WarmStart {
            coef: Some(output.coef.clone()),
            intercept: output.intercept.clone(),
            other: aux,
        }
    }
}

/// Fitted coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    /// n_features x n_responses.
    pub coef: DMatrix<f64>,
    /// One entry per response when an intercept is fit.
    pub intercept: Option<DVector<f64>>,
}

/// Solver-opaque state carried between solves.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxState {
    /// Full primal vector, including auxiliary variables.
    pub primal: Vec<f64>,
    /// Dual variables, one per constraint row.
    pub duals: Vec<f64>,
}

/// Diagnostics of one solve.
#[derive(Debug, Clone)]
pub struct SolveInfo {
    pub status: SolveStatus,
    /// Wall-clock runtime in seconds.
    pub runtime: f64,
    /// Solver-reported time in seconds.
    pub solver_time: f64,
    pub iterations: u32,
    /// Objective value (average loss plus penalty).
    pub objective: Option<f64>,
}

/// Output of `GlmSolver::solve`.
pub type SolveResult = (SolverOutput, Option<AuxState>, SolveInfo);

/// A solver backend for penalized GLMs.
///
/// Calls against one instance must be serialized; the backend mutates its state
/// in place and provides no locking.
pub trait GlmSolver {
    fn name(&self) -> &'static str;

    /// Whether this backend can solve the given combination.
    ///
    /// A missing optional dependency yields `false`, never an error.
    fn is_applicable(
        &self,
        loss: &LossSpec,
        penalty: &PenaltyConfig,
        constraint: &ConstraintConfig,
    ) -> bool;

    /// Build the solver state for one `(X, y, problem)`.
    fn setup(
        &mut self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        sample_weight: Option<&DVector<f64>>,
        problem: &GlmProblem,
    ) -> Result<()>;

    /// Change penalty strength and/or weights without rebuilding the problem.
    fn update_penalty(&mut self, update: &PenaltyUpdate) -> Result<()>;

    /// Solve from the given initial values.
    fn solve(&mut self, init: &WarmStart) -> Result<SolveResult>;
}

/// All backends compiled into this build.
pub fn backends() -> Vec<Box<dyn GlmSolver>> {
    vec![Box::new(ConvexSolver::default())]
}

/// First backend applicable to the combination, if any.
pub fn select_solver(
    loss: &LossSpec,
    penalty: &PenaltyConfig,
    constraint: &ConstraintConfig,
) -> Option<Box<dyn GlmSolver>> {
    backends()
        .into_iter()
        .find(|solver| solver.is_applicable(loss, penalty, constraint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PenaltyFlavor;

    #[test]
    fn test_default_settings() {
        let settings = SolverSettings::default();
        assert!(!settings.verbose);
        assert_eq!(settings.max_iter, 200);
        assert!(settings.zero_tol > 0.0);
    }

    #[test]
    fn test_select_solver_rejects_nonconvex() {
        let penalty = PenaltyConfig::lasso(1.0).with_flavor(PenaltyFlavor::NonConvex);
        let selected = select_solver(&LossSpec::lin_reg(), &penalty, &ConstraintConfig::None);
        assert!(selected.is_none());
    }

    #[cfg(feature = "clarabel")]
    #[test]
    fn test_select_solver_finds_convex_backend() {
        let selected = select_solver(
            &LossSpec::lin_reg(),
            &PenaltyConfig::lasso(1.0),
            &ConstraintConfig::Positive,
        );
        assert_eq!(selected.map(|s| s.name()), Some("convex"));
    }
}
