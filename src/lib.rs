//! # penglm
//!
//! Numerical core for penalized generalized linear models.
//!
//! penglm covers the parts of fitting sparse GLMs that need care: where a
//! regularization path starts, how penalties and constraints are applied
//! through proximal operators, and how a whole penalized problem is handed to
//! an external conic solver and re-solved along a path.
//!
//! ## Quick Start
//!
//! ```ignore
//! use penglm::prelude::*;
//!
//! // Top of the lasso path
//! let lambda_max = lasso_max(&x, &y, true, &LossSpec::lin_reg(), None)?;
//!
//! // Solve along the path with one compiled program
//! let problem = GlmProblem::new(LossSpec::lin_reg())
//!     .penalty(PenaltyConfig::lasso(lambda_max));
//! let mut solver = select_solver(&problem.loss, &problem.penalty, &problem.constraint)
//!     .ok_or(GlmError::NotApplicable("no backend".into()))?;
//! solver.setup(&x, &y, None, &problem)?;
//! let mut init = WarmStart::default();
//! for pen_val in [lambda_max, 0.5 * lambda_max, 0.1 * lambda_max] {
//!     solver.update_penalty(&PenaltyUpdate::pen_val(pen_val))?;
//!     let (output, aux, info) = solver.solve(&init)?;
//!     println!("{}: {} in {:.3}s", pen_val, info.status, info.runtime);
//!     init = WarmStart::from_output(&output, aux);
//! }
//! ```
//!
//! ## Losses
//!
//! `lin_reg`, `huber_reg`, `log_reg`, `multinomial`, `poisson`, `quantile`, plus
//! the multi-response forms `lin_reg_mr`, `huber_reg_mr`, `poisson_mr`.
//!
//! ## Penalty structures
//!
//! - Lasso, group lasso, multi-response L1-to-L2, nuclear norm
//! - Optional weights; zero or NaN weights leave an entry unpenalized
//!
//! ## Constraints
//!
//! Nonnegativity, linear equality, simplex, L1 ball, L2 ball, isotonic.
//!
//! ## Architecture
//!
//! - **pen_max**: gradient at zero and path-top bounds
//! - **prox**: the `Func` capability with projections and penalty proxes
//! - **solver**: backend contract, registry and the Clarabel-backed convex solver

pub mod config;
pub mod error;
pub mod linalg;
pub mod pen_max;
pub mod prox;
pub mod solver;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use penglm::prelude::*;
/// ```
pub mod prelude {
    // Configuration
    pub use crate::config::{
        is_penalized, penalized_mask, ConstraintConfig, LossKind, LossSpec, PenaltyConfig,
        PenaltyFlavor, PenaltyKind, PenaltyUpdate,
    };

    // Path-top bounds
    pub use crate::pen_max::{
        default_group_weights, grad_at_zero, group_lasso_max, l1_to_l2_max, lasso_max,
        nuclear_norm_max, penalty_max,
    };

    // Proximal operators
    pub use crate::prox::{
        constraint_func, isotonic_regression, penalty_func, project_l1_ball, project_simplex,
        Func, GroupLasso, Isotonic, L1Ball, L2Ball, Lasso, LinearEquality, MultiTaskL1ToL2,
        NoPenalty, NuclearNorm, Positive, Simplex,
    };

    // Solvers
    pub use crate::solver::{
        backends, select_solver, AuxState, ConvexSolver, GlmProblem, GlmSolver, SolveInfo,
        SolveStatus, SolverOutput, SolverSettings, WarmStart,
    };

    // Errors
    pub use crate::error::{GlmError, Result};
}

// Re-export main types at crate root
pub use error::{GlmError, Result};
pub use solver::{GlmProblem, GlmSolver, SolveStatus};
