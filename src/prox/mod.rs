//! Proximal operators.
//!
//! Penalties and constraints share one capability, [`Func`]:
//! - `eval` - the function value (always 0 for constraints)
//! - `prox` - `argmin_z f(z) + ||z - x||^2 / (2 step)`; for constraints this is
//!   the Euclidean projection onto the feasible set and `step` is ignored
//! - `is_smooth` / `is_proximable` - capability flags for first-order solvers

pub mod constraint;
pub mod penalty;

use nalgebra::DMatrix;

use crate::config::{ConstraintConfig, PenaltyConfig, PenaltyKind};
use crate::error::{GlmError, Result};

pub use constraint::{
    isotonic_regression, project_l1_ball, project_simplex, Isotonic, L1Ball, L2Ball,
    LinearEquality, Positive, Simplex,
};
pub use penalty::{GroupLasso, Lasso, MultiTaskL1ToL2, NoPenalty, NuclearNorm};

/// A penalty or constraint term with a proximal operator.
pub trait Func {
    /// Function value at `x`.
    fn eval(&self, x: &DMatrix<f64>) -> Result<f64>;

    /// Proximal operator at `x` with step size `step > 0`.
    fn prox(&self, x: &DMatrix<f64>, step: f64) -> Result<DMatrix<f64>>;

    /// Whether the function is differentiable, i.e. a gradient rather than a prox
    /// defines its behavior.
    fn is_smooth(&self) -> bool;

    /// Whether `prox` is available in closed form.
    fn is_proximable(&self) -> bool {
        true
    }
}

/// Build the penalty function described by a configuration.
pub fn penalty_func(config: &PenaltyConfig) -> Result<Box<dyn Func>> {
    if !config.flavor.is_convex() {
        return Err(GlmError::NotApplicable(format!(
            "no proximal operator for a {:?} penalty",
            config.flavor
        )));
    }
    let weights = config.weights.clone();
    let func: Box<dyn Func> = match &config.kind {
        PenaltyKind::None => Box::new(NoPenalty),
        PenaltyKind::Lasso => Box::new(Lasso::new(config.pen_val, weights)),
        PenaltyKind::GroupLasso { groups } => {
            Box::new(GroupLasso::new(config.pen_val, groups.clone(), weights))
        }
        PenaltyKind::MultiTask => Box::new(MultiTaskL1ToL2::new(config.pen_val, weights)),
        PenaltyKind::Nuclear => Box::new(NuclearNorm::new(config.pen_val, weights)),
    };
    Ok(func)
}

/// Build the constraint function described by a configuration.
///
/// Returns `None` for an unconstrained problem.
pub fn constraint_func(config: &ConstraintConfig) -> Result<Option<Box<dyn Func>>> {
    let func: Box<dyn Func> = match config {
        ConstraintConfig::None => return Ok(None),
        ConstraintConfig::Positive => Box::new(Positive),
        ConstraintConfig::LinearEquality { a, b } => {
            Box::new(LinearEquality::new(a.clone(), b.clone())?)
        }
        ConstraintConfig::Simplex { radius } => Box::new(Simplex::new(*radius)?),
        ConstraintConfig::L1Ball { mult } => Box::new(L1Ball::new(*mult)?),
        ConstraintConfig::L2Ball { mult } => Box::new(L2Ball::new(*mult)?),
        ConstraintConfig::Isotonic { increasing } => Box::new(Isotonic::new(*increasing)),
    };
    Ok(Some(func))
}

pub(crate) fn check_step(step: f64) -> Result<()> {
    if step > 0.0 && step.is_finite() {
        Ok(())
    } else {
        Err(GlmError::InvalidConfig(format!(
            "prox step must be positive and finite, got {}",
            step
        )))
    }
}
