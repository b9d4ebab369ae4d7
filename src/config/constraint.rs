//! Constraint configuration.

use nalgebra::{DMatrix, DVector};

/// A convex feasible set for the coefficient.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConstraintConfig {
    /// Unconstrained.
    #[default]
    None,
    /// Elementwise nonnegativity.
    Positive,
    /// `A vec(coef) = b`, with `vec` stacking columns.
    LinearEquality { a: DMatrix<f64>, b: DVector<f64> },
    /// Nonnegative entries summing to `radius`.
    Simplex { radius: f64 },
    /// `||coef||_1 <= mult`.
    L1Ball { mult: f64 },
    /// `||coef||_2 <= mult`.
    L2Ball { mult: f64 },
    /// Monotone coefficient vector.
    Isotonic { increasing: bool },
}

impl ConstraintConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintConfig::None => "none",
            ConstraintConfig::Positive => "positive",
            ConstraintConfig::LinearEquality { .. } => "linear_equality",
            ConstraintConfig::Simplex { .. } => "simplex",
            ConstraintConfig::L1Ball { .. } => "l1_ball",
            ConstraintConfig::L2Ball { .. } => "l2_ball",
            ConstraintConfig::Isotonic { .. } => "isotonic",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ConstraintConfig::None)
    }
}
