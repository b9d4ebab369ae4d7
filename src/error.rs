//! Error types for penglm.

use thiserror::Error;

/// Error type for penglm operations.
#[derive(Debug, Error)]
pub enum GlmError {
    /// Loss name is not one of the supported families.
    #[error("Unsupported loss: {0}")]
    UnsupportedLoss(String),

    /// A loss-specific argument (e.g. the Huber knot) was not supplied.
    #[error("Loss '{loss}' requires argument '{arg}'")]
    MissingArgument { loss: String, arg: String },

    /// An optional external dependency is not compiled in.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// Solver invoked on a loss/penalty/constraint combination it cannot handle.
    #[error("Solver not applicable: {0}")]
    NotApplicable(String),

    /// Shape mismatch.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    /// A bound computation with nothing to bound.
    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid problem definition or call order.
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Numerical error.
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// The external solver finished without a usable solution.
    #[error("Solver failed with status {status}")]
    SolverFailed { status: String },
}

impl GlmError {
    pub(crate) fn shape(expected: impl Into<String>, got: impl Into<String>) -> Self {
        GlmError::DimensionMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// Result type for penglm operations.
pub type Result<T> = std::result::Result<T, GlmError>;
