//! Penalty configuration.

use nalgebra::DMatrix;

use crate::error::{GlmError, Result};

/// Structural flavor of a penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PenaltyFlavor {
    /// A convex penalty.
    #[default]
    Convex,
    /// A non-convex penalty (e.g. SCAD, MCP).
    NonConvex,
    /// A sum of convex and non-convex terms.
    Mixed,
}

impl PenaltyFlavor {
    pub fn is_convex(self) -> bool {
        matches!(self, PenaltyFlavor::Convex)
    }
}

/// Penalty structure.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PenaltyKind {
    /// No penalty.
    #[default]
    None,
    /// Entrywise L1 norm.
    Lasso,
    /// Sum of Euclidean norms over disjoint feature groups.
    GroupLasso {
        /// Feature indices of each group.
        groups: Vec<Vec<usize>>,
    },
    /// Multi-response L1-to-L2: sum over features of the row Euclidean norm.
    MultiTask,
    /// Nuclear norm of the coefficient matrix.
    Nuclear,
}

impl PenaltyKind {
    pub fn name(&self) -> &'static str {
        match self {
            PenaltyKind::None => "none",
            PenaltyKind::Lasso => "lasso",
            PenaltyKind::GroupLasso { .. } => "group_lasso",
            PenaltyKind::MultiTask => "multi_task",
            PenaltyKind::Nuclear => "nuclear",
        }
    }
}

/// A penalty configuration.
///
/// Weight shapes by structure:
/// - `Lasso`: like the coefficient (n_features x n_responses)
/// - `GroupLasso`: one entry per group
/// - `MultiTask`: one entry per feature
/// - `Nuclear`: one entry per singular value, largest first
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyConfig {
    pub flavor: PenaltyFlavor,
    pub kind: PenaltyKind,
    /// Penalty strength.
    pub pen_val: f64,
    /// Optional penalty weights; `None` means every entry has weight one.
    pub weights: Option<DMatrix<f64>>,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        PenaltyConfig::none()
    }
}

impl PenaltyConfig {
    pub fn new(kind: PenaltyKind, pen_val: f64) -> Self {
        PenaltyConfig {
            flavor: PenaltyFlavor::Convex,
            kind,
            pen_val,
            weights: None,
        }
    }

    pub fn none() -> Self {
        PenaltyConfig::new(PenaltyKind::None, 0.0)
    }

    pub fn lasso(pen_val: f64) -> Self {
        PenaltyConfig::new(PenaltyKind::Lasso, pen_val)
    }

    pub fn group_lasso(groups: Vec<Vec<usize>>, pen_val: f64) -> Self {
        PenaltyConfig::new(PenaltyKind::GroupLasso { groups }, pen_val)
    }

    pub fn multi_task(pen_val: f64) -> Self {
        PenaltyConfig::new(PenaltyKind::MultiTask, pen_val)
    }

    pub fn nuclear(pen_val: f64) -> Self {
        PenaltyConfig::new(PenaltyKind::Nuclear, pen_val)
    }

    /// Attach penalty weights.
    pub fn with_weights(mut self, weights: DMatrix<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Attach weights given as a vector (one per feature, group or singular value).
    pub fn with_weight_vec(self, weights: &[f64]) -> Self {
        self.with_weights(DMatrix::from_column_slice(weights.len(), 1, weights))
    }

    pub fn with_flavor(mut self, flavor: PenaltyFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Apply a parameter update in place.
    pub fn set_params(&mut self, update: &PenaltyUpdate) -> Result<()> {
        if let Some(pen_val) = update.pen_val {
            if !(pen_val >= 0.0 && pen_val.is_finite()) {
                return Err(GlmError::InvalidConfig(format!(
                    "penalty value must be finite and nonnegative, got {}",
                    pen_val
                )));
            }
            self.pen_val = pen_val;
        }
        if let Some(weights) = &update.weights {
            if let Some(current) = &self.weights {
                if current.shape() != weights.shape() {
                    return Err(GlmError::shape(
                        format!("{:?}", current.shape()),
                        format!("{:?}", weights.shape()),
                    ));
                }
            }
            check_weight_values(weights)?;
            self.weights = Some(weights.clone());
        }
        Ok(())
    }

    /// Weight of entry `idx` (column-major); one when no weights are set.
    pub fn weight(&self, idx: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[idx])
    }
}

/// A change to penalty parameters between path points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PenaltyUpdate {
    pub pen_val: Option<f64>,
    pub weights: Option<DMatrix<f64>>,
}

impl PenaltyUpdate {
    pub fn pen_val(pen_val: f64) -> Self {
        PenaltyUpdate {
            pen_val: Some(pen_val),
            weights: None,
        }
    }

    pub fn with_weights(mut self, weights: DMatrix<f64>) -> Self {
        self.weights = Some(weights);
        self
    }
}

/// Whether a single weight marks its entry as penalized.
///
/// A weight is penalized iff it is not NaN and its magnitude exceeds machine epsilon.
pub fn is_penalized(w: f64) -> bool {
    !w.is_nan() && w.abs() > f64::EPSILON
}

/// The weight an entry actually carries: zero for unpenalized entries.
pub fn effective_weight(w: f64) -> f64 {
    if is_penalized(w) {
        w
    } else {
        0.0
    }
}

/// Reject negative or infinite weights. NaN is allowed and means unpenalized.
pub fn check_weight_values(weights: &DMatrix<f64>) -> Result<()> {
    match weights.iter().find(|&&w| w < 0.0 || w.is_infinite()) {
        Some(w) => Err(GlmError::InvalidConfig(format!(
            "penalty weights must be finite and nonnegative, got {}",
            w
        ))),
        None => Ok(()),
    }
}

/// Penalized mask of a weight matrix, in column-major order.
pub fn penalized_mask(weights: &DMatrix<f64>) -> Vec<bool> {
    weights.iter().map(|&w| is_penalized(w)).collect()
}
