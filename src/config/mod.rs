//! Configuration types for losses, penalties and constraints.
//!
//! Every model variant is described by explicit, fully declared structs:
//! - `LossSpec` - the loss family and its typed parameters
//! - `PenaltyConfig` - penalty flavor, structure, strength and weights
//! - `ConstraintConfig` - an optional convex feasible set for the coefficient

pub mod constraint;
pub mod loss;
pub mod penalty;

pub use constraint::ConstraintConfig;
pub use loss::{LossKind, LossSpec};
pub use penalty::{
    check_weight_values, effective_weight, is_penalized, penalized_mask, PenaltyConfig,
    PenaltyFlavor, PenaltyKind, PenaltyUpdate,
};
