//! Path-top penalty bounds.
//!
//! The top of a regularization path is the smallest penalty strength at which
//! every penalized coefficient is exactly zero. It is derived from the gradient
//! of the unpenalized loss at zero:
//! - `grad_at_zero` - per-loss closed form gradient at the null model
//! - `lasso_max`, `l1_to_l2_max`, `group_lasso_max`, `nuclear_norm_max` - bounds

pub mod bounds;
pub mod grad_zero;

pub use bounds::{
    default_group_weights, group_lasso_max, l1_to_l2_max, lasso_max, nuclear_norm_max,
    penalty_max,
};
pub use grad_zero::grad_at_zero;
