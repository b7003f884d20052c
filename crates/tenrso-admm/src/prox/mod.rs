//! Single-block proximal operators
//!
//! Each operator acts on one row or one factor matrix and carries no state
//! between calls. Hard constraints (box, L2 ball, simplex, non-negativity,
//! unimodality) are exact projections and ignore the magnitude of ρ.

pub mod box_constraint;
pub mod generalized_l2;
pub mod l1;
pub mod l2_ball;
pub mod nonnegativity;
pub mod simplex;
pub mod total_variation;
pub mod unimodality;

pub use box_constraint::BoxConstraint;
pub use generalized_l2::GeneralizedL2;
pub use l1::{soft_threshold, L1};
pub use l2_ball::L2Ball;
pub use nonnegativity::NonNegativity;
pub use simplex::{project_simplex, UnitSimplex};
pub use total_variation::{tv_denoise, TotalVariation};
pub use unimodality::{isotonic_regression, unimodal_regression, Unimodality};
