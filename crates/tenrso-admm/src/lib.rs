//! # tenrso-admm - Proximal Operators for AO-ADMM
//!
//! Constraint and regularization operators for fitting coupled matrix
//! factorizations (including PARAFAC2) with alternating optimization and
//! ADMM (AO-ADMM).
//!
//! ## Overview
//!
//! An AO-ADMM fit of a coupled model
//!
//! ```text
//! X_k ≈ B_k · diag(a_k) · Cᵀ,    k = 1, ..., K
//! ```
//!
//! alternates between modes. Within one mode, ADMM splits each constrained
//! factor into a primal copy and an auxiliary copy; the operators in this
//! crate compute the auxiliary update, which is the proximal operator of the
//! regularizer at feasibility weight ρ.
//!
//! ### Single-block operators ([`prox`])
//!
//! | Operator | Penalty | Proximal step |
//! |----------|---------|---------------|
//! | [`L1`] | `λ Σ\|x\|` | soft thresholding |
//! | [`BoxConstraint`] | indicator of `[min, max]` | clip |
//! | [`L2Ball`] | indicator of `‖row‖ ≤ r` | rescale rows |
//! | [`UnitSimplex`] | indicator of the probability simplex | sort-based column projection |
//! | [`NonNegativity`] | indicator of `x ≥ 0` | clip at zero |
//! | [`GeneralizedL2`] | `Σⱼ xⱼᵀ M xⱼ` | linear solve |
//! | [`TotalVariation`] | fused lasso down columns | Condat's 1-D TV + soft thresholding |
//! | [`Unimodality`] | indicator of unimodal columns | unimodal regression |
//!
//! ### Coupled operators ([`coupled`])
//!
//! - [`Parafac2`]: `B_k = P_k ΔB` with orthonormal `P_k`, aux = `(P_k, ΔB)`
//! - [`TemporalSmoothness`]: `λ Σ ‖B_k − B_{k−1}‖²`, one tridiagonal solve
//!
//! ## Quick Start
//!
//! ```
//! use scirs2_core::ndarray_ext::Array2;
//! use scirs2_core::random::{rngs::StdRng, SeedableRng};
//! use tenrso_admm::{AdmmPenalty, FactorMatrices, NonNegativity, SliceShapes};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let shapes = SliceShapes::new(vec![(10, 8), (12, 8)])?;
//! let penalty = NonNegativity::new();
//!
//! // Aux variable for the coupled mode (one matrix per slice)
//! let aux = penalty.init_aux(&shapes, 3, 1, &mut rng)?;
//!
//! // Primal factors plus scaled duals, as produced by the outer loop
//! let targets = FactorMatrices::new(vec![
//!     Array2::from_elem((10, 3), -0.5),
//!     Array2::from_elem((12, 3), 0.5),
//! ])?;
//! let aux = penalty.update_aux(&targets, &[1.0, 1.0], &aux)?;
//!
//! let residuals = penalty.subtract_from_auxes(&aux, &targets)?;
//! assert!(residuals[0].iter().all(|&r| r == 0.5));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `total-variation` (default): the 1-D TV kernel behind [`TotalVariation`]
//! - `unimodality` (default): the unimodal regression kernel behind [`Unimodality`]
//! - `parallel`: per-slice updates on the Rayon pool
//! - `serde`: (de)serializable [`config`] types
//!
//! Whether a kernel is available is answered by
//! [`capabilities::supported_capabilities`] before any operator is built.
//!
//! ## SciRS2 Integration
//!
//! Arrays come from `scirs2_core::ndarray_ext`, symmetric eigendecompositions
//! and linear solves from `scirs2_linalg`, and randomness from
//! `scirs2_core::random`. Every random initialization takes the generator as
//! an argument.
//!
//! ## References
//!
//! - Roald et al. (2022), "An AO-ADMM approach to constraining PARAFAC2 on all modes"
//! - Huang, Sidiropoulos & Liavas (2016), "A flexible and efficient algorithmic framework for constrained matrix and tensor factorization"
//! - Condat (2013), "A direct algorithm for 1D total variation denoising"
//! - Duchi et al. (2008), "Efficient projections onto the l1-ball for learning in high dimensions"

pub mod capabilities;
pub mod config;
pub mod coupled;
pub mod error;
pub mod factors;
pub mod init;
pub mod linalg;
pub mod penalty;
pub mod prox;

#[cfg(test)]
mod property_tests;

// Re-exports
pub use capabilities::{supported_capabilities, Capability, CapabilityProvider, NativeBackend};
pub use config::{Parafac2Config, PenaltyConfig};
pub use coupled::{Parafac2, Parafac2Aux, Parafac2Init, TemporalSmoothness};
pub use error::{ErrorKind, PenaltyError, PenaltyResult};
pub use factors::{Factor, FactorKind, FactorMatrices, SliceShapes};
pub use init::{AdmmInit, InitMethod, ModeFactors};
pub use penalty::{
    update_matrices_by_slice, update_matrix_by_rows, AdmmPenalty, MatricesPenalty, MatrixPenalty,
    Penalty, RowVectorPenalty,
};
pub use prox::{
    BoxConstraint, GeneralizedL2, L2Ball, NonNegativity, TotalVariation, Unimodality, UnitSimplex,
    L1,
};
