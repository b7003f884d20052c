//! Error types for penalty construction and proximal updates
//!
//! Every fallible operation in this crate returns [`PenaltyResult`]. Errors are
//! local to the call that raised them; nothing here retries.
//!
//! [`PenaltyError::kind`] separates malformed *values* (negative strengths,
//! wrong shapes, non-orthonormal bases) from the wrong *kind* of input (a single
//! matrix given to an operator that only understands lists), missing backend
//! capabilities and failures reported by the linear algebra primitives.

use scirs2_linalg::LinalgError;
use thiserror::Error;

use crate::capabilities::Capability;
use crate::factors::FactorKind;

/// Broad classification of a [`PenaltyError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A malformed value: out-of-range parameter, wrong shape, invalid mode
    Value,
    /// The wrong kind of object was supplied
    Type,
    /// The active backend lacks a feature the operator needs
    Capability,
    /// Propagated from a numerical primitive (eigendecomposition, linear solve)
    Numerical,
}

#[derive(Error, Debug)]
pub enum PenaltyError {
    #[error("Invalid {parameter} for {operator}: {reason}")]
    InvalidParameter {
        operator: &'static str,
        parameter: &'static str,
        reason: String,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid mode {mode}: {reason}")]
    InvalidMode { mode: usize, reason: String },

    #[error("Invalid auxiliary initialization: {0}")]
    InvalidInit(String),

    #[error("{operator} expects a {expected}, got a {actual}")]
    TypeMismatch {
        operator: &'static str,
        expected: FactorKind,
        actual: FactorKind,
    },

    #[error("{operator} requires the {capability} capability, which the active backend does not provide")]
    MissingCapability {
        operator: &'static str,
        capability: Capability,
    },

    #[error("Linear algebra error: {0}")]
    Linalg(#[from] LinalgError),
}

/// Result type for penalty operations
pub type PenaltyResult<T> = Result<T, PenaltyError>;

impl PenaltyError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PenaltyError::InvalidParameter { .. }
            | PenaltyError::ShapeMismatch(_)
            | PenaltyError::InvalidMode { .. }
            | PenaltyError::InvalidInit(_) => ErrorKind::Value,
            PenaltyError::TypeMismatch { .. } => ErrorKind::Type,
            PenaltyError::MissingCapability { .. } => ErrorKind::Capability,
            PenaltyError::Linalg(_) => ErrorKind::Numerical,
        }
    }

    pub(crate) fn invalid_parameter(
        operator: &'static str,
        parameter: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        PenaltyError::InvalidParameter {
            operator,
            parameter,
            reason: reason.into(),
        }
    }

    pub(crate) fn type_mismatch(
        operator: &'static str,
        expected: FactorKind,
        actual: FactorKind,
    ) -> Self {
        PenaltyError::TypeMismatch {
            operator,
            expected,
            actual,
        }
    }
}
