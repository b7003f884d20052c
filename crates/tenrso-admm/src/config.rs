//! Declarative operator configuration
//!
//! [`PenaltyConfig`] describes any primal-only operator so a driver can read
//! its constraints from a file and build them in one place. With the `serde`
//! feature the configuration (de)serializes as an internally tagged enum:
//!
//! ```json
//! { "type": "l1", "reg_strength": 0.1, "non_negativity": true }
//! ```
//!
//! PARAFAC2 carries its own aux type and is described by
//! [`Parafac2Config`].

use scirs2_core::ndarray_ext::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use crate::coupled::parafac2::Parafac2Config;

use crate::coupled::temporal::TemporalSmoothness;
use crate::error::{PenaltyError, PenaltyResult};
use crate::init::AdmmInit;
use crate::penalty::MatricesPenalty;
use crate::prox::{
    BoxConstraint, GeneralizedL2, L2Ball, NonNegativity, TotalVariation, Unimodality, UnitSimplex,
    L1,
};

/// Description of one primal-only operator
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum PenaltyConfig {
    L1 {
        reg_strength: f64,
        #[cfg_attr(feature = "serde", serde(default))]
        non_negativity: bool,
    },
    Box {
        min_val: f64,
        max_val: f64,
    },
    L2Ball {
        norm_bound: f64,
        #[cfg_attr(feature = "serde", serde(default))]
        non_negativity: bool,
    },
    UnitSimplex,
    NonNegativity,
    GeneralizedL2 {
        /// Row-major norm matrix
        norm_matrix: Vec<Vec<f64>>,
    },
    TotalVariation {
        reg_strength: f64,
        #[cfg_attr(feature = "serde", serde(default))]
        l1_strength: f64,
    },
    Unimodality {
        #[cfg_attr(feature = "serde", serde(default))]
        non_negativity: bool,
    },
    TemporalSmoothness {
        smoothness_l: f64,
    },
}

impl PenaltyConfig {
    /// Build the operator with the default aux/dual initialization
    pub fn build(&self) -> PenaltyResult<Box<dyn MatricesPenalty>> {
        self.build_with_init(AdmmInit::default())
    }

    /// Build the operator with an explicit aux/dual initialization
    pub fn build_with_init(&self, init: AdmmInit) -> PenaltyResult<Box<dyn MatricesPenalty>> {
        let penalty: Box<dyn MatricesPenalty> = match self {
            PenaltyConfig::L1 {
                reg_strength,
                non_negativity,
            } => Box::new(L1::new(*reg_strength, *non_negativity)?.with_init(init)),
            PenaltyConfig::Box { min_val, max_val } => {
                Box::new(BoxConstraint::new(*min_val, *max_val)?.with_init(init))
            }
            PenaltyConfig::L2Ball {
                norm_bound,
                non_negativity,
            } => Box::new(L2Ball::new(*norm_bound, *non_negativity)?.with_init(init)),
            PenaltyConfig::UnitSimplex => Box::new(UnitSimplex::new().with_init(init)),
            PenaltyConfig::NonNegativity => Box::new(NonNegativity::new().with_init(init)),
            PenaltyConfig::GeneralizedL2 { norm_matrix } => {
                Box::new(GeneralizedL2::new(rows_to_matrix(norm_matrix)?)?.with_init(init))
            }
            PenaltyConfig::TotalVariation {
                reg_strength,
                l1_strength,
            } => Box::new(TotalVariation::new(*reg_strength, *l1_strength)?.with_init(init)),
            PenaltyConfig::Unimodality { non_negativity } => {
                Box::new(Unimodality::new(*non_negativity)?.with_init(init))
            }
            PenaltyConfig::TemporalSmoothness { smoothness_l } => {
                Box::new(TemporalSmoothness::new(*smoothness_l)?.with_init(init))
            }
        };

        tracing::debug!(penalty = penalty.name(), "built penalty from config");
        Ok(penalty)
    }
}

fn rows_to_matrix(rows: &[Vec<f64>]) -> PenaltyResult<Array2<f64>> {
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != n_cols) {
        return Err(PenaltyError::invalid_parameter(
            "GeneralizedL2",
            "norm_matrix",
            "rows must all have the same length",
        ));
    }
    Ok(Array2::from_shape_fn((rows.len(), n_cols), |(i, j)| {
        rows[i][j]
    }))
}
