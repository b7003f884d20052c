//! L2 ball constraint: every row has Euclidean norm at most `norm_bound`
//!
//! The projection rescales a row onto the sphere only when it lies outside
//! the ball. With non-negativity the row is clipped first; rescaling a
//! non-negative vector keeps it non-negative, so clip-then-scale is the exact
//! projection onto the intersection.

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{check_feasibility_penalty, Factor, FactorMatrices};
use crate::init::AdmmInit;
use crate::penalty::{
    update_matrices_by_slice, update_matrix_by_rows, MatricesPenalty, MatrixPenalty, Penalty,
    RowVectorPenalty, FEASIBILITY_TOL,
};

/// Row-wise L2 ball: each row is projected on its own, columns are never coupled
#[derive(Debug, Clone)]
pub struct L2Ball {
    norm_bound: f64,
    non_negativity: bool,
    init: AdmmInit,
}

impl L2Ball {
    pub fn new(norm_bound: f64, non_negativity: bool) -> PenaltyResult<Self> {
        if !(norm_bound.is_finite() && norm_bound > 0.0) {
            return Err(PenaltyError::invalid_parameter(
                "L2Ball",
                "norm_bound",
                format!("must be positive and finite, got {}", norm_bound),
            ));
        }
        Ok(Self {
            norm_bound,
            non_negativity,
            init: AdmmInit::default(),
        })
    }

    pub fn with_init(mut self, init: AdmmInit) -> Self {
        self.init = init;
        self
    }

    pub fn norm_bound(&self) -> f64 {
        self.norm_bound
    }

    fn row_is_feasible(&self, row: ArrayView1<'_, f64>) -> bool {
        let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
        let in_orthant = !self.non_negativity || row.iter().all(|&x| x >= -FEASIBILITY_TOL);
        in_orthant && norm <= self.norm_bound * (1.0 + FEASIBILITY_TOL)
    }
}

impl Penalty for L2Ball {
    fn name(&self) -> &'static str {
        "L2Ball"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        let infeasible_rows = factor.sum_over_matrices(|m| {
            m.axis_iter(Axis(0))
                .filter(|row| !self.row_is_feasible(row.view()))
                .count() as f64
        });
        Ok(if infeasible_rows > 0.0 {
            f64::INFINITY
        } else {
            0.0
        })
    }
}

impl MatricesPenalty for L2Ball {
    fn admm_init(&self) -> &AdmmInit {
        &self.init
    }

    fn factor_matrices_update(
        &self,
        matrices: &FactorMatrices,
        feasibility_penalties: &[f64],
    ) -> PenaltyResult<FactorMatrices> {
        update_matrices_by_slice(self, matrices, feasibility_penalties)
    }
}

impl MatrixPenalty for L2Ball {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>> {
        update_matrix_by_rows(self, matrix, feasibility_penalty)
    }
}

impl RowVectorPenalty for L2Ball {
    fn factor_matrix_row_update(
        &self,
        row: &ArrayView1<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array1<f64>> {
        check_feasibility_penalty(feasibility_penalty)?;

        let mut out = if self.non_negativity {
            row.mapv(|x| x.max(0.0))
        } else {
            row.to_owned()
        };

        let norm = out.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > self.norm_bound {
            let scale = self.norm_bound / norm;
            out.mapv_inplace(|x| x * scale);
        }
        Ok(out)
    }
}
