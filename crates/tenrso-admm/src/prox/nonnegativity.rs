//! Non-negativity constraint

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::PenaltyResult;
use crate::factors::{check_feasibility_penalty, Factor, FactorMatrices};
use crate::init::AdmmInit;
use crate::penalty::{
    update_matrices_by_slice, update_matrix_by_rows, MatricesPenalty, MatrixPenalty, Penalty,
    RowVectorPenalty, FEASIBILITY_TOL,
};

#[derive(Debug, Clone, Default)]
pub struct NonNegativity {
    init: AdmmInit,
}

impl NonNegativity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init(mut self, init: AdmmInit) -> Self {
        self.init = init;
        self
    }
}

impl Penalty for NonNegativity {
    fn name(&self) -> &'static str {
        "NonNegativity"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        let negatives =
            factor.sum_over_matrices(|m| m.iter().filter(|&&x| x < -FEASIBILITY_TOL).count() as f64);
        Ok(if negatives > 0.0 { f64::INFINITY } else { 0.0 })
    }
}

impl MatricesPenalty for NonNegativity {
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

impl MatrixPenalty for NonNegativity {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>> {
        update_matrix_by_rows(self, matrix, feasibility_penalty)
    }
}

impl RowVectorPenalty for NonNegativity {
    fn factor_matrix_row_update(
        &self,
        row: &ArrayView1<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array1<f64>> {
        check_feasibility_penalty(feasibility_penalty)?;
        Ok(row.mapv(|x| x.max(0.0)))
    }
}
