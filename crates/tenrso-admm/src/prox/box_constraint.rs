//! Box constraint: every entry in `[min_val, max_val]`

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{check_feasibility_penalty, Factor, FactorMatrices};
use crate::init::AdmmInit;
use crate::penalty::{
    update_matrices_by_slice, update_matrix_by_rows, MatricesPenalty, MatrixPenalty, Penalty,
    RowVectorPenalty, FEASIBILITY_TOL,
};

/// Elementwise bounds; the update is a clip and does not depend on ρ
#[derive(Debug, Clone)]
pub struct BoxConstraint {
    min_val: f64,
    max_val: f64,
    init: AdmmInit,
}

impl BoxConstraint {
    pub fn new(min_val: f64, max_val: f64) -> PenaltyResult<Self> {
        if min_val.is_nan() || max_val.is_nan() {
            return Err(PenaltyError::invalid_parameter(
                "BoxConstraint",
                "bounds",
                "bounds must not be NaN",
            ));
        }
        if min_val > max_val {
            return Err(PenaltyError::invalid_parameter(
                "BoxConstraint",
                "bounds",
                format!("min_val ({}) exceeds max_val ({})", min_val, max_val),
            ));
        }
        Ok(Self {
            min_val,
            max_val,
            init: AdmmInit::default(),
        })
    }

    pub fn with_init(mut self, init: AdmmInit) -> Self {
        self.init = init;
        self
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min_val, self.max_val)
    }
}

impl Penalty for BoxConstraint {
    fn name(&self) -> &'static str {
        "BoxConstraint"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        let (lo, hi) = (self.min_val - FEASIBILITY_TOL, self.max_val + FEASIBILITY_TOL);
        let violations = factor.sum_over_matrices(|m| {
            m.iter().filter(|&&x| !(lo..=hi).contains(&x)).count() as f64
        });
        Ok(if violations > 0.0 { f64::INFINITY } else { 0.0 })
    }
}

impl MatricesPenalty for BoxConstraint {
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

impl MatrixPenalty for BoxConstraint {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>> {
        update_matrix_by_rows(self, matrix, feasibility_penalty)
    }
}

impl RowVectorPenalty for BoxConstraint {
    fn factor_matrix_row_update(
        &self,
        row: &ArrayView1<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array1<f64>> {
        check_feasibility_penalty(feasibility_penalty)?;
        Ok(row.mapv(|x| x.clamp(self.min_val, self.max_val)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    #[test]
    fn test_feasible_row_is_invariant() {
        let constraint = BoxConstraint::new(0.0, 1.0).unwrap();
        let row = array![0.0, 0.3, 1.0, 0.99];
        let out = constraint.factor_matrix_row_update(&row.view(), 5.0).unwrap();
        assert_eq!(out, row);
        assert_eq!(constraint.penalty(Factor::from(&row)).unwrap(), 0.0);
    }

    #[test]
    fn test_clip() {
        let constraint = BoxConstraint::new(-1.0, 2.0).unwrap();
        let m = array![[-5.0, 0.5], [3.0, 100.0]];
        let out = constraint.factor_matrix_update(&m.view(), 1.0).unwrap();
        assert_eq!(out, array![[-1.0, 0.5], [2.0, 2.0]]);
        assert_eq!(constraint.penalty(Factor::from(&m)).unwrap(), f64::INFINITY);
        assert_eq!(constraint.penalty(Factor::from(&out)).unwrap(), 0.0);
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        assert!(BoxConstraint::new(1.0, 0.0).is_err());
        assert!(BoxConstraint::new(f64::NAN, 0.0).is_err());
        assert!(BoxConstraint::new(0.5, 0.5).is_ok());
    }
}
