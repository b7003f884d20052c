//! L1 (lasso) penalty: `reg_strength · Σ|x|`
//!
//! The proximal step is elementwise soft thresholding at `reg_strength / ρ`.
//! With non-negativity the step is the proximal operator of the L1 penalty
//! plus the indicator of the non-negative orthant, which is soft thresholding
//! followed by clipping at zero.

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{check_feasibility_penalty, Factor, FactorMatrices};
use crate::init::AdmmInit;
use crate::penalty::{
    update_matrices_by_slice, update_matrix_by_rows, MatricesPenalty, MatrixPenalty, Penalty,
    RowVectorPenalty,
};

/// Soft thresholding `sign(x) · max(|x| - threshold, 0)`
#[inline]
pub fn soft_threshold(x: f64, threshold: f64) -> f64 {
    x.signum() * (x.abs() - threshold).max(0.0)
}

/// L1 penalty, optionally combined with non-negativity
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_admm::{L1, MatrixPenalty};
///
/// let l1 = L1::new(1.0, false)?;
/// let x = array![[0.5, -2.0], [3.0, -0.25]];
/// let y = l1.factor_matrix_update(&x.view(), 2.0)?;
/// assert_eq!(y, array![[0.0, -1.5], [2.5, 0.0]]);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct L1 {
    reg_strength: f64,
    non_negativity: bool,
    init: AdmmInit,
}

impl L1 {
    pub fn new(reg_strength: f64, non_negativity: bool) -> PenaltyResult<Self> {
        if !(reg_strength.is_finite() && reg_strength >= 0.0) {
            return Err(PenaltyError::invalid_parameter(
                "L1",
                "reg_strength",
                format!("must be non-negative and finite, got {}", reg_strength),
            ));
        }
        Ok(Self {
            reg_strength,
            non_negativity,
            init: AdmmInit::default(),
        })
    }

    pub fn with_init(mut self, init: AdmmInit) -> Self {
        self.init = init;
        self
    }

    pub fn reg_strength(&self) -> f64 {
        self.reg_strength
    }

    pub fn non_negativity(&self) -> bool {
        self.non_negativity
    }
}

impl Penalty for L1 {
    fn name(&self) -> &'static str {
        "L1"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        let abs_sum = factor.sum_over_matrices(|m| m.iter().map(|x| x.abs()).sum());
        Ok(self.reg_strength * abs_sum)
    }
}

impl MatricesPenalty for L1 {
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

impl MatrixPenalty for L1 {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>> {
        update_matrix_by_rows(self, matrix, feasibility_penalty)
    }
}

impl RowVectorPenalty for L1 {
    fn factor_matrix_row_update(
        &self,
        row: &ArrayView1<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array1<f64>> {
        check_feasibility_penalty(feasibility_penalty)?;
        let threshold = self.reg_strength / feasibility_penalty;

        if self.non_negativity {
            Ok(row.mapv(|x| (x - threshold).max(0.0)))
        } else {
            Ok(row.mapv(|x| soft_threshold(x, threshold)))
        }
    }
}
