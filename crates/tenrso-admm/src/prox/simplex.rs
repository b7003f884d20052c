//! Unit simplex constraint on the columns of a factor matrix
//!
//! Each column is projected onto `{x : x ≥ 0, Σx = 1}` with the sort-based
//! algorithm of Duchi et al. (2008), `O(N log N)` per column. Columns are
//! independent; rows are not, so this operator has no row update.

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::PenaltyResult;
use crate::factors::{check_feasibility_penalty, Factor, FactorMatrices};
use crate::init::AdmmInit;
use crate::penalty::{
    update_matrices_by_slice, MatricesPenalty, MatrixPenalty, Penalty, FEASIBILITY_TOL,
};

/// Euclidean projection of `v` onto the probability simplex
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_admm::prox::simplex::project_simplex;
///
/// let x = project_simplex(&array![2.0, 0.0].view());
/// assert_eq!(x, array![1.0, 0.0]);
/// ```
pub fn project_simplex(v: &ArrayView1<f64>) -> Array1<f64> {
    if v.is_empty() {
        return Array1::zeros(0);
    }

    let mut sorted: Vec<f64> = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumsum = 0.0;
    let mut theta = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumsum += u;
        let candidate = (cumsum - 1.0) / (j + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    v.mapv(|x| (x - theta).max(0.0))
}

/// Every column of every factor matrix lies on the unit simplex
#[derive(Debug, Clone, Default)]
pub struct UnitSimplex {
    init: AdmmInit,
}

impl UnitSimplex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init(mut self, init: AdmmInit) -> Self {
        self.init = init;
        self
    }

    fn is_feasible(matrix: &ArrayView2<'_, f64>) -> bool {
        let non_negative = matrix.iter().all(|&x| x >= -FEASIBILITY_TOL);
        let tol = FEASIBILITY_TOL * (matrix.nrows().max(1) as f64);
        non_negative
            && matrix
                .axis_iter(Axis(1))
                .all(|col| (col.sum() - 1.0).abs() <= tol)
    }
}

impl Penalty for UnitSimplex {
    fn name(&self) -> &'static str {
        "UnitSimplex"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        let infeasible = factor.sum_over_matrices(|m| if Self::is_feasible(m) { 0.0 } else { 1.0 });
        Ok(if infeasible > 0.0 { f64::INFINITY } else { 0.0 })
    }
}

impl MatricesPenalty for UnitSimplex {
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

impl MatrixPenalty for UnitSimplex {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>> {
        check_feasibility_penalty(feasibility_penalty)?;

        let mut out = Array2::zeros(matrix.dim());
        for (j, column) in matrix.axis_iter(Axis(1)).enumerate() {
            out.column_mut(j).assign(&project_simplex(&column));
        }
        Ok(out)
    }
}
