//! Generalized L2 penalty `Σⱼ xⱼᵀ M xⱼ` over the columns of a factor matrix
//!
//! `M` is a symmetric positive (semi-)definite `N × N` matrix fixed at
//! construction, e.g. a graph Laplacian that favours smooth columns. The
//! proximal step solves
//!
//! ```text
//! (M + ½ρI) Y = ½ρX
//! ```
//!
//! with one multi-right-hand-side solve per factor matrix.

use scirs2_core::ndarray_ext::{Array2, ArrayView2};

use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{check_feasibility_penalty, Factor, FactorKind, FactorMatrices};
use crate::init::AdmmInit;
use crate::linalg::solve_square;
use crate::penalty::{update_matrices_by_slice, MatricesPenalty, MatrixPenalty, Penalty};

const SYMMETRY_TOL: f64 = 1e-10;

/// Quadratic penalty with a user-supplied norm matrix
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_admm::{Factor, GeneralizedL2, MatrixPenalty, Penalty};
///
/// let laplacian = array![[1.0, -1.0], [-1.0, 1.0]];
/// let penalty = GeneralizedL2::new(laplacian)?;
///
/// let x = array![[1.0], [3.0]];
/// assert_eq!(penalty.penalty(Factor::from(&x))?, 4.0);
///
/// let y = penalty.factor_matrix_update(&x.view(), 1.0)?;
/// assert!(penalty.penalty(Factor::from(&y))? < 4.0);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct GeneralizedL2 {
    norm_matrix: Array2<f64>,
    init: AdmmInit,
}

impl GeneralizedL2 {
    pub fn new(norm_matrix: Array2<f64>) -> PenaltyResult<Self> {
        let (rows, cols) = norm_matrix.dim();
        if rows != cols || rows == 0 {
            return Err(PenaltyError::invalid_parameter(
                "GeneralizedL2",
                "norm_matrix",
                format!("must be a non-empty square matrix, got shape {:?}", (rows, cols)),
            ));
        }
        if norm_matrix.iter().any(|x| !x.is_finite()) {
            return Err(PenaltyError::invalid_parameter(
                "GeneralizedL2",
                "norm_matrix",
                "entries must be finite",
            ));
        }

        let scale = norm_matrix.iter().fold(1.0_f64, |acc, x| acc.max(x.abs()));
        let asymmetric = norm_matrix
            .indexed_iter()
            .any(|((i, j), &x)| (x - norm_matrix[[j, i]]).abs() > SYMMETRY_TOL * scale);
        if asymmetric {
            return Err(PenaltyError::invalid_parameter(
                "GeneralizedL2",
                "norm_matrix",
                "must be symmetric",
            ));
        }

        Ok(Self {
            norm_matrix,
            init: AdmmInit::default(),
        })
    }

    pub fn with_init(mut self, init: AdmmInit) -> Self {
        self.init = init;
        self
    }

    pub fn norm_matrix(&self) -> &Array2<f64> {
        &self.norm_matrix
    }

    fn check_rows(&self, matrix: &ArrayView2<f64>) -> PenaltyResult<()> {
        if matrix.nrows() != self.norm_matrix.nrows() {
            return Err(PenaltyError::ShapeMismatch(format!(
                "factor matrix has {} rows, norm matrix is {}x{}",
                matrix.nrows(),
                self.norm_matrix.nrows(),
                self.norm_matrix.ncols()
            )));
        }
        Ok(())
    }

    fn quadratic_form(&self, matrix: &ArrayView2<f64>) -> f64 {
        let mx = self.norm_matrix.dot(matrix);
        (&mx * matrix).sum()
    }
}

impl Penalty for GeneralizedL2 {
    fn name(&self) -> &'static str {
        "GeneralizedL2"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        match factor {
            Factor::Row(_) => Err(PenaltyError::type_mismatch(
                self.name(),
                FactorKind::Matrix,
                FactorKind::Row,
            )),
            Factor::Matrix(matrix) => {
                self.check_rows(&matrix)?;
                Ok(self.quadratic_form(&matrix))
            }
            Factor::Matrices(matrices) => matrices.iter().try_fold(0.0, |acc, matrix| {
                self.check_rows(&matrix.view())?;
                Ok::<_, PenaltyError>(acc + self.quadratic_form(&matrix.view()))
            }),
        }
    }
}

impl MatricesPenalty for GeneralizedL2 {
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

impl MatrixPenalty for GeneralizedL2 {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>> {
        check_feasibility_penalty(feasibility_penalty)?;
        self.check_rows(matrix)?;

        let half_rho = 0.5 * feasibility_penalty;
        let mut system = self.norm_matrix.clone();
        system.diag_mut().mapv_inplace(|d| d + half_rho);
        let rhs = matrix.mapv(|x| half_rho * x);

        solve_square(&system.view(), &rhs.view())
    }
}
