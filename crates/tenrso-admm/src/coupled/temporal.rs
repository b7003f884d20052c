//! Temporal smoothness across an ordered list of factor matrices
//!
//! Penalty: `λ Σ_{k≥1} ‖B_k − B_{k−1}‖²`.
//!
//! Setting the gradient of the penalty plus `Σ_k ρ_k/2 ‖B_k − X_k‖²` to zero
//! gives, for every entry position, the same tridiagonal `K × K` system
//!
//! ```text
//! (c_k + ρ_k) B_k − 2λ B_{k−1} − 2λ B_{k+1} = ρ_k X_k
//! ```
//!
//! where `c_k` is `2λ` for the first and last slice and `4λ` otherwise. All
//! `N × R` positions share the matrix, so the update is one solve with
//! `N·R` right-hand sides. The slices must therefore have equal shapes.

use scirs2_core::ndarray_ext::Array2;

use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{check_feasibility_penalties, Factor, FactorKind, FactorMatrices};
use crate::init::AdmmInit;
use crate::linalg::solve_square;
use crate::penalty::{MatricesPenalty, Penalty};

#[derive(Debug, Clone)]
pub struct TemporalSmoothness {
    smoothness_l: f64,
    init: AdmmInit,
}

impl TemporalSmoothness {
    pub fn new(smoothness_l: f64) -> PenaltyResult<Self> {
        if !(smoothness_l.is_finite() && smoothness_l >= 0.0) {
            return Err(PenaltyError::invalid_parameter(
                "TemporalSmoothness",
                "smoothness_l",
                format!("must be non-negative and finite, got {}", smoothness_l),
            ));
        }
        Ok(Self {
            smoothness_l,
            init: AdmmInit::default(),
        })
    }

    pub fn with_init(mut self, init: AdmmInit) -> Self {
        self.init = init;
        self
    }

    pub fn smoothness_l(&self) -> f64 {
        self.smoothness_l
    }

    /// Diagonal coefficient of slice `k` out of `n_slices` (without ρ)
    pub fn laplace_coefficient(&self, k: usize, n_slices: usize) -> f64 {
        if n_slices <= 1 {
            0.0
        } else if k == 0 || k == n_slices - 1 {
            2.0 * self.smoothness_l
        } else {
            4.0 * self.smoothness_l
        }
    }

    /// The `K × K` tridiagonal system matrix for the given feasibility penalties
    pub fn system_matrix(&self, feasibility_penalties: &[f64]) -> Array2<f64> {
        let n = feasibility_penalties.len();
        let off_diagonal = -2.0 * self.smoothness_l;
        let mut a = Array2::zeros((n, n));
        for (k, &rho) in feasibility_penalties.iter().enumerate() {
            a[[k, k]] = self.laplace_coefficient(k, n) + rho;
            if k + 1 < n {
                a[[k, k + 1]] = off_diagonal;
                a[[k + 1, k]] = off_diagonal;
            }
        }
        a
    }

    fn check_regular(matrices: &FactorMatrices) -> PenaltyResult<()> {
        if matrices.is_regular() {
            Ok(())
        } else {
            Err(PenaltyError::ShapeMismatch(format!(
                "temporal smoothness needs equally shaped slices, got {:?}",
                matrices.shapes()
            )))
        }
    }
}

impl Penalty for TemporalSmoothness {
    fn name(&self) -> &'static str {
        "TemporalSmoothness"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        let matrices = match factor {
            Factor::Matrices(matrices) => matrices,
            other => {
                return Err(PenaltyError::type_mismatch(
                    self.name(),
                    FactorKind::Matrices,
                    other.kind(),
                ))
            }
        };
        Self::check_regular(matrices)?;

        let squared_differences: f64 = matrices
            .as_slice()
            .windows(2)
            .map(|pair| {
                pair[1]
                    .iter()
                    .zip(pair[0].iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
            })
            .sum();
        Ok(self.smoothness_l * squared_differences)
    }
}

impl MatricesPenalty for TemporalSmoothness {
    fn admm_init(&self) -> &AdmmInit {
        &self.init
    }

    fn factor_matrices_update(
        &self,
        matrices: &FactorMatrices,
        feasibility_penalties: &[f64],
    ) -> PenaltyResult<FactorMatrices> {
        check_feasibility_penalties(feasibility_penalties, matrices.len())?;
        Self::check_regular(matrices)?;

        let (rows, rank) = matrices[0].dim();
        let width = rows * rank;
        let n_slices = matrices.len();

        let system = self.system_matrix(feasibility_penalties);
        let mut rhs = Array2::zeros((n_slices, width));
        for (k, (matrix, &rho)) in matrices.iter().zip(feasibility_penalties).enumerate() {
            for (dst, &src) in rhs.row_mut(k).iter_mut().zip(matrix.iter()) {
                *dst = rho * src;
            }
        }

        tracing::trace!(n_slices, rows, rank, "solving temporal smoothness system");
        let solution = solve_square(&system.view(), &rhs.view())?;

        FactorMatrices::new(
            (0..n_slices)
                .map(|k| Array2::from_shape_fn((rows, rank), |(i, j)| solution[[k, i * rank + j]]))
                .collect(),
        )
    }
}
