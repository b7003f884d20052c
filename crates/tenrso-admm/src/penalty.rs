//! Penalty capability traits and the auxiliary-state protocol
//!
//! Operators are grouped by the smallest block their proximal step needs:
//!
//! | Trait | Block | Examples |
//! |-------|-------|----------|
//! | [`RowVectorPenalty`] | one row | L1, box, non-negativity, L2 ball |
//! | [`MatrixPenalty`] | one factor matrix | unit simplex, generalized L2, total variation, unimodality |
//! | [`MatricesPenalty`] | the whole list | temporal smoothness |
//!
//! Larger-block updates of row and matrix operators are derived with
//! [`update_matrix_by_rows`] and [`update_matrices_by_slice`]; an operator
//! whose optimum is not row separable simply implements its matrix update
//! directly.
//!
//! [`AdmmPenalty`] is the uniform protocol the outer AO-ADMM loop talks to:
//! initialize aux and dual variables, update the aux variable, and view it
//! as ordinary factor matrices. Every [`MatricesPenalty`] gets it for free
//! with a mode-shaped aux ([`ModeFactors`]); stateful coupled operators such
//! as [`Parafac2`](crate::Parafac2) implement it with their own aux type.

use std::fmt;

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2};
use scirs2_core::random::Rng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{
    check_feasibility_penalties, check_feasibility_penalty, Factor, FactorKind, FactorMatrices,
    SliceShapes,
};
use crate::init::{init_mode_factors, AdmmInit, InitMethod, ModeFactors};

/// Tolerance used by indicator penalties when testing feasibility
pub const FEASIBILITY_TOL: f64 = 1e-10;

/// Scalar regularization value of a factor
pub trait Penalty: fmt::Debug + Send + Sync {
    /// Operator name used in error messages
    fn name(&self) -> &'static str;

    /// Penalty value of a row, a matrix (sum over rows) or a list (sum over slices)
    ///
    /// Indicator penalties return `0.0` on feasible input and `f64::INFINITY`
    /// otherwise.
    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64>;
}

/// Operator whose proximal step acts on a full list of factor matrices
pub trait MatricesPenalty: Penalty {
    /// Aux/dual initialization policy
    fn admm_init(&self) -> &AdmmInit;

    /// Proximal update of every slice, with one feasibility penalty per slice
    fn factor_matrices_update(
        &self,
        matrices: &FactorMatrices,
        feasibility_penalties: &[f64],
    ) -> PenaltyResult<FactorMatrices>;
}

/// Operator whose proximal step acts on one factor matrix at a time
pub trait MatrixPenalty: MatricesPenalty {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>>;
}

/// Operator whose proximal step acts on one row at a time
pub trait RowVectorPenalty: MatrixPenalty {
    fn factor_matrix_row_update(
        &self,
        row: &ArrayView1<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array1<f64>>;
}

/// Matrix update assembled from independent row updates
pub fn update_matrix_by_rows<P: RowVectorPenalty + ?Sized>(
    penalty: &P,
    matrix: &ArrayView2<f64>,
    feasibility_penalty: f64,
) -> PenaltyResult<Array2<f64>> {
    check_feasibility_penalty(feasibility_penalty)?;

    let mut out = Array2::zeros(matrix.dim());
    for (i, row) in matrix.rows().into_iter().enumerate() {
        let updated = penalty.factor_matrix_row_update(&row, feasibility_penalty)?;
        out.row_mut(i).assign(&updated);
    }
    Ok(out)
}

/// List update assembled from independent per-slice matrix updates
///
/// With the `parallel` feature the slices are processed on the rayon pool.
pub fn update_matrices_by_slice<P: MatrixPenalty + ?Sized>(
    penalty: &P,
    matrices: &FactorMatrices,
    feasibility_penalties: &[f64],
) -> PenaltyResult<FactorMatrices> {
    check_feasibility_penalties(feasibility_penalties, matrices.len())?;

    #[cfg(feature = "parallel")]
    let updated = matrices
        .as_slice()
        .par_iter()
        .zip(feasibility_penalties.par_iter())
        .map(|(matrix, &rho)| penalty.factor_matrix_update(&matrix.view(), rho))
        .collect::<PenaltyResult<Vec<_>>>()?;

    #[cfg(not(feature = "parallel"))]
    let updated = matrices
        .iter()
        .zip(feasibility_penalties)
        .map(|(matrix, &rho)| penalty.factor_matrix_update(&matrix.view(), rho))
        .collect::<PenaltyResult<Vec<_>>>()?;

    FactorMatrices::new(updated)
}

/// Uniform ADMM protocol: aux/dual initialization, aux update and aux views
pub trait AdmmPenalty: Penalty {
    /// Latent state carried across outer iterations
    type Aux: Clone + fmt::Debug;

    /// Distribution used by [`init_dual`](Self::init_dual)
    fn dual_init(&self) -> InitMethod;

    /// Create the aux variable for `mode` of a rank-`rank` model
    fn init_aux<R: Rng>(
        &self,
        shapes: &SliceShapes,
        rank: usize,
        mode: usize,
        rng: &mut R,
    ) -> PenaltyResult<Self::Aux>;

    /// Create the dual variable for `mode` of a rank-`rank` model
    fn init_dual<R: Rng>(
        &self,
        shapes: &SliceShapes,
        rank: usize,
        mode: usize,
        rng: &mut R,
    ) -> PenaltyResult<ModeFactors> {
        init_mode_factors(self.dual_init(), shapes, rank, mode, rng)
    }

    /// Proximal update of the aux variable towards `targets`
    fn update_aux(
        &self,
        targets: &FactorMatrices,
        feasibility_penalties: &[f64],
        aux: &Self::Aux,
    ) -> PenaltyResult<Self::Aux>;

    /// Dense factor-matrix view of the aux variable for slice `k`
    fn aux_as_matrix(&self, aux: &Self::Aux, k: usize) -> PenaltyResult<Array2<f64>>;

    /// Dense factor-matrix views of the aux variable for every slice
    fn auxes_as_matrices(&self, aux: &Self::Aux) -> PenaltyResult<FactorMatrices>;

    /// `aux - matrix` for an aux holding a single matrix
    fn subtract_from_aux(
        &self,
        aux: &Self::Aux,
        matrix: &ArrayView2<f64>,
    ) -> PenaltyResult<Array2<f64>>;

    /// `aux[k] - matrices[k]` for every slice: the ADMM primal residual
    fn subtract_from_auxes(
        &self,
        aux: &Self::Aux,
        matrices: &FactorMatrices,
    ) -> PenaltyResult<FactorMatrices>;
}

impl<P: MatricesPenalty + ?Sized> AdmmPenalty for P {
    type Aux = ModeFactors;

    fn dual_init(&self) -> InitMethod {
        self.admm_init().dual
    }

    fn init_aux<R: Rng>(
        &self,
        shapes: &SliceShapes,
        rank: usize,
        mode: usize,
        rng: &mut R,
    ) -> PenaltyResult<ModeFactors> {
        init_mode_factors(self.admm_init().aux, shapes, rank, mode, rng)
    }

    fn update_aux(
        &self,
        targets: &FactorMatrices,
        feasibility_penalties: &[f64],
        aux: &ModeFactors,
    ) -> PenaltyResult<ModeFactors> {
        match aux {
            ModeFactors::Matrix(_) => {
                if targets.len() != 1 {
                    return Err(PenaltyError::type_mismatch(
                        self.name(),
                        FactorKind::Matrix,
                        FactorKind::Matrices,
                    ));
                }
                let mut updated = self
                    .factor_matrices_update(targets, feasibility_penalties)?
                    .into_inner();
                updated.pop().map(ModeFactors::Matrix).ok_or_else(|| {
                    PenaltyError::ShapeMismatch("update returned no factor matrix".to_string())
                })
            }
            ModeFactors::Slices(_) => Ok(ModeFactors::Slices(
                self.factor_matrices_update(targets, feasibility_penalties)?,
            )),
        }
    }

    fn aux_as_matrix(&self, aux: &ModeFactors, k: usize) -> PenaltyResult<Array2<f64>> {
        match aux {
            ModeFactors::Matrix(m) if k == 0 => Ok(m.clone()),
            ModeFactors::Matrix(_) => Err(PenaltyError::ShapeMismatch(format!(
                "aux holds a single matrix, requested slice {}",
                k
            ))),
            ModeFactors::Slices(s) => s.get(k).cloned().ok_or_else(|| {
                PenaltyError::ShapeMismatch(format!(
                    "aux holds {} slices, requested slice {}",
                    s.len(),
                    k
                ))
            }),
        }
    }

    fn auxes_as_matrices(&self, aux: &ModeFactors) -> PenaltyResult<FactorMatrices> {
        aux.to_factor_matrices()
    }

    fn subtract_from_aux(
        &self,
        aux: &ModeFactors,
        matrix: &ArrayView2<f64>,
    ) -> PenaltyResult<Array2<f64>> {
        match aux {
            ModeFactors::Matrix(m) if m.dim() == matrix.dim() => Ok(m - matrix),
            ModeFactors::Matrix(m) => Err(PenaltyError::ShapeMismatch(format!(
                "aux has shape {:?}, matrix has shape {:?}",
                m.dim(),
                matrix.dim()
            ))),
            ModeFactors::Slices(_) => Err(PenaltyError::type_mismatch(
                self.name(),
                FactorKind::Matrices,
                FactorKind::Matrix,
            )),
        }
    }

    fn subtract_from_auxes(
        &self,
        aux: &ModeFactors,
        matrices: &FactorMatrices,
    ) -> PenaltyResult<FactorMatrices> {
        match aux {
            ModeFactors::Slices(s) => s.difference(matrices),
            ModeFactors::Matrix(_) => Err(PenaltyError::type_mismatch(
                self.name(),
                FactorKind::Matrix,
                FactorKind::Matrices,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use scirs2_core::random::{rngs::StdRng, SeedableRng};

    #[derive(Debug, Default)]
    struct BetweenZeroAndOne {
        init: AdmmInit,
    }

    impl Penalty for BetweenZeroAndOne {
        fn name(&self) -> &'static str {
            "BetweenZeroAndOne"
        }

        fn penalty(&self, _factor: Factor<'_>) -> PenaltyResult<f64> {
            Ok(0.0)
        }
    }

    impl MatricesPenalty for BetweenZeroAndOne {
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

    impl MatrixPenalty for BetweenZeroAndOne {
        fn factor_matrix_update(
            &self,
            matrix: &ArrayView2<f64>,
            feasibility_penalty: f64,
        ) -> PenaltyResult<Array2<f64>> {
            update_matrix_by_rows(self, matrix, feasibility_penalty)
        }
    }

    impl RowVectorPenalty for BetweenZeroAndOne {
        fn factor_matrix_row_update(
            &self,
            row: &ArrayView1<f64>,
            _feasibility_penalty: f64,
        ) -> PenaltyResult<Array1<f64>> {
            Ok(row.mapv(|x| x.clamp(0.0, 1.0)))
        }
    }

    fn random_matrices(rng: &mut StdRng) -> FactorMatrices {
        let matrices = [4, 6, 5]
            .iter()
            .map(|&rows| {
                crate::init::random_matrix(InitMethod::RandomStandardNormal, rows, 3, rng)
                    .unwrap()
                    .mapv(|x| 3.0 * x)
            })
            .collect();
        FactorMatrices::new(matrices).unwrap()
    }

    #[test]
    fn test_row_update_forwards_to_matrix_and_list() {
        let mut rng = StdRng::seed_from_u64(7);
        let matrices = random_matrices(&mut rng);
        let penalty = BetweenZeroAndOne::default();

        let matrix = penalty
            .factor_matrix_update(&matrices[0].view(), 1.0)
            .unwrap();
        assert!(matrix.iter().all(|&x| (0.0..=1.0).contains(&x)));

        let updated = penalty
            .factor_matrices_update(&matrices, &[1.0, 1.0, 1.0])
            .unwrap();
        assert_eq!(updated.shapes(), matrices.shapes());
        for matrix in &updated {
            assert!(matrix.iter().all(|&x| (0.0..=1.0).contains(&x)));
        }
    }

    #[test]
    fn test_list_update_checks_feasibility_penalties() {
        let mut rng = StdRng::seed_from_u64(8);
        let matrices = random_matrices(&mut rng);
        let penalty = BetweenZeroAndOne::default();

        assert!(penalty.factor_matrices_update(&matrices, &[1.0, 1.0]).is_err());
        let err = penalty
            .factor_matrices_update(&matrices, &[1.0, 0.0, 1.0])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn test_mode_shaped_aux_protocol() {
        let mut rng = StdRng::seed_from_u64(9);
        let shapes = SliceShapes::new(vec![(4, 5), (6, 5), (5, 5)]).unwrap();
        let penalty = BetweenZeroAndOne::default();

        let aux = penalty.init_aux(&shapes, 3, 1, &mut rng).unwrap();
        let matrices = random_matrices(&mut rng);

        let as_matrices = penalty.auxes_as_matrices(&aux).unwrap();
        let diffs = penalty.subtract_from_auxes(&aux, &matrices).unwrap();
        for k in 0..matrices.len() {
            let aux_k = penalty.aux_as_matrix(&aux, k).unwrap();
            assert_eq!(aux_k, as_matrices[k]);
            assert_eq!(diffs[k], &aux_k - &matrices[k]);
        }

        // A list aux has no single-matrix residual
        let err = penalty
            .subtract_from_aux(&aux, &matrices[0].view())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);

        let updated = penalty
            .update_aux(&matrices, &[2.0, 2.0, 2.0], &aux)
            .unwrap();
        match updated {
            ModeFactors::Slices(s) => assert_eq!(s.shapes(), matrices.shapes()),
            other => panic!("expected slices, got {:?}", other),
        }
    }

    #[test]
    fn test_single_matrix_aux_protocol() {
        let mut rng = StdRng::seed_from_u64(10);
        let shapes = SliceShapes::new(vec![(4, 5), (6, 5)]).unwrap();
        let penalty = BetweenZeroAndOne {
            init: AdmmInit::new(InitMethod::Zeros, InitMethod::Zeros),
        };

        let aux = penalty.init_aux(&shapes, 2, 2, &mut rng).unwrap();
        let dual = penalty.init_dual(&shapes, 2, 2, &mut rng).unwrap();
        assert_eq!(aux, dual);

        let target = Array2::from_elem((5, 2), 4.0);
        let residual = penalty.subtract_from_aux(&aux, &target.view()).unwrap();
        assert!(residual.iter().all(|&x| x == -4.0));

        let targets = FactorMatrices::new(vec![target]).unwrap();
        match penalty.update_aux(&targets, &[1.0], &aux).unwrap() {
            ModeFactors::Matrix(m) => assert!(m.iter().all(|&x| x == 1.0)),
            other => panic!("expected a matrix, got {:?}", other),
        }
    }
}
