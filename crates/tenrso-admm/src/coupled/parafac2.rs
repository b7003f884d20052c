//! PARAFAC2 constraint on the coupled mode of a coupled matrix factorization
//!
//! The constraint requires every slice factor to factor as
//!
//! ```text
//! B_k = P_k · ΔB,    P_kᵀ P_k = I_R
//! ```
//!
//! with one orthonormal basis `P_k` (`N_k × R`) per slice and one coordinate
//! matrix `ΔB` (`R × R`) shared by all slices. The pair is the auxiliary
//! state ([`Parafac2Aux`]) carried between outer iterations.
//!
//! # Algorithm
//!
//! The aux update minimizes `Σ_k ρ_k ‖P_k ΔB − B_k‖²` by block coordinate
//! descent, repeated `n_iter` times:
//!
//! 1. `P_k ← procrustes(B_k ΔBᵀ)` for every slice; directions in which
//!    `B_k ΔBᵀ` vanishes (e.g. right after a zero `ΔB` init) keep `P_k`
//! 2. `ΔB ← Σ_k ρ_k P_kᵀ B_k / Σ_k ρ_k`
//!
//! Both steps are exact minimizers of their block, so the weighted residual
//! never increases from one sweep to the next. Either step can be frozen.
//!
//! # Examples
//!
//! ```
//! use scirs2_core::ndarray_ext::Array2;
//! use scirs2_core::random::{rngs::StdRng, SeedableRng};
//! use tenrso_admm::{AdmmPenalty, FactorMatrices, Parafac2, SliceShapes};
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let shapes = SliceShapes::new(vec![(6, 4), (8, 4), (7, 4)])?;
//! let pf2 = Parafac2::new(3, true, true)?;
//!
//! let aux = pf2.init_aux(&shapes, 2, 1, &mut rng)?;
//! let targets = FactorMatrices::new(vec![
//!     Array2::ones((6, 2)),
//!     Array2::ones((8, 2)),
//!     Array2::ones((7, 2)),
//! ])?;
//! let aux = pf2.update_aux(&targets, &[1.0, 1.0, 1.0], &aux)?;
//! let projected = pf2.auxes_as_matrices(&aux)?;
//! assert_eq!(projected.shapes(), targets.shapes());
//! # Ok::<(), anyhow::Error>(())
//! ```

use scirs2_core::ndarray_ext::{Array2, ArrayD, ArrayView2, Ix2};
use scirs2_core::random::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{check_feasibility_penalties, Factor, FactorKind, FactorMatrices, SliceShapes};
use crate::init::{check_rank_and_mode, random_matrix, InitMethod};
use crate::linalg::{
    is_orthonormal, orthogonal_procrustes, orthogonal_procrustes_with_fallback, ORTHONORMALITY_TOL,
};
use crate::penalty::{AdmmPenalty, Penalty};

/// How the PARAFAC2 aux variable is initialized
///
/// Random methods always produce orthonormal bases (a random matrix mapped
/// through the orthogonal Procrustes projection); the method selects the
/// distribution of `ΔB`. [`InitMethod::Zeros`] gives `ΔB = 0` with bases
/// drawn from the uniform distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum Parafac2Init {
    Method(InitMethod),
    /// Explicit values, validated against the data shapes on use
    Given {
        basis_matrices: Vec<ArrayD<f64>>,
        coordinate_matrix: ArrayD<f64>,
    },
}

impl Default for Parafac2Init {
    fn default() -> Self {
        Parafac2Init::Method(InitMethod::RandomUniform)
    }
}

impl From<InitMethod> for Parafac2Init {
    fn from(method: InitMethod) -> Self {
        Parafac2Init::Method(method)
    }
}

/// Orthonormal bases and shared coordinate matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Parafac2Aux {
    pub basis_matrices: Vec<Array2<f64>>,
    pub coordinate_matrix: Array2<f64>,
}

impl Parafac2Aux {
    /// Number of slices
    pub fn len(&self) -> usize {
        self.basis_matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basis_matrices.is_empty()
    }

    pub fn rank(&self) -> usize {
        self.coordinate_matrix.nrows()
    }

    /// `P_k · ΔB`
    pub fn reconstruct(&self, k: usize) -> PenaltyResult<Array2<f64>> {
        let basis = self.basis_matrices.get(k).ok_or_else(|| {
            PenaltyError::ShapeMismatch(format!(
                "aux holds {} basis matrices, requested slice {}",
                self.len(),
                k
            ))
        })?;
        Ok(basis.dot(&self.coordinate_matrix))
    }

    fn check_compatible(&self, matrices: &FactorMatrices) -> PenaltyResult<()> {
        if self.len() != matrices.len() {
            return Err(PenaltyError::ShapeMismatch(format!(
                "aux holds {} basis matrices but {} factor matrices were given",
                self.len(),
                matrices.len()
            )));
        }
        if self.coordinate_matrix.dim() != (matrices.rank(), matrices.rank()) {
            return Err(PenaltyError::ShapeMismatch(format!(
                "coordinate matrix has shape {:?}, factor matrices have rank {}",
                self.coordinate_matrix.dim(),
                matrices.rank()
            )));
        }
        for (k, (basis, matrix)) in self.basis_matrices.iter().zip(matrices).enumerate() {
            if basis.dim() != matrix.dim() {
                return Err(PenaltyError::ShapeMismatch(format!(
                    "basis matrix {} has shape {:?}, factor matrix has shape {:?}",
                    k,
                    basis.dim(),
                    matrix.dim()
                )));
            }
        }
        Ok(())
    }
}

/// PARAFAC2 constraint operator
#[derive(Debug, Clone)]
pub struct Parafac2 {
    n_iter: usize,
    update_basis_matrices: bool,
    update_coordinate_matrix: bool,
    aux_init: Parafac2Init,
    dual_init: InitMethod,
}

impl Default for Parafac2 {
    fn default() -> Self {
        Self {
            n_iter: 1,
            update_basis_matrices: true,
            update_coordinate_matrix: true,
            aux_init: Parafac2Init::default(),
            dual_init: InitMethod::default(),
        }
    }
}

impl Parafac2 {
    pub fn new(
        n_iter: usize,
        update_basis_matrices: bool,
        update_coordinate_matrix: bool,
    ) -> PenaltyResult<Self> {
        if n_iter == 0 {
            return Err(PenaltyError::invalid_parameter(
                "Parafac2",
                "n_iter",
                "at least one sweep is required",
            ));
        }
        Ok(Self {
            n_iter,
            update_basis_matrices,
            update_coordinate_matrix,
            ..Self::default()
        })
    }

    pub fn with_aux_init(mut self, aux_init: impl Into<Parafac2Init>) -> Self {
        self.aux_init = aux_init.into();
        self
    }

    pub fn with_dual_init(mut self, dual_init: InitMethod) -> Self {
        self.dual_init = dual_init;
        self
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn update_basis_matrices(&self) -> bool {
        self.update_basis_matrices
    }

    pub fn update_coordinate_matrix(&self) -> bool {
        self.update_coordinate_matrix
    }

    pub fn aux_init(&self) -> &Parafac2Init {
        &self.aux_init
    }

    /// Refine `aux` towards `matrices` with `n_iter` alternating sweeps
    pub fn factor_matrices_update(
        &self,
        matrices: &FactorMatrices,
        feasibility_penalties: &[f64],
        aux: &Parafac2Aux,
    ) -> PenaltyResult<Parafac2Aux> {
        check_feasibility_penalties(feasibility_penalties, matrices.len())?;
        aux.check_compatible(matrices)?;

        let rank = matrices.rank();
        let rho_sum: f64 = feasibility_penalties.iter().sum();
        let mut basis_matrices = aux.basis_matrices.clone();
        let mut coordinate_matrix = aux.coordinate_matrix.clone();

        for sweep in 0..self.n_iter {
            if self.update_basis_matrices {
                for (basis, matrix) in basis_matrices.iter_mut().zip(matrices) {
                    // Directions the target does not determine keep the previous basis
                    let target = matrix.dot(&coordinate_matrix.t());
                    let updated =
                        orthogonal_procrustes_with_fallback(&target.view(), Some(&basis.view()))?;
                    *basis = updated;
                }
            }

            if self.update_coordinate_matrix {
                let mut weighted = Array2::<f64>::zeros((rank, rank));
                for ((basis, matrix), &rho) in basis_matrices
                    .iter()
                    .zip(matrices)
                    .zip(feasibility_penalties)
                {
                    weighted.scaled_add(rho, &basis.t().dot(matrix));
                }
                coordinate_matrix = weighted / rho_sum;
            }

            if tracing::enabled!(tracing::Level::TRACE) {
                let residual: f64 = basis_matrices
                    .iter()
                    .zip(matrices)
                    .zip(feasibility_penalties)
                    .map(|((basis, matrix), &rho)| {
                        let diff = basis.dot(&coordinate_matrix) - matrix;
                        rho * diff.iter().map(|x| x * x).sum::<f64>()
                    })
                    .sum();
                tracing::trace!(sweep, residual, "parafac2 projection sweep");
            }
        }

        Ok(Parafac2Aux {
            basis_matrices,
            coordinate_matrix,
        })
    }

    fn aux_init_label(&self) -> &'static str {
        match &self.aux_init {
            Parafac2Init::Method(InitMethod::RandomUniform) => "random_uniform",
            Parafac2Init::Method(InitMethod::RandomStandardNormal) => "random_standard_normal",
            Parafac2Init::Method(InitMethod::Zeros) => "zeros",
            Parafac2Init::Given { .. } => "given",
        }
    }

    fn random_aux<R: Rng>(
        &self,
        method: InitMethod,
        shapes: &SliceShapes,
        rank: usize,
        rng: &mut R,
    ) -> PenaltyResult<Parafac2Aux> {
        let basis_method = match method {
            InitMethod::Zeros => InitMethod::RandomUniform,
            other => other,
        };
        let basis_matrices = shapes
            .iter()
            .map(|&(rows, _)| {
                let draw = random_matrix(basis_method, rows, rank, rng)?;
                orthogonal_procrustes(&draw.view())
            })
            .collect::<PenaltyResult<Vec<_>>>()?;
        let coordinate_matrix = random_matrix(method, rank, rank, rng)?;

        Ok(Parafac2Aux {
            basis_matrices,
            coordinate_matrix,
        })
    }

    fn given_aux(
        basis_matrices: &[ArrayD<f64>],
        coordinate_matrix: &ArrayD<f64>,
        shapes: &SliceShapes,
        rank: usize,
    ) -> PenaltyResult<Parafac2Aux> {
        if basis_matrices.len() != shapes.len() {
            return Err(PenaltyError::InvalidInit(format!(
                "{} basis matrices given for {} slices",
                basis_matrices.len(),
                shapes.len()
            )));
        }

        let bases = basis_matrices
            .iter()
            .enumerate()
            .map(|(k, basis)| {
                let basis = as_matrix(basis, "basis matrix", k)?;
                let expected = (shapes.rows(k), rank);
                if basis.dim() != expected {
                    return Err(PenaltyError::InvalidInit(format!(
                        "basis matrix {} has shape {:?}, expected {:?}",
                        k,
                        basis.dim(),
                        expected
                    )));
                }
                if !is_orthonormal(&basis, ORTHONORMALITY_TOL) {
                    return Err(PenaltyError::InvalidInit(format!(
                        "basis matrix {} does not have orthonormal columns",
                        k
                    )));
                }
                Ok(basis.to_owned())
            })
            .collect::<PenaltyResult<Vec<_>>>()?;

        let coordinates = as_matrix(coordinate_matrix, "coordinate matrix", 0)?;
        if coordinates.dim() != (rank, rank) {
            return Err(PenaltyError::InvalidInit(format!(
                "coordinate matrix has shape {:?}, expected {:?}",
                coordinates.dim(),
                (rank, rank)
            )));
        }

        Ok(Parafac2Aux {
            basis_matrices: bases,
            coordinate_matrix: coordinates.to_owned(),
        })
    }
}

fn as_matrix<'a>(
    array: &'a ArrayD<f64>,
    what: &str,
    k: usize,
) -> PenaltyResult<ArrayView2<'a, f64>> {
    array.view().into_dimensionality::<Ix2>().map_err(|_| {
        PenaltyError::InvalidInit(format!(
            "{} {} must be 2-dimensional, got {} dimensions",
            what,
            k,
            array.ndim()
        ))
    })
}

impl Penalty for Parafac2 {
    fn name(&self) -> &'static str {
        "Parafac2"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        match factor {
            Factor::Matrices(_) => Ok(0.0),
            other => Err(PenaltyError::type_mismatch(
                self.name(),
                FactorKind::Matrices,
                other.kind(),
            )),
        }
    }
}

impl AdmmPenalty for Parafac2 {
    type Aux = Parafac2Aux;

    fn dual_init(&self) -> InitMethod {
        self.dual_init
    }

    fn init_aux<R: Rng>(
        &self,
        shapes: &SliceShapes,
        rank: usize,
        mode: usize,
        rng: &mut R,
    ) -> PenaltyResult<Parafac2Aux> {
        check_rank_and_mode(rank, mode)?;
        if mode != 1 {
            return Err(PenaltyError::InvalidMode {
                mode,
                reason: "the PARAFAC2 constraint only applies to mode 1".to_string(),
            });
        }
        if let Some(k) = (0..shapes.len()).find(|&k| shapes.rows(k) < rank) {
            return Err(PenaltyError::ShapeMismatch(format!(
                "slice {} has {} rows, fewer than the rank {}",
                k,
                shapes.rows(k),
                rank
            )));
        }

        tracing::debug!(
            n_slices = shapes.len(),
            rank,
            init = self.aux_init_label(),
            "initializing parafac2 aux"
        );

        match &self.aux_init {
            Parafac2Init::Method(method) => self.random_aux(*method, shapes, rank, rng),
            Parafac2Init::Given {
                basis_matrices,
                coordinate_matrix,
            } => Self::given_aux(basis_matrices, coordinate_matrix, shapes, rank),
        }
    }

    fn update_aux(
        &self,
        targets: &FactorMatrices,
        feasibility_penalties: &[f64],
        aux: &Parafac2Aux,
    ) -> PenaltyResult<Parafac2Aux> {
        self.factor_matrices_update(targets, feasibility_penalties, aux)
    }

    fn aux_as_matrix(&self, aux: &Parafac2Aux, k: usize) -> PenaltyResult<Array2<f64>> {
        aux.reconstruct(k)
    }

    fn auxes_as_matrices(&self, aux: &Parafac2Aux) -> PenaltyResult<FactorMatrices> {
        FactorMatrices::new(
            (0..aux.len())
                .map(|k| aux.reconstruct(k))
                .collect::<PenaltyResult<Vec<_>>>()?,
        )
    }

    fn subtract_from_aux(
        &self,
        _aux: &Parafac2Aux,
        _matrix: &ArrayView2<f64>,
    ) -> PenaltyResult<Array2<f64>> {
        Err(PenaltyError::type_mismatch(
            self.name(),
            FactorKind::Matrices,
            FactorKind::Matrix,
        ))
    }

    fn subtract_from_auxes(
        &self,
        aux: &Parafac2Aux,
        matrices: &FactorMatrices,
    ) -> PenaltyResult<FactorMatrices> {
        aux.check_compatible(matrices)?;
        matrices.try_map(|k, matrix| Ok(aux.reconstruct(k)? - matrix))
    }
}

/// Serializable description of a [`Parafac2`] operator
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Parafac2Config {
    pub n_iter: usize,
    pub update_basis_matrices: bool,
    pub update_coordinate_matrix: bool,
    pub aux_init: InitMethod,
    pub dual_init: InitMethod,
}

impl Default for Parafac2Config {
    fn default() -> Self {
        Self {
            n_iter: 1,
            update_basis_matrices: true,
            update_coordinate_matrix: true,
            aux_init: InitMethod::RandomUniform,
            dual_init: InitMethod::RandomUniform,
        }
    }
}

impl Parafac2Config {
    pub fn build(&self) -> PenaltyResult<Parafac2> {
        Ok(Parafac2::new(
            self.n_iter,
            self.update_basis_matrices,
            self.update_coordinate_matrix,
        )?
        .with_aux_init(self.aux_init)
        .with_dual_init(self.dual_init))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use scirs2_core::ndarray_ext::IxDyn;
    use scirs2_core::random::{rngs::StdRng, SeedableRng};

    fn shapes() -> SliceShapes {
        SliceShapes::new(vec![(6, 9), (8, 9), (7, 9), (10, 9)]).unwrap()
    }

    fn eye_bases(shapes: &SliceShapes, rank: usize) -> Vec<ArrayD<f64>> {
        shapes
            .iter()
            .map(|&(rows, _)| {
                let mut basis = ArrayD::zeros(IxDyn(&[rows, rank]));
                for i in 0..rank {
                    basis[&[i, i][..]] = 1.0;
                }
                basis
            })
            .collect()
    }

    #[test]
    fn test_mode_must_be_one() {
        let mut rng = StdRng::seed_from_u64(0);
        let pf2 = Parafac2::default();
        for mode in [0, 2] {
            let err = pf2.init_aux(&shapes(), 3, mode, &mut rng).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Value);
        }
        assert!(pf2.init_aux(&shapes(), 0, 1, &mut rng).is_err());
        assert!(pf2.init_aux(&shapes(), 3, 1, &mut rng).is_ok());
    }

    #[test]
    fn test_random_inits_are_orthonormal() {
        let rank = 3;
        for method in [
            InitMethod::RandomUniform,
            InitMethod::RandomStandardNormal,
            InitMethod::Zeros,
        ] {
            let mut rng = StdRng::seed_from_u64(1);
            let pf2 = Parafac2::default().with_aux_init(method);
            let aux = pf2.init_aux(&shapes(), rank, 1, &mut rng).unwrap();

            assert_eq!(aux.coordinate_matrix.dim(), (rank, rank));
            for (k, basis) in aux.basis_matrices.iter().enumerate() {
                assert_eq!(basis.dim(), (shapes().rows(k), rank));
                assert!(is_orthonormal(&basis.view(), 1e-10));
            }

            match method {
                InitMethod::RandomUniform => assert!(aux
                    .coordinate_matrix
                    .iter()
                    .all(|&x| (0.0..=1.0).contains(&x))),
                InitMethod::Zeros => assert!(aux.coordinate_matrix.iter().all(|&x| x == 0.0)),
                InitMethod::RandomStandardNormal => {}
            }
        }
    }

    #[test]
    fn test_given_init_is_returned() {
        let mut rng = StdRng::seed_from_u64(2);
        let rank = 3;
        let coordinates = ArrayD::from_shape_fn(IxDyn(&[rank, rank]), |idx| (idx[0] + idx[1]) as f64);
        let pf2 = Parafac2::default().with_aux_init(Parafac2Init::Given {
            basis_matrices: eye_bases(&shapes(), rank),
            coordinate_matrix: coordinates.clone(),
        });

        let aux = pf2.init_aux(&shapes(), rank, 1, &mut rng).unwrap();
        assert_eq!(aux.coordinate_matrix.clone().into_dyn(), coordinates);
        for (basis, given) in aux.basis_matrices.iter().zip(eye_bases(&shapes(), rank)) {
            assert_eq!(basis.clone().into_dyn(), given);
        }
    }

    #[test]
    fn test_given_init_is_validated() {
        let mut rng = StdRng::seed_from_u64(3);
        let rank = 3;
        let good_bases = eye_bases(&shapes(), rank);
        let good_coordinates = ArrayD::<f64>::ones(IxDyn(&[rank, rank]));

        let mut invalid_bases = Vec::new();

        let mut not_orthonormal = good_bases.clone();
        not_orthonormal[0] = ArrayD::zeros(IxDyn(&[shapes().rows(0), rank]));
        invalid_bases.push(not_orthonormal);

        let mut wrong_shape = good_bases.clone();
        wrong_shape[0] = ArrayD::zeros(IxDyn(&[shapes().rows(0) + 1, rank]));
        invalid_bases.push(wrong_shape);

        let mut wrong_order = good_bases.clone();
        wrong_order[0] = ArrayD::zeros(IxDyn(&[shapes().rows(0), rank, 2]));
        invalid_bases.push(wrong_order);

        let mut too_many = good_bases.clone();
        too_many.extend(good_bases.clone());
        invalid_bases.push(too_many);

        for basis_matrices in invalid_bases {
            let pf2 = Parafac2::default().with_aux_init(Parafac2Init::Given {
                basis_matrices,
                coordinate_matrix: good_coordinates.clone(),
            });
            let err = pf2.init_aux(&shapes(), rank, 1, &mut rng).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Value);
        }

        for shape in [
            vec![rank, rank, rank],
            vec![rank + 1, rank],
            vec![rank, rank + 1],
            vec![rank + 1, rank + 1],
        ] {
            let pf2 = Parafac2::default().with_aux_init(Parafac2Init::Given {
                basis_matrices: good_bases.clone(),
                coordinate_matrix: ArrayD::zeros(IxDyn(&shape)),
            });
            let err = pf2.init_aux(&shapes(), rank, 1, &mut rng).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Value);
        }
    }

    #[test]
    fn test_penalty_is_zero_for_lists_only() {
        let pf2 = Parafac2::default();
        let matrices = FactorMatrices::new(vec![Array2::ones((4, 2)), Array2::ones((5, 2))]).unwrap();
        assert_eq!(pf2.penalty(Factor::from(&matrices)).unwrap(), 0.0);

        let err = pf2.penalty(Factor::from(&matrices[0])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_subtract_from_aux_is_a_type_error() {
        let mut rng = StdRng::seed_from_u64(4);
        let pf2 = Parafac2::default();
        let aux = pf2.init_aux(&shapes(), 2, 1, &mut rng).unwrap();
        let err = pf2
            .subtract_from_aux(&aux, &Array2::zeros((6, 2)).view())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_update_after_zeros_init_keeps_bases_orthonormal() {
        let mut rng = StdRng::seed_from_u64(5);
        let rank = 3;
        let pf2 = Parafac2::default().with_aux_init(InitMethod::Zeros);
        let aux = pf2.init_aux(&shapes(), rank, 1, &mut rng).unwrap();
        let targets = FactorMatrices::new(
            shapes()
                .iter()
                .map(|&(rows, _)| {
                    random_matrix(InitMethod::RandomStandardNormal, rows, rank, &mut rng).unwrap()
                })
                .collect(),
        )
        .unwrap();
        let rhos = [1.0; 4];

        // ΔB = 0 gives no information on the bases, so they are kept
        let first = pf2.update_aux(&targets, &rhos, &aux).unwrap();
        for (new, old) in first.basis_matrices.iter().zip(&aux.basis_matrices) {
            assert!(is_orthonormal(&new.view(), 1e-10));
            for (a, b) in new.iter().zip(old.iter()) {
                assert!((a - b).abs() < 1e-10);
            }
        }
        assert!(first.coordinate_matrix.iter().any(|&x| x.abs() > 1e-6));

        // The next sweep moves the bases and they stay orthonormal
        let second = pf2.update_aux(&targets, &rhos, &first).unwrap();
        assert_ne!(second.basis_matrices, first.basis_matrices);
        for basis in &second.basis_matrices {
            assert!(is_orthonormal(&basis.view(), 1e-10));
        }
    }

    #[test]
    fn test_zero_sweeps_are_rejected() {
        assert!(Parafac2::new(0, true, true).is_err());
        let pf2 = Parafac2Config::default().build().unwrap();
        assert_eq!(pf2.n_iter(), 1);
    }
}
