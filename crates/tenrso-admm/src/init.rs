//! Initialization of ADMM auxiliary and dual variables
//!
//! The random source is always passed in explicitly, so initializations are
//! reproducible from a seed and independent across threads.

use scirs2_core::ndarray_ext::Array2;
use scirs2_core::random::{Distribution, RandNormal as Normal, Rng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{FactorMatrices, SliceShapes};

/// Distribution used to draw initial values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InitMethod {
    /// Uniform on [0, 1)
    #[default]
    RandomUniform,
    /// Standard normal N(0, 1)
    RandomStandardNormal,
    /// All zeros
    Zeros,
}

/// Aux and dual initialization policy attached to an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdmmInit {
    pub aux: InitMethod,
    pub dual: InitMethod,
}

impl AdmmInit {
    pub fn new(aux: InitMethod, dual: InitMethod) -> Self {
        Self { aux, dual }
    }
}

/// Mode-shaped ADMM variable
///
/// Modes 0 and 2 of a coupled factorization have one factor matrix; mode 1
/// has one matrix per slice.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeFactors {
    Matrix(Array2<f64>),
    Slices(FactorMatrices),
}

impl ModeFactors {
    /// View as a list (a single matrix becomes a one-element list)
    pub fn to_factor_matrices(&self) -> PenaltyResult<FactorMatrices> {
        match self {
            ModeFactors::Matrix(m) => FactorMatrices::new(vec![m.clone()]),
            ModeFactors::Slices(s) => Ok(s.clone()),
        }
    }
}

/// Draw an `rows × cols` matrix from `method`
pub fn random_matrix<R: Rng>(
    method: InitMethod,
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> PenaltyResult<Array2<f64>> {
    match method {
        InitMethod::RandomUniform => Ok(Array2::from_shape_fn((rows, cols), |_| {
            rng.random::<f64>()
        })),
        InitMethod::RandomStandardNormal => {
            let normal = Normal::new(0.0, 1.0)
                .map_err(|e| PenaltyError::InvalidInit(format!("normal distribution: {}", e)))?;
            Ok(Array2::from_shape_fn((rows, cols), |_| normal.sample(&mut *rng)))
        }
        InitMethod::Zeros => Ok(Array2::zeros((rows, cols))),
    }
}

/// Check that `rank` and `mode` describe a factor of a three-mode coupled model
pub fn check_rank_and_mode(rank: usize, mode: usize) -> PenaltyResult<()> {
    if rank == 0 {
        return Err(PenaltyError::invalid_parameter(
            "init",
            "rank",
            "must be at least 1",
        ));
    }
    if mode > 2 {
        return Err(PenaltyError::InvalidMode {
            mode,
            reason: "coupled matrix factorizations have modes 0, 1 and 2".to_string(),
        });
    }
    Ok(())
}

/// Initialize a mode-shaped variable for a rank-`rank` model
pub fn init_mode_factors<R: Rng>(
    method: InitMethod,
    shapes: &SliceShapes,
    rank: usize,
    mode: usize,
    rng: &mut R,
) -> PenaltyResult<ModeFactors> {
    check_rank_and_mode(rank, mode)?;

    match mode {
        0 => Ok(ModeFactors::Matrix(random_matrix(
            method,
            shapes.len(),
            rank,
            rng,
        )?)),
        1 => {
            let slices = shapes
                .iter()
                .map(|&(rows, _)| random_matrix(method, rows, rank, rng))
                .collect::<PenaltyResult<Vec<_>>>()?;
            Ok(ModeFactors::Slices(FactorMatrices::new(slices)?))
        }
        _ => Ok(ModeFactors::Matrix(random_matrix(
            method,
            shapes.n_columns(),
            rank,
            rng,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use scirs2_core::random::{rngs::StdRng, SeedableRng};

    fn shapes() -> SliceShapes {
        SliceShapes::new(vec![(5, 7), (6, 7), (4, 7)]).unwrap()
    }

    #[test]
    fn test_mode_shapes() {
        let mut rng = StdRng::seed_from_u64(0);

        match init_mode_factors(InitMethod::RandomUniform, &shapes(), 2, 0, &mut rng).unwrap() {
            ModeFactors::Matrix(a) => assert_eq!(a.dim(), (3, 2)),
            other => panic!("expected a matrix, got {:?}", other),
        }

        match init_mode_factors(InitMethod::RandomUniform, &shapes(), 2, 1, &mut rng).unwrap() {
            ModeFactors::Slices(b) => assert_eq!(b.shapes(), vec![(5, 2), (6, 2), (4, 2)]),
            other => panic!("expected slices, got {:?}", other),
        }

        match init_mode_factors(InitMethod::RandomUniform, &shapes(), 2, 2, &mut rng).unwrap() {
            ModeFactors::Matrix(c) => assert_eq!(c.dim(), (7, 2)),
            other => panic!("expected a matrix, got {:?}", other),
        }
    }

    #[test]
    fn test_uniform_values_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(1);
        let m = random_matrix(InitMethod::RandomUniform, 20, 4, &mut rng).unwrap();
        assert!(m.iter().all(|&x| (0.0..1.0).contains(&x)));
    }

    #[test]
    fn test_zeros() {
        let mut rng = StdRng::seed_from_u64(2);
        let m = random_matrix(InitMethod::Zeros, 3, 3, &mut rng).unwrap();
        assert!(m.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = random_matrix(
            InitMethod::RandomStandardNormal,
            4,
            3,
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        let b = random_matrix(
            InitMethod::RandomStandardNormal,
            4,
            3,
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_rank_and_mode() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = init_mode_factors(InitMethod::Zeros, &shapes(), 0, 1, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);

        let err = init_mode_factors(InitMethod::Zeros, &shapes(), 2, 3, &mut rng).unwrap_err();
        assert!(matches!(err, PenaltyError::InvalidMode { mode: 3, .. }));
    }
}
