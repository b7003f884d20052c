//! Factor containers shared by all operators
//!
//! - [`FactorMatrices`]: an ordered, possibly ragged list of `Nₖ × R` matrices
//!   sharing one rank `R`. The shared rank is checked once, on construction.
//! - [`Factor`]: a borrowed view of a row, a matrix or a list, used for
//!   penalty evaluation and shape-class checks.
//! - [`SliceShapes`]: the shapes of the data slices `Xₖ` (`Jₖ × K`) a coupled
//!   model is fitted to, from which mode-shaped aux/dual variables are derived.

use std::fmt;
use std::ops::Index;

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{PenaltyError, PenaltyResult};

/// Shape class of a factor argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorKind {
    Row,
    Matrix,
    Matrices,
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorKind::Row => write!(f, "row vector"),
            FactorKind::Matrix => write!(f, "factor matrix"),
            FactorKind::Matrices => write!(f, "list of factor matrices"),
        }
    }
}

/// Ordered list of factor matrices with a common number of columns
///
/// Row counts may differ between slices. The order is significant: operators
/// such as temporal smoothness couple neighbouring slices.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::Array2;
/// use tenrso_admm::FactorMatrices;
///
/// let factors = FactorMatrices::new(vec![
///     Array2::<f64>::zeros((4, 2)),
///     Array2::<f64>::zeros((6, 2)),
/// ])?;
/// assert_eq!(factors.rank(), 2);
/// assert_eq!(factors.len(), 2);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FactorMatrices {
    matrices: Vec<Array2<f64>>,
    rank: usize,
}

impl FactorMatrices {
    /// Wrap a list of matrices, checking that it is non-empty and that all
    /// matrices have the same number of columns
    pub fn new(matrices: Vec<Array2<f64>>) -> PenaltyResult<Self> {
        let rank = match matrices.first() {
            Some(first) => first.ncols(),
            None => {
                return Err(PenaltyError::ShapeMismatch(
                    "factor matrix list must contain at least one matrix".to_string(),
                ))
            }
        };

        for (k, matrix) in matrices.iter().enumerate() {
            if matrix.ncols() != rank {
                return Err(PenaltyError::ShapeMismatch(format!(
                    "factor matrix {} has {} columns, expected {}",
                    k,
                    matrix.ncols(),
                    rank
                )));
            }
        }

        Ok(Self { matrices, rank })
    }

    /// Number of columns shared by all slices
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of slices
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn get(&self, k: usize) -> Option<&Array2<f64>> {
        self.matrices.get(k)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Array2<f64>> {
        self.matrices.iter()
    }

    pub fn as_slice(&self) -> &[Array2<f64>] {
        &self.matrices
    }

    pub fn into_inner(self) -> Vec<Array2<f64>> {
        self.matrices
    }

    /// `(rows, rank)` of every slice
    pub fn shapes(&self) -> Vec<(usize, usize)> {
        self.matrices.iter().map(|m| m.dim()).collect()
    }

    /// True when every slice has the same number of rows
    pub fn is_regular(&self) -> bool {
        let rows = self.matrices[0].nrows();
        self.matrices.iter().all(|m| m.nrows() == rows)
    }

    /// Apply `f` slice by slice, producing a new list
    pub fn try_map<F>(&self, mut f: F) -> PenaltyResult<Self>
    where
        F: FnMut(usize, &Array2<f64>) -> PenaltyResult<Array2<f64>>,
    {
        let matrices = self
            .matrices
            .iter()
            .enumerate()
            .map(|(k, m)| f(k, m))
            .collect::<PenaltyResult<Vec<_>>>()?;
        Self::new(matrices)
    }

    /// Sum of squared entries over all slices
    pub fn frobenius_norm_sq(&self) -> f64 {
        self.matrices
            .iter()
            .map(|m| m.iter().map(|&x| x * x).sum::<f64>())
            .sum()
    }

    /// Slice-wise difference `self[k] - other[k]`
    pub fn difference(&self, other: &FactorMatrices) -> PenaltyResult<Self> {
        if self.shapes() != other.shapes() {
            return Err(PenaltyError::ShapeMismatch(format!(
                "cannot subtract factor lists with shapes {:?} and {:?}",
                self.shapes(),
                other.shapes()
            )));
        }
        Self::new(
            self.matrices
                .iter()
                .zip(other.iter())
                .map(|(a, b)| a - b)
                .collect(),
        )
    }
}

impl Index<usize> for FactorMatrices {
    type Output = Array2<f64>;

    fn index(&self, k: usize) -> &Array2<f64> {
        &self.matrices[k]
    }
}

impl<'a> IntoIterator for &'a FactorMatrices {
    type Item = &'a Array2<f64>;
    type IntoIter = std::slice::Iter<'a, Array2<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.matrices.iter()
    }
}

/// Borrowed factor argument for penalty evaluation
#[derive(Debug, Clone, Copy)]
pub enum Factor<'a> {
    Row(ArrayView1<'a, f64>),
    Matrix(ArrayView2<'a, f64>),
    Matrices(&'a FactorMatrices),
}

impl<'a> Factor<'a> {
    pub fn kind(&self) -> FactorKind {
        match self {
            Factor::Row(_) => FactorKind::Row,
            Factor::Matrix(_) => FactorKind::Matrix,
            Factor::Matrices(_) => FactorKind::Matrices,
        }
    }

    /// Sum a per-matrix value over the argument
    ///
    /// A row is treated as a `1 × R` matrix and a list contributes the sum
    /// over its slices.
    pub fn sum_over_matrices<F>(&self, mut f: F) -> f64
    where
        F: FnMut(&ArrayView2<'_, f64>) -> f64,
    {
        match self {
            Factor::Row(row) => f(&row.view().insert_axis(Axis(0))),
            Factor::Matrix(matrix) => f(matrix),
            Factor::Matrices(matrices) => matrices.iter().map(|m| f(&m.view())).sum(),
        }
    }
}

impl<'a> From<&'a Array1<f64>> for Factor<'a> {
    fn from(row: &'a Array1<f64>) -> Self {
        Factor::Row(row.view())
    }
}

impl<'a> From<ArrayView1<'a, f64>> for Factor<'a> {
    fn from(row: ArrayView1<'a, f64>) -> Self {
        Factor::Row(row)
    }
}

impl<'a> From<&'a Array2<f64>> for Factor<'a> {
    fn from(matrix: &'a Array2<f64>) -> Self {
        Factor::Matrix(matrix.view())
    }
}

impl<'a> From<ArrayView2<'a, f64>> for Factor<'a> {
    fn from(matrix: ArrayView2<'a, f64>) -> Self {
        Factor::Matrix(matrix)
    }
}

impl<'a> From<&'a FactorMatrices> for Factor<'a> {
    fn from(matrices: &'a FactorMatrices) -> Self {
        Factor::Matrices(matrices)
    }
}

/// Shapes `(Jₖ, K)` of the data slices of a coupled matrix factorization
///
/// Slices may have different row counts but share the column count `K`.
/// For a rank-`R` model the factor shapes per mode are:
/// - mode 0: one `I × R` matrix, `I` = number of slices
/// - mode 1: one `Jₖ × R` matrix per slice
/// - mode 2: one `K × R` matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceShapes {
    shapes: Vec<(usize, usize)>,
}

impl SliceShapes {
    pub fn new(shapes: Vec<(usize, usize)>) -> PenaltyResult<Self> {
        let n_columns = match shapes.first() {
            Some(&(_, cols)) => cols,
            None => {
                return Err(PenaltyError::ShapeMismatch(
                    "at least one data slice is required".to_string(),
                ))
            }
        };

        if let Some(k) = shapes.iter().position(|&(_, cols)| cols != n_columns) {
            return Err(PenaltyError::ShapeMismatch(format!(
                "data slice {} has {} columns, expected {}",
                k, shapes[k].1, n_columns
            )));
        }

        Ok(Self { shapes })
    }

    /// Shapes of a list of data matrices
    pub fn from_matrices(matrices: &[Array2<f64>]) -> PenaltyResult<Self> {
        Self::new(matrices.iter().map(|m| m.dim()).collect())
    }

    /// Number of slices
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Row count of slice `k`
    pub fn rows(&self, k: usize) -> usize {
        self.shapes[k].0
    }

    /// Column count shared by all slices
    pub fn n_columns(&self) -> usize {
        self.shapes[0].1
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, usize)> {
        self.shapes.iter()
    }
}

/// Check a single feasibility weight
pub fn check_feasibility_penalty(feasibility_penalty: f64) -> PenaltyResult<()> {
    if feasibility_penalty.is_finite() && feasibility_penalty > 0.0 {
        Ok(())
    } else {
        Err(PenaltyError::invalid_parameter(
            "ADMM update",
            "feasibility_penalty",
            format!("must be positive and finite, got {}", feasibility_penalty),
        ))
    }
}

/// Check one feasibility weight per slice
pub fn check_feasibility_penalties(
    feasibility_penalties: &[f64],
    n_slices: usize,
) -> PenaltyResult<()> {
    if feasibility_penalties.len() != n_slices {
        return Err(PenaltyError::ShapeMismatch(format!(
            "got {} feasibility penalties for {} factor matrices",
            feasibility_penalties.len(),
            n_slices
        )));
    }
    feasibility_penalties
        .iter()
        .try_for_each(|&rho| check_feasibility_penalty(rho))
}
