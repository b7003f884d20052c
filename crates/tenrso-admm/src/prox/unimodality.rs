//! Unimodality constraint on the columns of a factor matrix
//!
//! A column is unimodal if it is non-decreasing up to some index and
//! non-increasing after it. The projection is a least-squares unimodal
//! regression built from two isotonic regressions:
//!
//! 1. Run pool-adjacent-violators incrementally over the column to get the
//!    error of the best non-decreasing fit of every prefix.
//! 2. Do the same on the reversed column to get the error of the best
//!    non-increasing fit of every suffix.
//! 3. Split where the summed error is smallest and fit each side.
//!
//! Everything is `O(N)` per column. With non-negativity every block mean is
//! clipped at zero, which is the exact projection onto the intersection.

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::capabilities::{require, Capability, CapabilityProvider, NativeBackend};
use crate::error::PenaltyResult;
use crate::factors::{check_feasibility_penalty, Factor, FactorMatrices};
use crate::init::AdmmInit;
use crate::penalty::{
    update_matrices_by_slice, MatricesPenalty, MatrixPenalty, Penalty, FEASIBILITY_TOL,
};

#[derive(Debug, Clone, Copy)]
struct Block {
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl Block {
    fn new(y: f64) -> Self {
        Self {
            sum: y,
            sum_sq: y * y,
            count: 1,
        }
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    fn merge(self, other: Block) -> Block {
        Block {
            sum: self.sum + other.sum,
            sum_sq: self.sum_sq + other.sum_sq,
            count: self.count + other.count,
        }
    }

    fn fitted(&self, non_negativity: bool) -> f64 {
        if non_negativity {
            self.mean().max(0.0)
        } else {
            self.mean()
        }
    }

    fn error(&self, non_negativity: bool) -> f64 {
        if non_negativity && self.mean() < 0.0 {
            self.sum_sq
        } else {
            (self.sum_sq - self.sum * self.sum / self.count as f64).max(0.0)
        }
    }
}

/// Incremental pool-adjacent-violators state
#[derive(Debug)]
struct Pava {
    blocks: Vec<Block>,
    error: f64,
    non_negativity: bool,
}

impl Pava {
    fn new(non_negativity: bool, capacity: usize) -> Self {
        Self {
            blocks: Vec::with_capacity(capacity),
            error: 0.0,
            non_negativity,
        }
    }

    fn push(&mut self, y: f64) {
        let mut block = Block::new(y);
        while let Some(&last) = self.blocks.last() {
            if last.mean() <= block.mean() {
                break;
            }
            self.blocks.pop();
            self.error -= last.error(self.non_negativity);
            block = last.merge(block);
        }
        self.error += block.error(self.non_negativity);
        self.blocks.push(block);
    }

    fn fit(&self) -> Vec<f64> {
        self.blocks
            .iter()
            .flat_map(|b| std::iter::repeat(b.fitted(self.non_negativity)).take(b.count))
            .collect()
    }
}

/// Squared error of the best non-decreasing fit of `y[..m]`, for `m = 0..=N`
fn prefix_errors<I: Iterator<Item = f64>>(values: I, len: usize, non_negativity: bool) -> Vec<f64> {
    let mut pava = Pava::new(non_negativity, len);
    let mut errors = Vec::with_capacity(len + 1);
    errors.push(0.0);
    for y in values {
        pava.push(y);
        errors.push(pava.error.max(0.0));
    }
    errors
}

/// Least-squares non-decreasing fit of `y`, optionally constrained to `≥ 0`
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_admm::prox::unimodality::isotonic_regression;
///
/// let fit = isotonic_regression(&array![3.0, 1.0, 2.0].view(), false);
/// assert_eq!(fit, array![2.0, 2.0, 2.0]);
/// ```
pub fn isotonic_regression(y: &ArrayView1<f64>, non_negativity: bool) -> Array1<f64> {
    let mut pava = Pava::new(non_negativity, y.len());
    y.iter().for_each(|&v| pava.push(v));
    Array1::from(pava.fit())
}

/// Least-squares unimodal fit of `y`, optionally constrained to `≥ 0`
///
/// Ties between split points resolve to the leftmost split.
pub fn unimodal_regression(y: &ArrayView1<f64>, non_negativity: bool) -> Array1<f64> {
    let n = y.len();
    if n == 0 {
        return Array1::zeros(0);
    }

    let increasing = prefix_errors(y.iter().copied(), n, non_negativity);
    let decreasing = prefix_errors(y.iter().rev().copied(), n, non_negativity);

    let mut split = 0;
    let mut best = f64::INFINITY;
    for m in 0..=n {
        let error = increasing[m] + decreasing[n - m];
        if error < best {
            best = error;
            split = m;
        }
    }

    let mut left = Pava::new(non_negativity, split);
    y.iter().take(split).for_each(|&v| left.push(v));
    let mut right = Pava::new(non_negativity, n - split);
    y.iter().skip(split).rev().for_each(|&v| right.push(v));

    let mut fit = left.fit();
    fit.extend(right.fit().into_iter().rev());
    Array1::from(fit)
}

/// True if `y` rises then falls, up to `tol`
pub fn is_unimodal(y: &ArrayView1<f64>, tol: f64) -> bool {
    let mut descending = false;
    for w in y.windows(2) {
        let step = w[1] - w[0];
        if descending && step > tol {
            return false;
        }
        if step < -tol {
            descending = true;
        }
    }
    true
}

/// Every column of every factor matrix is unimodal
///
/// Requires [`Capability::UnimodalRegression`].
#[derive(Debug, Clone)]
pub struct Unimodality {
    non_negativity: bool,
    init: AdmmInit,
}

impl Unimodality {
    pub fn new(non_negativity: bool) -> PenaltyResult<Self> {
        Self::with_backend(non_negativity, &NativeBackend)
    }

    pub fn with_backend<B: CapabilityProvider + ?Sized>(
        non_negativity: bool,
        backend: &B,
    ) -> PenaltyResult<Self> {
        require(backend, "Unimodality", Capability::UnimodalRegression)?;
        Ok(Self {
            non_negativity,
            init: AdmmInit::default(),
        })
    }

    pub fn with_init(mut self, init: AdmmInit) -> Self {
        self.init = init;
        self
    }

    pub fn non_negativity(&self) -> bool {
        self.non_negativity
    }

    fn is_feasible(&self, matrix: &ArrayView2<'_, f64>) -> bool {
        if self.non_negativity && matrix.iter().any(|&x| x < -FEASIBILITY_TOL) {
            return false;
        }
        matrix
            .axis_iter(Axis(1))
            .all(|col| is_unimodal(&col, FEASIBILITY_TOL))
    }
}

impl Penalty for Unimodality {
    fn name(&self) -> &'static str {
        "Unimodality"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        let infeasible = factor.sum_over_matrices(|m| if self.is_feasible(m) { 0.0 } else { 1.0 });
        Ok(if infeasible > 0.0 { f64::INFINITY } else { 0.0 })
    }
}

impl MatricesPenalty for Unimodality {
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

impl MatrixPenalty for Unimodality {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>> {
        check_feasibility_penalty(feasibility_penalty)?;

        let mut out = Array2::zeros(matrix.dim());
        for (j, column) in matrix.axis_iter(Axis(1)).enumerate() {
            out.column_mut(j)
                .assign(&unimodal_regression(&column, self.non_negativity));
        }
        Ok(out)
    }
}
