//! Total variation (fused lasso) penalty down the columns of a factor matrix
//!
//! ```text
//! reg_strength · Σⱼ Σᵢ |x[i+1, j] - x[i, j]|  +  l1_strength · Σ |x|
//! ```
//!
//! The proximal step is solved exactly per column: Condat's direct 1-D total
//! variation algorithm at `reg_strength / ρ`, followed by soft thresholding at
//! `l1_strength / ρ` (the fused lasso signal approximator decomposes this
//! way). Columns are independent; adjacent rows are coupled.

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::capabilities::{require, Capability, CapabilityProvider, NativeBackend};
use crate::error::{PenaltyError, PenaltyResult};
use crate::factors::{check_feasibility_penalty, Factor, FactorMatrices};
use crate::init::AdmmInit;
use crate::penalty::{update_matrices_by_slice, MatricesPenalty, MatrixPenalty, Penalty};
use crate::prox::l1::soft_threshold;

/// Exact solution of `argmin_y ½‖y - x‖² + λ Σ|y[i+1] - y[i]|`
///
/// Condat, "A direct algorithm for 1D total variation denoising", IEEE
/// Signal Processing Letters 20(11), 2013. Runs in `O(N)` in practice.
/// A non-positive `lambda` returns a copy of the input.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use tenrso_admm::prox::total_variation::tv_denoise;
///
/// let y = tv_denoise(&array![0.0, 1.0].view(), 1.0);
/// assert_eq!(y, array![0.5, 0.5]);
/// ```
pub fn tv_denoise(input: &ArrayView1<f64>, lambda: f64) -> Array1<f64> {
    let width = input.len();
    if width == 0 || lambda <= 0.0 {
        return input.to_owned();
    }

    let x = input;
    let mut output = Array1::zeros(width);

    // k: current sample, k0: start of the current segment
    let mut k = 0usize;
    let mut k0 = 0usize;
    // u: dual variable, [vmin, vmax]: admissible values of the current segment
    let mut umin = lambda;
    let mut umax = -lambda;
    let mut vmin = x[0] - lambda;
    let mut vmax = x[0] + lambda;
    // last positions where umax = -λ and umin = λ
    let mut kplus = 0usize;
    let mut kminus = 0usize;
    let two_lambda = 2.0 * lambda;
    let min_lambda = -lambda;

    loop {
        while k == width - 1 {
            if umin < 0.0 {
                // vmin too high: negative jump
                loop {
                    output[k0] = vmin;
                    k0 += 1;
                    if k0 > kminus {
                        break;
                    }
                }
                k = k0;
                kminus = k0;
                vmin = x[k0];
                umin = lambda;
                umax = vmin + umin - vmax;
            } else if umax > 0.0 {
                // vmax too low: positive jump
                loop {
                    output[k0] = vmax;
                    k0 += 1;
                    if k0 > kplus {
                        break;
                    }
                }
                k = k0;
                kplus = k0;
                vmax = x[k0];
                umax = min_lambda;
                umin = vmax + umax - vmin;
            } else {
                vmin += umin / (k - k0 + 1) as f64;
                loop {
                    output[k0] = vmin;
                    k0 += 1;
                    if k0 > k {
                        break;
                    }
                }
                return output;
            }
        }

        umin += x[k + 1] - vmin;
        if umin < min_lambda {
            loop {
                output[k0] = vmin;
                k0 += 1;
                if k0 > kminus {
                    break;
                }
            }
            k = k0;
            kminus = k0;
            kplus = k0;
            vmin = x[k0];
            vmax = vmin + two_lambda;
            umin = lambda;
            umax = min_lambda;
            continue;
        }

        umax += x[k + 1] - vmax;
        if umax > lambda {
            loop {
                output[k0] = vmax;
                k0 += 1;
                if k0 > kplus {
                    break;
                }
            }
            k = k0;
            kminus = k0;
            kplus = k0;
            vmax = x[k0];
            vmin = vmax - two_lambda;
            umin = lambda;
            umax = min_lambda;
            continue;
        }

        k += 1;
        if umin >= lambda {
            kminus = k;
            vmin += (umin - lambda) / (kminus - k0 + 1) as f64;
            umin = lambda;
        }
        if umax <= min_lambda {
            kplus = k;
            vmax += (umax + lambda) / (kplus - k0 + 1) as f64;
            umax = min_lambda;
        }
    }
}

/// Column-wise total variation with an optional L1 term
///
/// Requires [`Capability::TotalVariation`]; construction fails with
/// [`PenaltyError::MissingCapability`] when the backend lacks it.
#[derive(Debug, Clone)]
pub struct TotalVariation {
    reg_strength: f64,
    l1_strength: f64,
    init: AdmmInit,
}

impl TotalVariation {
    pub fn new(reg_strength: f64, l1_strength: f64) -> PenaltyResult<Self> {
        Self::with_backend(reg_strength, l1_strength, &NativeBackend)
    }

    /// Construct against an explicit capability provider
    pub fn with_backend<B: CapabilityProvider + ?Sized>(
        reg_strength: f64,
        l1_strength: f64,
        backend: &B,
    ) -> PenaltyResult<Self> {
        if !(reg_strength.is_finite() && reg_strength > 0.0) {
            return Err(PenaltyError::invalid_parameter(
                "TotalVariation",
                "reg_strength",
                format!("must be positive and finite, got {}", reg_strength),
            ));
        }
        if !(l1_strength.is_finite() && l1_strength >= 0.0) {
            return Err(PenaltyError::invalid_parameter(
                "TotalVariation",
                "l1_strength",
                format!("must be non-negative and finite, got {}", l1_strength),
            ));
        }
        require(backend, "TotalVariation", Capability::TotalVariation)?;

        Ok(Self {
            reg_strength,
            l1_strength,
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

    pub fn l1_strength(&self) -> f64 {
        self.l1_strength
    }

    fn matrix_penalty(&self, matrix: &ArrayView2<f64>) -> f64 {
        let variation: f64 = matrix
            .axis_iter(Axis(1))
            .map(|col| col.windows(2).into_iter().map(|w| (w[1] - w[0]).abs()).sum::<f64>())
            .sum();
        let l1: f64 = matrix.iter().map(|x| x.abs()).sum();
        self.reg_strength * variation + self.l1_strength * l1
    }
}

impl Penalty for TotalVariation {
    fn name(&self) -> &'static str {
        "TotalVariation"
    }

    fn penalty(&self, factor: Factor<'_>) -> PenaltyResult<f64> {
        Ok(factor.sum_over_matrices(|m| self.matrix_penalty(m)))
    }
}

impl MatricesPenalty for TotalVariation {
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

impl MatrixPenalty for TotalVariation {
    fn factor_matrix_update(
        &self,
        matrix: &ArrayView2<f64>,
        feasibility_penalty: f64,
    ) -> PenaltyResult<Array2<f64>> {
        check_feasibility_penalty(feasibility_penalty)?;
        let lambda = self.reg_strength / feasibility_penalty;
        let threshold = self.l1_strength / feasibility_penalty;

        let mut out = Array2::zeros(matrix.dim());
        for (j, column) in matrix.axis_iter(Axis(1)).enumerate() {
            let mut denoised = tv_denoise(&column, lambda);
            if threshold > 0.0 {
                denoised.mapv_inplace(|x| soft_threshold(x, threshold));
            }
            out.column_mut(j).assign(&denoised);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use scirs2_core::ndarray_ext::{array, s};

    fn assert_close(a: &Array1<f64>, b: &Array1<f64>) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-10, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_tv_denoise_small_jump_is_shrunk() {
        let y = tv_denoise(&array![0.0, 1.0].view(), 0.25);
        assert_close(&y, &array![0.25, 0.75]);
    }

    #[test]
    fn test_tv_denoise_constant_signal_is_invariant() {
        let x = Array1::from_elem(7, 3.5);
        assert_close(&tv_denoise(&x.view(), 2.0), &x);
    }

    #[test]
    fn test_tv_denoise_large_lambda_gives_mean() {
        let x = array![1.0, 4.0, -2.0, 5.0];
        let y = tv_denoise(&x.view(), 100.0);
        assert_close(&y, &Array1::from_elem(4, 2.0));
    }

    #[test]
    fn test_tv_denoise_preserves_mean() {
        let x = array![0.3, 2.0, 1.1, -0.4, 0.9, 3.0];
        let y = tv_denoise(&x.view(), 0.3);
        assert!((x.sum() - y.sum()).abs() < 1e-10);
    }

    #[test]
    fn test_tv_denoise_degenerate_inputs() {
        let single = array![4.0];
        assert_close(&tv_denoise(&single.view(), 1.0), &single);
        let x = array![1.0, -1.0];
        assert_close(&tv_denoise(&x.view(), 0.0), &x);
    }

    #[test]
    #[cfg(feature = "total-variation")]
    fn test_penalty_fixtures() {
        let (rows, cols) = (7, 5);
        let tv = TotalVariation::new(1.0, 1.0).unwrap();
        let pen = |x: &Array2<f64>| tv.penalty(Factor::from(x)).unwrap();
        let abs_sum = |x: &Array2<f64>| x.iter().map(|v| v.abs()).sum::<f64>();

        assert_eq!(pen(&Array2::zeros((rows, cols))), 0.0);

        let ones = Array2::ones((rows, cols));
        assert!((pen(&ones) - abs_sum(&ones)).abs() < 1e-12);

        let mut interior = ones.clone();
        interior[[rows / 2, cols / 2]] = 0.0;
        assert!((pen(&interior) - abs_sum(&interior) - 2.0).abs() < 1e-12);

        let mut boundary = ones.clone();
        boundary[[0, cols / 2]] = 0.0;
        assert!((pen(&boundary) - abs_sum(&boundary) - 1.0).abs() < 1e-12);

        let mut step = ones.clone();
        step.slice_mut(s![..rows / 2, ..]).fill(0.0);
        assert!((pen(&step) - abs_sum(&step) - cols as f64).abs() < 1e-12);
    }

    #[test]
    #[cfg(feature = "total-variation")]
    fn test_constant_columns_have_no_variation() {
        let tv = TotalVariation::new(1.0, 0.0).unwrap();
        let x = Array2::from_shape_fn((6, 3), |(_, j)| j as f64 + 0.5);
        assert_eq!(tv.penalty(Factor::from(&x)).unwrap(), 0.0);
    }

    #[test]
    #[cfg(feature = "total-variation")]
    fn test_l1_is_applied() {
        let ones = Array2::<f64>::ones((10, 3));

        let without_l1 = TotalVariation::new(1.0, 0.0).unwrap();
        let out = without_l1.factor_matrix_update(&ones.view(), 1.0).unwrap();
        for (a, b) in ones.iter().zip(out.iter()) {
            assert!((a - b).abs() < 1e-12);
        }

        let with_l1 = TotalVariation::new(1.0, 1000.0).unwrap();
        let out = with_l1.factor_matrix_update(&ones.view(), 1.0).unwrap();
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_input_is_checked() {
        assert_eq!(
            TotalVariation::new(0.0, 1.0).unwrap_err().kind(),
            ErrorKind::Value
        );
        assert!(TotalVariation::new(-1.0, 1.0).is_err());
        assert!(TotalVariation::new(1.0, -1.0).is_err());
    }
}
