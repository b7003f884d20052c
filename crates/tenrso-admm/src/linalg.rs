//! Dense numeric kernels used by the operators
//!
//! Thin wrappers over `scirs2_linalg` so that every eigendecomposition and
//! linear solve in the crate goes through one place.

use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView2};
use scirs2_linalg::{eigh, solve_multiple};

use crate::error::{PenaltyError, PenaltyResult};

/// Absolute tolerance used when checking `PᵀP = I`
pub const ORTHONORMALITY_TOL: f64 = 1e-8;

/// Relative size below which a direction of the Procrustes target counts as zero
pub const RANK_TOL: f64 = 1e-10;

/// Closest matrix with orthonormal columns to `target` in Frobenius norm
///
/// The solution is the polar factor `U Vᵀ` of `target = U Σ Vᵀ`, built from
/// the symmetric eigendecomposition `targetᵀ target = V Σ² Vᵀ` with
/// `U = target V Σ⁻¹`. Directions where `target` vanishes have no unique
/// answer; they are completed with standard basis vectors, so the result is
/// orthonormal even for a zero or rank-deficient target. When `target` has
/// fewer rows than columns the result has orthonormal rows instead.
pub fn orthogonal_procrustes(target: &ArrayView2<f64>) -> PenaltyResult<Array2<f64>> {
    orthogonal_procrustes_with_fallback(target, None)
}

/// [`orthogonal_procrustes`] that completes degenerate directions from `fallback`
///
/// `fallback` must have the shape of `target`. Each direction `vᵢ` in which
/// `target` vanishes is filled with `fallback · vᵢ` when that is independent
/// of the columns already chosen, and with a standard basis vector otherwise.
/// For a zero target and an orthonormal `fallback` the result is `fallback`.
pub fn orthogonal_procrustes_with_fallback(
    target: &ArrayView2<f64>,
    fallback: Option<&ArrayView2<f64>>,
) -> PenaltyResult<Array2<f64>> {
    let (rows, cols) = target.dim();
    if let Some(fallback) = fallback {
        if fallback.dim() != (rows, cols) {
            return Err(PenaltyError::ShapeMismatch(format!(
                "Procrustes fallback has shape {:?}, target has shape {:?}",
                fallback.dim(),
                (rows, cols)
            )));
        }
    }
    if rows < cols {
        let fallback_t = fallback.map(|f| f.t());
        return Ok(
            orthogonal_procrustes_with_fallback(&target.t(), fallback_t.as_ref())?
                .reversed_axes(),
        );
    }
    if cols == 0 {
        return Ok(Array2::zeros((rows, cols)));
    }

    let gram = target.t().dot(target);
    let (eigenvalues, eigenvectors) = eigh(&gram.view(), None)?;

    // Strongest directions first so that weak ones are orthogonalized against them
    let mut order: Vec<usize> = (0..cols).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));
    let mut v_columns: Vec<Option<Array1<f64>>> = vec![None; cols];
    for (slot, &i) in order.iter().enumerate() {
        let mut v_i = eigenvectors.column(i).to_owned();
        orthogonalize(&mut v_i, &v_columns);
        let residual = vector_norm(&v_i);
        v_columns[slot] = Some(if residual > 0.5 {
            v_i / residual
        } else {
            standard_completion(cols, &v_columns)
        });
    }
    let v = stack_columns(cols, &v_columns);

    let images: Vec<Array1<f64>> = v.columns().into_iter().map(|v_i| target.dot(&v_i)).collect();
    let scale = images.iter().map(vector_norm).fold(0.0, f64::max);
    let cutoff = RANK_TOL * scale;

    let mut basis: Vec<Option<Array1<f64>>> = vec![None; cols];
    for (slot, image) in images.into_iter().enumerate() {
        let norm = vector_norm(&image);
        if scale == 0.0 || norm <= cutoff {
            continue;
        }
        let mut u = image / norm;
        orthogonalize(&mut u, &basis);
        let residual = vector_norm(&u);
        if residual > 0.5 {
            basis[slot] = Some(u / residual);
        }
    }

    for slot in 0..cols {
        if basis[slot].is_some() {
            continue;
        }
        let from_fallback = fallback.and_then(|f| {
            let mut u = f.dot(&v.column(slot));
            orthogonalize(&mut u, &basis);
            let residual = vector_norm(&u);
            (residual > 0.5).then(|| u / residual)
        });
        let completion = match from_fallback {
            Some(u) => u,
            None => standard_completion(rows, &basis),
        };
        basis[slot] = Some(completion);
    }

    Ok(stack_columns(rows, &basis).dot(&v.t()))
}

fn stack_columns(rows: usize, columns: &[Option<Array1<f64>>]) -> Array2<f64> {
    let mut out = Array2::zeros((rows, columns.len()));
    for (slot, column) in columns.iter().enumerate() {
        if let Some(column) = column {
            out.column_mut(slot).assign(column);
        }
    }
    out
}

fn vector_norm(x: &Array1<f64>) -> f64 {
    x.dot(x).sqrt()
}

/// Remove the components of `x` along the chosen columns (two passes)
fn orthogonalize(x: &mut Array1<f64>, basis: &[Option<Array1<f64>>]) {
    for _ in 0..2 {
        for b in basis.iter().flatten() {
            let c = b.dot(x);
            x.scaled_add(-c, b);
        }
    }
}

/// The standard basis vector with the largest component outside the chosen columns
fn standard_completion(rows: usize, basis: &[Option<Array1<f64>>]) -> Array1<f64> {
    let mut best = Array1::zeros(rows);
    let mut best_norm = 0.0;
    for j in 0..rows {
        let mut e = Array1::zeros(rows);
        e[j] = 1.0;
        orthogonalize(&mut e, basis);
        let norm = vector_norm(&e);
        if norm > best_norm {
            best_norm = norm;
            best = e;
        }
    }
    best / best_norm
}

/// True if `PᵀP` is the identity up to `tol` entrywise
pub fn is_orthonormal(matrix: &ArrayView2<f64>, tol: f64) -> bool {
    let gram = matrix.t().dot(matrix);
    gram.indexed_iter().all(|((i, j), &value)| {
        let expected = if i == j { 1.0 } else { 0.0 };
        (value - expected).abs() <= tol
    })
}

/// Solve `A X = B` for a square `A` and a block of right-hand sides
pub fn solve_square(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> PenaltyResult<Array2<f64>> {
    if a.nrows() != a.ncols() || a.nrows() != b.nrows() {
        return Err(PenaltyError::ShapeMismatch(format!(
            "cannot solve a system with matrix {:?} and right-hand side {:?}",
            a.dim(),
            b.dim()
        )));
    }
    Ok(solve_multiple(a, b, None)?)
}

/// Sum of squared entries
pub fn frobenius_norm_sq(matrix: &ArrayView2<f64>) -> f64 {
    matrix.iter().map(|&x| x * x).sum()
}
