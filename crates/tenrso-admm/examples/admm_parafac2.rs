//! AO-ADMM with a PARAFAC2 coupled mode and a non-negative shared mode
//!
//! Synthetic slices `X_k = B_k diag(a_k) Cᵀ` are generated with `B_k` in
//! PARAFAC2 form and `C ≥ 0`. With `A` known, the example alternates ADMM
//! solves for the shared mode (non-negativity built from a [`PenaltyConfig`])
//! and the coupled mode (PARAFAC2 operator).
//!
//! Run with:
//! ```bash
//! RUST_LOG=tenrso_admm=debug cargo run --example admm_parafac2
//! ```

use scirs2_core::ndarray_ext::{Array1, Array2, Axis};
use scirs2_core::random::{rngs::StdRng, SeedableRng};
use tenrso_admm::init::random_matrix;
use tenrso_admm::linalg::{orthogonal_procrustes, solve_square};
use tenrso_admm::{
    AdmmPenalty, FactorMatrices, InitMethod, Parafac2, Parafac2Config, PenaltyConfig, SliceShapes,
};
use tracing_subscriber::EnvFilter;

const ROWS: [usize; 5] = [30, 35, 40, 32, 38];
const N_COLUMNS: usize = 20;
const RANK: usize = 3;
const OUTER_ITERS: usize = 40;
const INNER_ITERS: usize = 5;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut rng = StdRng::seed_from_u64(42);

    // ========================================================================
    // Synthetic PARAFAC2 data
    // ========================================================================
    let a = random_matrix(InitMethod::RandomUniform, ROWS.len(), RANK, &mut rng)?;
    let c_true = random_matrix(InitMethod::RandomUniform, N_COLUMNS, RANK, &mut rng)?;
    let coordinates = random_matrix(InitMethod::RandomStandardNormal, RANK, RANK, &mut rng)?;
    let slices: Vec<Array2<f64>> = ROWS
        .iter()
        .enumerate()
        .map(|(k, &rows)| -> anyhow::Result<Array2<f64>> {
            let draw = random_matrix(InitMethod::RandomStandardNormal, rows, RANK, &mut rng)?;
            let b_k = orthogonal_procrustes(&draw.view())?.dot(&coordinates);
            Ok(b_k.dot(&scale_columns(&c_true, &a.row(k).to_owned()).t()))
        })
        .collect::<anyhow::Result<_>>()?;
    let data_norm_sq: f64 = slices.iter().map(|x| x.iter().map(|v| v * v).sum::<f64>()).sum();

    println!("{}", "=".repeat(80));
    println!("AO-ADMM with a PARAFAC2 coupled mode");
    println!("{}", "=".repeat(80));
    println!("Slices: {} with rows {:?}, {} columns", ROWS.len(), ROWS, N_COLUMNS);
    println!("Rank: {}", RANK);
    println!();

    // ========================================================================
    // Operators and ADMM state
    // ========================================================================
    let shapes = SliceShapes::new(ROWS.iter().map(|&rows| (rows, N_COLUMNS)).collect())?;
    let pf2: Parafac2 = Parafac2Config {
        n_iter: 3,
        ..Parafac2Config::default()
    }
    .build()?;
    let non_negative = PenaltyConfig::NonNegativity.build()?;

    let mut b = FactorMatrices::new(
        ROWS.iter()
            .map(|&rows| random_matrix(InitMethod::RandomUniform, rows, RANK, &mut rng))
            .collect::<Result<_, _>>()?,
    )?;
    let mut b_aux = pf2.init_aux(&shapes, RANK, 1, &mut rng)?;
    let mut b_dual = pf2.init_dual(&shapes, RANK, 1, &mut rng)?.to_factor_matrices()?;

    let mut c = random_matrix(InitMethod::RandomUniform, N_COLUMNS, RANK, &mut rng)?;
    let mut c_aux = non_negative.init_aux(&shapes, RANK, 2, &mut rng)?;
    let c_dual_init = non_negative.init_dual(&shapes, RANK, 2, &mut rng)?;
    let mut c_dual = non_negative.aux_as_matrix(&c_dual_init, 0)?;

    for outer in 0..OUTER_ITERS {
        // Shared mode: C ≥ 0
        let mut gram = Array2::<f64>::zeros((RANK, RANK));
        let mut cross = Array2::<f64>::zeros((N_COLUMNS, RANK));
        for (k, x_k) in slices.iter().enumerate() {
            let bd = scale_columns(&b[k], &a.row(k).to_owned());
            gram = gram + bd.t().dot(&bd);
            cross = cross + x_k.t().dot(&bd);
        }
        let rho = gram.diag().sum() / RANK as f64;

        // Warm start from the previous C: project, then dual, then primal
        for _ in 0..INNER_ITERS {
            let targets = FactorMatrices::new(vec![&c + &c_dual])?;
            c_aux = non_negative.update_aux(&targets, &[rho], &c_aux)?;
            c_dual = c_dual - non_negative.subtract_from_aux(&c_aux, &c.view())?;

            let z = non_negative.aux_as_matrix(&c_aux, 0)?;
            let rhs = &cross + &((&z - &c_dual) * rho);
            let lhs = &gram + &(Array2::<f64>::eye(RANK) * rho);
            c = solve_square(&lhs.view(), &rhs.t())?.t().to_owned();
        }

        // Coupled mode: B_k with the PARAFAC2 constraint
        let grams: Vec<Array2<f64>> = (0..ROWS.len())
            .map(|k| {
                let m_k = scale_columns(&c, &a.row(k).to_owned());
                m_k.t().dot(&m_k)
            })
            .collect();
        let rhos: Vec<f64> = grams.iter().map(|g| g.diag().sum() / RANK as f64).collect();

        for _ in 0..INNER_ITERS {
            let z = pf2.auxes_as_matrices(&b_aux)?;
            let updated = (0..ROWS.len())
                .map(|k| -> anyhow::Result<Array2<f64>> {
                    let m_k = scale_columns(&c, &a.row(k).to_owned());
                    let rhs = slices[k].dot(&m_k) + (&z[k] - &b_dual[k]) * rhos[k];
                    let lhs = &grams[k] + &(Array2::<f64>::eye(RANK) * rhos[k]);
                    Ok(solve_square(&lhs.view(), &rhs.t())?.t().to_owned())
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            b = FactorMatrices::new(updated)?;

            let targets = b.try_map(|k, b_k| Ok(b_k + &b_dual[k]))?;
            b_aux = pf2.update_aux(&targets, &rhos, &b_aux)?;
            let residuals = pf2.subtract_from_auxes(&b_aux, &b)?;
            b_dual = b_dual.try_map(|k, u_k| Ok(u_k - &residuals[k]))?;
        }

        if outer % 10 == 9 || outer == OUTER_ITERS - 1 {
            let error_sq: f64 = slices
                .iter()
                .enumerate()
                .map(|(k, x_k)| {
                    let fit = scale_columns(&b[k], &a.row(k).to_owned()).dot(&c.t());
                    (x_k - &fit).iter().map(|v| v * v).sum::<f64>()
                })
                .sum();
            let feasibility = pf2
                .subtract_from_auxes(&b_aux, &b)?
                .frobenius_norm_sq()
                .sqrt();
            println!(
                "iteration {:>3}: relative error {:.3e}, PARAFAC2 gap {:.3e}, min C {:.3e}",
                outer + 1,
                (error_sq / data_norm_sq).sqrt(),
                feasibility,
                c.iter().cloned().fold(f64::INFINITY, f64::min)
            );
        }
    }

    Ok(())
}

/// `m · diag(weights)`
fn scale_columns(m: &Array2<f64>, weights: &Array1<f64>) -> Array2<f64> {
    m * &weights.view().insert_axis(Axis(0))
}
