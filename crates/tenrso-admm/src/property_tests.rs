//! Property-based tests for the proximal operators
//!
//! Projections must be idempotent, proximal steps of soft penalties must not
//! increase the penalty, and PARAFAC2 bases must stay orthonormal.

#[cfg(test)]
mod tests {
    use crate::init::{random_matrix, InitMethod};
    use crate::linalg::is_orthonormal;
    use crate::prox::unimodality::{is_unimodal, unimodal_regression};
    use crate::{
        AdmmPenalty, BoxConstraint, Factor, FactorMatrices, GeneralizedL2, L2Ball,
        MatricesPenalty, MatrixPenalty, NonNegativity, Parafac2, Penalty, SliceShapes,
        TemporalSmoothness, UnitSimplex, L1,
    };
    use proptest::prelude::*;
    use scirs2_core::ndarray_ext::Array2;
    use scirs2_core::random::{rngs::StdRng, SeedableRng};

    fn proptest_config() -> ProptestConfig {
        ProptestConfig {
            cases: 16,
            ..ProptestConfig::default()
        }
    }

    fn normal_matrix(seed: u64, rows: usize, cols: usize, scale: f64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        random_matrix(InitMethod::RandomStandardNormal, rows, cols, &mut rng)
            .expect("normal draw")
            .mapv(|x| scale * x)
    }

    fn assert_all_close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) -> Result<(), TestCaseError> {
        prop_assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            prop_assert!((x - y).abs() <= tol, "{} vs {}", x, y);
        }
        Ok(())
    }

    fn path_laplacian(n: usize) -> Array2<f64> {
        let mut m = Array2::zeros((n, n));
        for i in 0..n {
            if i + 1 < n {
                m[[i, i]] += 1.0;
                m[[i + 1, i + 1]] += 1.0;
                m[[i, i + 1]] -= 1.0;
                m[[i + 1, i]] -= 1.0;
            }
        }
        m
    }

    // ========================================================================
    // Hard constraints: projecting twice is projecting once
    // ========================================================================

    proptest! {
        #![proptest_config(proptest_config())]
        #[test]
        fn projections_are_idempotent(
            seed in any::<u64>(),
            rows in 2usize..12,
            cols in 1usize..5,
            rho in 0.1f64..10.0,
        ) {
            let x = normal_matrix(seed, rows, cols, 3.0);
            let projections: Vec<Box<dyn MatrixPenalty>> = vec![
                Box::new(BoxConstraint::new(-1.0, 0.5).expect("valid bounds")),
                Box::new(L2Ball::new(1.5, false).expect("valid bound")),
                Box::new(L2Ball::new(1.5, true).expect("valid bound")),
                Box::new(NonNegativity::new()),
                Box::new(UnitSimplex::new()),
            ];

            for projection in &projections {
                let once = projection.factor_matrix_update(&x.view(), rho).expect("update");
                let twice = projection.factor_matrix_update(&once.view(), rho).expect("update");
                assert_all_close(&once, &twice, 1e-9)?;
                prop_assert_eq!(projection.penalty(Factor::from(&once)).expect("penalty"), 0.0);
            }
        }
    }

    // ========================================================================
    // Soft penalties: the proximal step never increases the penalty
    // ========================================================================

    proptest! {
        #![proptest_config(proptest_config())]
        #[test]
        fn prox_does_not_increase_penalty(
            seed in any::<u64>(),
            rows in 2usize..12,
            cols in 1usize..5,
            strength in 0.0f64..2.0,
            rho in 0.1f64..10.0,
        ) {
            let x = normal_matrix(seed, rows, cols, 2.0);
            let mut soft: Vec<Box<dyn MatrixPenalty>> = vec![
                Box::new(L1::new(strength, false).expect("valid strength")),
                Box::new(L1::new(strength, true).expect("valid strength")),
                Box::new(GeneralizedL2::new(path_laplacian(rows)).expect("valid norm matrix")),
            ];
            if cfg!(feature = "total-variation") {
                soft.push(Box::new(
                    crate::TotalVariation::new(strength + 0.1, strength).expect("valid strengths"),
                ));
            }

            for penalty in &soft {
                let y = penalty.factor_matrix_update(&x.view(), rho).expect("update");
                let before = penalty.penalty(Factor::from(&x)).expect("penalty");
                let after = penalty.penalty(Factor::from(&y)).expect("penalty");
                prop_assert!(after <= before + 1e-9, "{}: {} > {}", penalty.name(), after, before);
            }
        }
    }

    proptest! {
        #![proptest_config(proptest_config())]
        #[test]
        fn temporal_smoothness_does_not_increase_penalty(
            seed in any::<u64>(),
            n_slices in 2usize..6,
            smoothness in 0.0f64..3.0,
        ) {
            let matrices = FactorMatrices::new(
                (0..n_slices)
                    .map(|k| normal_matrix(seed.wrapping_add(k as u64), 4, 3, 1.0))
                    .collect(),
            )
            .expect("regular slices");
            let rhos = vec![1.5; n_slices];
            let penalty = TemporalSmoothness::new(smoothness).expect("valid strength");

            let updated = penalty.factor_matrices_update(&matrices, &rhos).expect("update");
            let before = penalty.penalty(Factor::from(&matrices)).expect("penalty");
            let after = penalty.penalty(Factor::from(&updated)).expect("penalty");
            prop_assert!(after <= before + 1e-9);
        }
    }

    // ========================================================================
    // Serial kernels
    // ========================================================================

    proptest! {
        #![proptest_config(proptest_config())]
        #[test]
        fn unimodal_regression_is_unimodal_and_idempotent(
            values in prop::collection::vec(-10.0f64..10.0, 1..40),
            non_negativity in any::<bool>(),
        ) {
            let y = scirs2_core::ndarray_ext::Array1::from(values);
            let fit = unimodal_regression(&y.view(), non_negativity);
            prop_assert!(is_unimodal(&fit.view(), 1e-9));
            if non_negativity {
                prop_assert!(fit.iter().all(|&v| v >= 0.0));
            }

            let refit = unimodal_regression(&fit.view(), non_negativity);
            for (a, b) in fit.iter().zip(refit.iter()) {
                prop_assert!((a - b).abs() <= 1e-9);
            }
        }
    }

    // ========================================================================
    // PARAFAC2
    // ========================================================================

    proptest! {
        #![proptest_config(proptest_config())]
        #[test]
        fn parafac2_random_init_is_orthonormal(
            seed in any::<u64>(),
            rank in 1usize..5,
            extra_rows in prop::collection::vec(0usize..6, 2..5),
            normal in any::<bool>(),
        ) {
            let shapes = SliceShapes::new(
                extra_rows.iter().map(|&extra| (rank + extra, 7)).collect(),
            )
            .expect("shapes");
            let method = if normal {
                InitMethod::RandomStandardNormal
            } else {
                InitMethod::RandomUniform
            };
            let pf2 = Parafac2::default().with_aux_init(method);
            let mut rng = StdRng::seed_from_u64(seed);

            let aux = pf2.init_aux(&shapes, rank, 1, &mut rng).expect("init");
            for basis in &aux.basis_matrices {
                prop_assert!(is_orthonormal(&basis.view(), 1e-10));
            }
        }
    }

    proptest! {
        #![proptest_config(proptest_config())]
        #[test]
        fn parafac2_updates_keep_bases_orthonormal(
            seed in any::<u64>(),
            rank in 1usize..4,
            extra_rows in prop::collection::vec(0usize..4, 2..4),
            method in prop::sample::select(vec![
                InitMethod::RandomUniform,
                InitMethod::RandomStandardNormal,
                InitMethod::Zeros,
            ]),
            rho in 0.1f64..10.0,
        ) {
            let shapes = SliceShapes::new(
                extra_rows.iter().map(|&extra| (rank + extra, 5)).collect(),
            )
            .expect("shapes");
            let targets = FactorMatrices::new(
                shapes
                    .iter()
                    .enumerate()
                    .map(|(k, &(rows, _))| normal_matrix(seed.wrapping_add(k as u64), rows, rank, 1.0))
                    .collect(),
            )
            .expect("targets");
            let rhos = vec![rho; shapes.len()];
            let pf2 = Parafac2::new(2, true, true).expect("sweeps").with_aux_init(method);
            let mut rng = StdRng::seed_from_u64(seed);

            let mut aux = pf2.init_aux(&shapes, rank, 1, &mut rng).expect("init");
            for _ in 0..3 {
                aux = pf2.update_aux(&targets, &rhos, &aux).expect("update");
                for basis in &aux.basis_matrices {
                    prop_assert!(is_orthonormal(&basis.view(), 1e-9));
                }
            }
        }
    }
}
