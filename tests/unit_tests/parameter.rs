use aerosol_gde::basis::LegendreSpace;
use aerosol_gde::mesh::Mesh1d;
use aerosol_gde::parameter::{ContinuityConstraint, ParameterModel, VarModel};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;

fn constraint(ne: usize, np: usize) -> ContinuityConstraint<f64> {
    let space = LegendreSpace::new(Mesh1d::uniform(-1.0, 2.0, ne).unwrap(), np);
    ContinuityConstraint::new(&space).unwrap()
}

#[test]
fn reduced_dimension_counts_interface_constraints() {
    for (ne, np) in [(1, 1), (1, 3), (2, 2), (4, 3), (6, 1)] {
        let c = constraint(ne, np);
        assert_eq!(c.full_dim(), ne * np);
        assert_eq!(c.reduced_dim(), ne * np - (ne - 1));
    }
}

#[test]
fn var_model_transition_matches_stacked_lags() {
    let c = constraint(3, 2);
    let n = c.full_dim();
    let a1 = DMatrix::identity(n, n) * 0.6;
    let a2 = DMatrix::identity(n, n) * 0.3;
    let model = ParameterModel::new(c, VarModel::new(vec![a1, a2]).unwrap()).unwrap();
    assert_eq!(model.stacked_dim(), 2 * model.reduced_dim());

    // Continuous lags stay continuous, so the reduced transition reproduces the VAR recursion
    let u = model.constraint().u().clone();
    let lag0 = DVector::from_fn(model.reduced_dim(), |i, _| i as f64 + 1.0);
    let lag1 = DVector::from_fn(model.reduced_dim(), |i, _| 0.5 - i as f64);
    let mut stacked = DVector::zeros(model.stacked_dim());
    stacked.rows_mut(0, model.reduced_dim()).copy_from(&lag0);
    stacked.rows_mut(model.reduced_dim(), model.reduced_dim()).copy_from(&lag1);

    let next = model.reduced_transition() * &stacked;
    let expected_lag0 = &lag0 * 0.6 + &lag1 * 0.3;
    assert_matrix_eq!(next.rows(0, model.reduced_dim()).into_owned(), expected_lag0, comp = abs, tol = 1e-12);
    assert_matrix_eq!(next.rows(model.reduced_dim(), model.reduced_dim()).into_owned(), lag0.clone(), comp = abs, tol = 1e-12);

    // B U_p maps the lags to η_k + η_{k+1}
    let coupled = model.alpha_coupling() * &stacked;
    let expected = &u * &lag0 + &u * (&lag0 * 0.6 + &lag1 * 0.3);
    assert_matrix_eq!(coupled, expected, comp = abs, tol = 1e-12);
}

proptest! {
    #[test]
    fn reduction_round_trip_is_identity(values in prop::collection::vec(-10.0..10.0f64, 9)) {
        // Ne = 4, Np = 3 gives 12 - 3 = 9 reduced coefficients
        let c = constraint(4, 3);
        let v = DVector::from_vec(values);
        let round_trip = c.reduce(&c.expand(&v).unwrap()).unwrap();
        prop_assert!((round_trip - &v).amax() < 1e-10);
    }

    #[test]
    fn projection_is_idempotent_and_continuous(values in prop::collection::vec(-10.0..10.0f64, 12)) {
        let c = constraint(4, 3);
        let space = LegendreSpace::new(Mesh1d::uniform(-1.0, 2.0, 4).unwrap(), 3);
        let w = DVector::from_vec(values);
        let projected = c.project(&w).unwrap();
        let twice = c.project(&projected).unwrap();
        prop_assert!((&twice - &projected).amax() < 1e-10);
        let jumps = ContinuityConstraint::constraint_matrix(&space) * &projected;
        prop_assert!(jumps.amax() < 1e-10);
    }

    #[test]
    fn covariance_transforms_are_congruent(values in prop::collection::vec(-1.0..1.0f64, 25)) {
        let c = constraint(2, 3);
        let a = DMatrix::from_vec(5, 5, values);
        let reduced = &a * a.transpose();
        let expanded = c.expand_covariance(&reduced).unwrap();
        let back = c.reduce_covariance(&expanded).unwrap();
        prop_assert!((back - &reduced).amax() < 1e-10);
        prop_assert!((expanded.clone() - expanded.transpose()).amax() < 1e-12);
    }
}
