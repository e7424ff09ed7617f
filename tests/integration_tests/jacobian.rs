use super::{linear_config, log_config};
use aerosol_gde::jacobian::GdeJacobian;
use aerosol_gde::model::{CoagulationSource, GdeModel, GdeModelBuilder};
use aerosol_gde::physics::FuchsBrownian;
use aerosol_gde::rate::{stationary, time_dependent, NamedKernel, Process};
use aerosol_gde::config::ScaleType;
use matrixcompare::assert_matrix_eq;
use nalgebra::DVector;

fn sample_state(dim: usize) -> DVector<f64> {
    DVector::from_fn(dim, |i, _| 1.0 + 0.5 * ((i as f64) * 1.3).sin())
}

/// Compares the analytic Jacobian with central differences. The model is at most
/// quadratic in the state, so central differences are exact up to round-off.
fn assert_jacobian_matches_finite_differences(model: &GdeModel<f64>, time: f64) {
    let jacobian = GdeJacobian::new(model);
    let state = sample_state(model.state_dim());
    let analytic = jacobian.eval_d_state(&state, time).unwrap();
    let approximate = jacobian.approximate(&state, time, 1e-4).unwrap();
    let scale = analytic.amax().max(1.0);
    assert_matrix_eq!(analytic, approximate, comp = abs, tol = 1e-7 * scale);
}

#[test]
fn condensation_jacobian_matches_finite_differences() {
    let model = GdeModelBuilder::new(log_config(5, 3))
        .add_process(Process::Condensation, stationary(|dp: f64| 0.002 + 0.01 * dp))
        .unwrap()
        .compile()
        .unwrap();
    assert_jacobian_matches_finite_differences(&model, 0.0);
}

#[test]
fn shrinking_time_dependent_condensation_matches_finite_differences() {
    let model = GdeModelBuilder::new(linear_config(4, 2))
        .add_process(Process::Condensation, time_dependent(|dp: f64, t: f64| (t - 1.0) * 0.1 * dp))
        .unwrap()
        .compile()
        .unwrap();
    assert_jacobian_matches_finite_differences(&model, 0.25);
    assert_jacobian_matches_finite_differences(&model, 2.0);
}

#[test]
fn deposition_jacobian_matches_finite_differences() {
    let model = GdeModelBuilder::new(log_config(4, 3))
        .add_process(Process::Deposition, stationary(|dp: f64| 0.1 + 0.01 / dp))
        .unwrap()
        .compile()
        .unwrap();
    assert_jacobian_matches_finite_differences(&model, 0.0);
}

#[test]
fn coagulation_jacobian_matches_finite_differences() {
    let model = GdeModelBuilder::new(linear_config(4, 2))
        .add_coagulation(
            NamedKernel::new("product", |x: f64, y: f64| 0.1 * x * y),
            CoagulationSource::Compute,
        )
        .unwrap()
        .compile()
        .unwrap();
    assert_jacobian_matches_finite_differences(&model, 0.0);

    let config = log_config(3, 2).with_coagulation_quadrature(3, 2);
    let model = GdeModelBuilder::new(config)
        .add_coagulation(FuchsBrownian::new(ScaleType::Log), CoagulationSource::Compute)
        .unwrap()
        .compile()
        .unwrap();
    assert_jacobian_matches_finite_differences(&model, 0.0);
}

#[test]
fn unknown_deposition_jacobian_matches_finite_differences() {
    let model = GdeModelBuilder::new(log_config(4, 2))
        .add_process(Process::Condensation, stationary(|_: f64| 0.005))
        .unwrap()
        .add_unknown(Process::Deposition, 3, 2)
        .unwrap()
        .compile()
        .unwrap();
    assert_jacobian_matches_finite_differences(&model, 0.0);
}

#[test]
fn unknown_condensation_jacobian_matches_finite_differences() {
    let model = GdeModelBuilder::new(log_config(4, 2))
        .add_unknown(Process::Condensation, 2, 2)
        .unwrap()
        .compile()
        .unwrap();
    assert_jacobian_matches_finite_differences(&model, 0.0);
}

#[test]
fn evaluation_is_recovered_from_jacobians_and_bilinear_part() {
    // F(α, η) = L α + Σ η_k A_k α, so J_α α + J_η η = F + Σ η_k A_k α
    let model = GdeModelBuilder::new(log_config(3, 2))
        .add_process(Process::Deposition, stationary(|_: f64| 0.2))
        .unwrap()
        .add_unknown(Process::Condensation, 2, 2)
        .unwrap()
        .compile()
        .unwrap();
    let jacobian = GdeJacobian::new(&model);
    let state = sample_state(model.state_dim());
    let (alpha, eta) = model.split_state(&state).unwrap();
    let eta = eta.unwrap();
    let linearised = jacobian.eval_d_alpha(&state, 0.0).unwrap() * &alpha
        + jacobian.eval_d_eta(&state, 0.0).unwrap() * &eta;
    let bilinear = model.unknown_operator(&eta).unwrap() * &alpha;
    let evaluated = model.eval(&state, 0.0).unwrap();
    assert_matrix_eq!(linearised, evaluated + bilinear, comp = abs, tol = 1e-9 * linearised.amax().max(1.0));
}
