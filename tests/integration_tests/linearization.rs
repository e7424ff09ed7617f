use super::log_config;
use aerosol_gde::jacobian::GdeJacobian;
use aerosol_gde::linearize::CrankNicolson;
use aerosol_gde::model::{GdeModel, GdeModelBuilder, Target};
use aerosol_gde::noise::CorrelatedNoise;
use aerosol_gde::parameter::{ContinuityConstraint, ParameterModel, VarModel};
use aerosol_gde::physics::gaussian;
use aerosol_gde::rate::{stationary, Process};
use aerosol_gde::state::StateLayout;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

const DEPOSITION_RATE: f64 = 0.8;
const DT: f64 = 0.1;

fn known_model() -> GdeModel<f64> {
    GdeModelBuilder::new(log_config(3, 2))
        .add_process(Process::Condensation, stationary(|_: f64| 0.01))
        .unwrap()
        .add_process(Process::Deposition, stationary(|_: f64| DEPOSITION_RATE))
        .unwrap()
        .compile()
        .unwrap()
}

fn unknown_model() -> GdeModel<f64> {
    GdeModelBuilder::new(log_config(3, 2))
        .add_process(Process::Condensation, stationary(|_: f64| 0.01))
        .unwrap()
        .add_unknown(Process::Deposition, 2, 2)
        .unwrap()
        .compile()
        .unwrap()
}

fn initial_alpha(model: &GdeModel<f64>) -> DVector<f64> {
    let config = model.config();
    let mid = 0.5 * (config.x_min + config.x_max);
    model
        .compute_coefficients(Target::Alpha, |x| gaussian(x, 50.0, mid, 2.5))
        .unwrap()
}

/// Joint state with the reduced parameters of a constant deposition rate.
fn joint_state(model: &GdeModel<f64>, parameters: &ParameterModel<f64>) -> (StateLayout, DVector<f64>) {
    let alpha = initial_alpha(model);
    let eta = model
        .compute_coefficients(Target::Eta, |_| DEPOSITION_RATE)
        .unwrap();
    let reduced = parameters.constraint().reduce(&eta).unwrap();
    let layout = StateLayout::new(model.dim(), parameters.reduced_dim(), parameters.order());
    let state = layout.compose(&alpha, &reduced).unwrap();
    (layout, state)
}

#[test]
fn joint_step_with_known_parameters_matches_known_model() {
    let known = known_model();
    let unknown = unknown_model();
    let parameters = ParameterModel::random_walk(unknown.unknown().unwrap().space()).unwrap();
    let (layout, state) = joint_state(&unknown, &parameters);
    let alpha = layout.alpha(&state);

    let expected = CrankNicolson::new(&known, DT)
        .unwrap()
        .transition(&alpha, 0.0)
        .unwrap()
        .apply(&alpha);
    let step = CrankNicolson::new(&unknown, DT)
        .unwrap()
        .joint_transition(&state, 0.0, &parameters)
        .unwrap();
    let next = step.transition.apply(&state);

    assert_matrix_eq!(layout.alpha(&next), expected, comp = abs, tol = 1e-10 * expected.amax());
    // A random walk keeps the parameter mean
    assert_matrix_eq!(layout.parameters(&next), layout.parameters(&state), comp = abs, tol = 1e-12);
}

#[test]
fn plain_transition_rejects_model_with_unknown() {
    let unknown = unknown_model();
    let alpha = initial_alpha(&unknown);
    assert!(CrankNicolson::new(&unknown, DT)
        .unwrap()
        .transition(&alpha, 0.0)
        .is_err());
}

#[test]
fn parameter_noise_enters_distribution_through_coupling() {
    let model = unknown_model();
    let unknown = model.unknown().unwrap();
    let parameters = ParameterModel::random_walk(unknown.space()).unwrap();
    let (layout, state) = joint_state(&model, &parameters);
    let n = model.dim();

    let alpha_noise = CorrelatedNoise::new(vec![0.1, 0.02], 1.0)
        .covariance(3, 2)
        .unwrap();
    let eta_noise = CorrelatedNoise::new(vec![0.05, 0.01], 1.0)
        .covariance(2, 2)
        .unwrap();
    let reduced_noise = parameters.process_noise(&eta_noise).unwrap();
    let base = layout.compose_covariance(&alpha_noise, &reduced_noise).unwrap();

    let step = CrankNicolson::new(&model, DT)
        .unwrap()
        .joint_transition(&state, 0.0, &parameters)
        .unwrap();
    let noise = step.process_noise(&base);

    // L = M (dt/2) J_η with M = (I - dt/2 J_α)⁻¹, evaluated at the unreduced state
    let eta = parameters.current(&layout.parameters(&state)).unwrap();
    let mut full = DVector::zeros(model.state_dim());
    full.rows_mut(0, n).copy_from(&layout.alpha(&state));
    full.rows_mut(n, eta.len()).copy_from(&eta);
    let jacobian = GdeJacobian::new(&model);
    let j_alpha = jacobian.eval_d_alpha(&full, 0.0).unwrap();
    let j_eta = jacobian.eval_d_eta(&full, 0.0).unwrap();
    let m = (DMatrix::identity(n, n) - &j_alpha * (DT / 2.0))
        .try_inverse()
        .unwrap();
    let l = &m * &j_eta * (DT / 2.0);
    let coupling = &l * parameters.constraint().u();

    let expected_alpha = &alpha_noise + &coupling * &reduced_noise * coupling.transpose();
    let scale = expected_alpha.amax();
    assert_matrix_eq!(layout.alpha_covariance(&noise), expected_alpha, comp = abs, tol = 1e-12 * scale);
    assert_matrix_eq!(
        layout.cross_covariance(&noise),
        &coupling * &reduced_noise,
        comp = abs,
        tol = 1e-12 * scale
    );
    assert_matrix_eq!(layout.parameter_covariance(&noise), reduced_noise, comp = abs, tol = 1e-14);
    // The mean sees both ends of the step, η_k + η_{k+1} = 2 η_k for a random walk
    assert_matrix_eq!(
        step.transition.matrix.view((0, n), (n, layout.parameter_dim())).into_owned(),
        &coupling * 2.0,
        comp = abs,
        tol = 1e-12 * coupling.amax()
    );
    assert_matrix_eq!(
        parameters.alpha_coupling().clone(),
        parameters.constraint().u() * 2.0,
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn second_order_var_couples_both_lags_into_distribution() {
    let model = unknown_model();
    let constraint = ContinuityConstraint::new(model.unknown().unwrap().space()).unwrap();
    let full = constraint.full_dim();
    let a1 = DMatrix::identity(full, full) * 0.7;
    let a2 = DMatrix::identity(full, full) * 0.2;
    let var = VarModel::new(vec![a1.clone(), a2.clone()]).unwrap();
    let parameters = ParameterModel::new(constraint, var).unwrap();
    assert_eq!(parameters.order(), 2);

    let n = model.dim();
    let nc = parameters.reduced_dim();
    let eta = model
        .compute_coefficients(Target::Eta, |_| DEPOSITION_RATE)
        .unwrap();
    let reduced = parameters.constraint().reduce(&eta).unwrap();
    let mut stacked = DVector::zeros(parameters.stacked_dim());
    stacked.rows_mut(0, nc).copy_from(&reduced);
    stacked.rows_mut(nc, nc).copy_from(&(&reduced * 0.5));
    let layout = StateLayout::new(n, nc, parameters.order());
    let state = layout.compose(&initial_alpha(&model), &stacked).unwrap();

    let step = CrankNicolson::new(&model, DT)
        .unwrap()
        .joint_transition(&state, 0.0, &parameters)
        .unwrap();

    // B U_p = [(A1 + I) U, A2 U]
    let u = parameters.constraint().u();
    let mut coupling = DMatrix::zeros(full, 2 * nc);
    coupling
        .view_mut((0, 0), (full, nc))
        .copy_from(&((&a1 + DMatrix::identity(full, full)) * u));
    coupling.view_mut((0, nc), (full, nc)).copy_from(&(&a2 * u));
    assert_matrix_eq!(parameters.alpha_coupling().clone(), coupling, comp = abs, tol = 1e-14);

    // L = M (dt/2) J_η, with J_η evaluated at the current lag only
    let mut current = DVector::zeros(model.state_dim());
    current.rows_mut(0, n).copy_from(&layout.alpha(&state));
    current.rows_mut(n, full).copy_from(&eta);
    let jacobian = GdeJacobian::new(&model);
    let j_alpha = jacobian.eval_d_alpha(&current, 0.0).unwrap();
    let j_eta = jacobian.eval_d_eta(&current, 0.0).unwrap();
    let m = (DMatrix::identity(n, n) - &j_alpha * (DT / 2.0))
        .try_inverse()
        .unwrap();
    let l = &m * &j_eta * (DT / 2.0);

    let expected = &l * &coupling;
    assert_matrix_eq!(
        step.transition.matrix.view((0, n), (n, layout.parameter_dim())).into_owned(),
        expected,
        comp = abs,
        tol = 1e-12 * expected.amax()
    );
    assert_matrix_eq!(
        step.transition.matrix.view((n, n), (2 * nc, 2 * nc)).into_owned(),
        parameters.reduced_transition().clone(),
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn joint_step_checks_parameter_dimensions() {
    let model = unknown_model();
    let other = GdeModelBuilder::new(log_config(3, 2))
        .add_unknown(Process::Deposition, 3, 2)
        .unwrap()
        .compile()
        .unwrap();
    let parameters = ParameterModel::random_walk(other.unknown().unwrap().space()).unwrap();
    let layout = StateLayout::new(model.dim(), parameters.reduced_dim(), parameters.order());
    let state = DVector::zeros(layout.dim());
    assert!(CrankNicolson::new(&model, DT)
        .unwrap()
        .joint_transition(&state, 0.0, &parameters)
        .is_err());
}
