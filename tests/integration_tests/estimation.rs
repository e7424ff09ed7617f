use super::log_config;
use aerosol_gde::config::EstimatorConfig;
use aerosol_gde::error::{GdeError, NumericalOperation};
use aerosol_gde::estimation::{evolve, JointEstimator};
use aerosol_gde::model::{GdeModel, GdeModelBuilder, Target};
use aerosol_gde::noise::{CorrelatedNoise, ObservationNoise};
use aerosol_gde::physics::gaussian;
use aerosol_gde::rate::{stationary, Process};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

fn estimator_config(num_steps: usize, np: usize) -> EstimatorConfig<f64> {
    EstimatorConfig {
        dt: 0.05,
        num_steps,
        smoothing: true,
        alpha_prior: CorrelatedNoise::new(vec![1.0; np], 1.0),
        alpha_process: CorrelatedNoise::uncorrelated(1e-4, np),
        eta_prior: None,
        eta_process: None,
        observation: ObservationNoise::new(1e-2, 0.0),
    }
}

fn initial_condition(model: &GdeModel<f64>) -> DVector<f64> {
    let config = model.config();
    let mid = 0.5 * (config.x_min + config.x_max);
    model
        .compute_coefficients(Target::Alpha, |x| gaussian(x, 2.0, mid, 3.0))
        .unwrap()
}

#[test]
fn constant_state_is_recovered_from_identical_observations() {
    // Zero deposition makes the distribution constant in time
    let model = GdeModelBuilder::new(log_config(3, 2))
        .add_process(Process::Deposition, stationary(|_: f64| 0.0))
        .unwrap()
        .compile()
        .unwrap();
    let truth = initial_condition(&model);
    let h = DMatrix::identity(6, 6);
    let observations = vec![&h * &truth; 60];

    let mut config = estimator_config(60, 2);
    config.smoothing = false;
    config.alpha_process = CorrelatedNoise::uncorrelated(0.0, 2);
    let estimator = JointEstimator::new(&model, config, h).unwrap();
    let prior = estimator.prior(&DVector::zeros(6), None).unwrap();
    let result = estimator.run(prior, &observations).unwrap();

    let last = result.estimates().last().unwrap();
    assert_matrix_eq!(last.mean.clone(), truth, comp = abs, tol = 1e-3);
    for i in 0..6 {
        assert!(last.covariance[(i, i)] <= 1e-4);
    }
}

#[test]
fn deposition_rate_is_identified_jointly() {
    let d = 1.0;
    let truth_model = GdeModelBuilder::new(log_config(4, 2))
        .add_process(Process::Deposition, stationary(move |_: f64| d))
        .unwrap()
        .compile()
        .unwrap();
    let alpha0 = initial_condition(&truth_model);
    let num_steps = 40;
    let truth = evolve(&truth_model, &alpha0, 0.05, num_steps).unwrap();

    let model = GdeModelBuilder::new(log_config(4, 2))
        .add_unknown(Process::Deposition, 1, 1)
        .unwrap()
        .compile()
        .unwrap();
    let h = DMatrix::identity(8, 8);
    let observations: Vec<_> = truth.coefficients.iter().map(|alpha| &h * alpha).collect();

    let mut config = estimator_config(num_steps, 2);
    config.eta_prior = Some(CorrelatedNoise::uncorrelated(1.0, 1));
    config.eta_process = Some(CorrelatedNoise::uncorrelated(1e-3, 1));
    let estimator = JointEstimator::new(&model, config, h).unwrap();
    assert_eq!(estimator.layout().dim(), 9);

    let eta_guess = model.compute_coefficients(Target::Eta, |_| 0.5).unwrap();
    let prior = estimator.prior(&alpha0, Some(&eta_guess)).unwrap();
    let result = estimator.run(prior, &observations).unwrap();
    assert!(result.smoothed.is_some());
    assert_eq!(result.times.len(), num_steps);

    let unconstrained = estimator.unconstrained(&result).unwrap();
    let last = unconstrained.last().unwrap();
    let eta = last.eta.as_ref().unwrap();
    assert!((eta[0] - d).abs() < 0.05, "estimated deposition rate {}", eta[0]);
    let eta_covariance = last.eta_covariance.as_ref().unwrap();
    assert!(eta_covariance[(0, 0)] < 1.0);

    let plot = model
        .parameter_estimation_discretisation(Process::Deposition, eta, Some(eta_covariance))
        .unwrap();
    assert!(plot.values.iter().all(|&v| (v - eta[0]).abs() < 1e-12));

    for (smoothed, filtered) in result.estimates().iter().zip(&result.trajectory.filtered) {
        assert!(smoothed.covariance.trace() <= filtered.covariance.trace() + 1e-10);
    }
}

#[test]
fn continuous_deposition_field_runs_with_var_dynamics() {
    let model = GdeModelBuilder::new(log_config(3, 2))
        .add_process(Process::Condensation, stationary(|_: f64| 0.002))
        .unwrap()
        .add_unknown(Process::Deposition, 2, 2)
        .unwrap()
        .compile()
        .unwrap();
    let alpha0 = initial_condition(&model);
    let h = DMatrix::from_fn(4, 6, |i, j| if j == i || j == i + 2 { 0.5 } else { 0.0 });
    let observations = vec![&h * &alpha0; 10];

    let mut config = estimator_config(10, 2);
    config.eta_prior = Some(CorrelatedNoise::new(vec![0.5, 0.1], 1.0));
    config.eta_process = Some(CorrelatedNoise::new(vec![0.05, 0.01], 1.0));
    let n_eta = model.parameter_dim();
    let estimator = JointEstimator::new(&model, config, h)
        .unwrap()
        .with_var_coefficients(vec![
            DMatrix::identity(n_eta, n_eta) * 0.7,
            DMatrix::identity(n_eta, n_eta) * 0.2,
        ])
        .unwrap();
    // Four parameter coefficients with one continuity constraint, two lags
    assert_eq!(estimator.layout().parameter_dim(), 6);

    let eta_guess = model.compute_coefficients(Target::Eta, |dp| 0.5 + dp).unwrap();
    let prior = estimator.prior(&alpha0, Some(&eta_guess)).unwrap();
    let result = estimator.run(prior, &observations).unwrap();
    for estimate in estimator.unconstrained(&result).unwrap() {
        let eta = estimate.eta.unwrap();
        let projected = estimator.parameter_model().unwrap().constraint().project(&eta).unwrap();
        assert_matrix_eq!(projected, eta, comp = abs, tol = 1e-10);
    }
}

#[test]
fn singular_innovation_aborts_with_step() {
    let model = GdeModelBuilder::new(log_config(2, 1))
        .add_process(Process::Deposition, stationary(|_: f64| 0.1))
        .unwrap()
        .compile()
        .unwrap();
    let mut config = estimator_config(5, 1);
    config.alpha_prior = CorrelatedNoise::uncorrelated(0.0, 1);
    config.alpha_process = CorrelatedNoise::uncorrelated(0.0, 1);
    config.observation = ObservationNoise::new(0.0, 0.0);
    let estimator = JointEstimator::new(&model, config, DMatrix::identity(2, 2)).unwrap();
    let prior = estimator.prior(&DVector::from_element(2, 1.0), None).unwrap();
    let observations = vec![DVector::from_element(2, 1.0); 5];
    let error = estimator.run(prior, &observations).unwrap_err();
    assert_eq!(
        error,
        GdeError::Numerical {
            step: Some(1),
            operation: NumericalOperation::InnovationFactorization
        }
    );
}

#[test]
fn estimator_checks_call_boundaries() {
    let model = GdeModelBuilder::new(log_config(2, 2))
        .add_unknown(Process::Deposition, 1, 2)
        .unwrap()
        .compile()
        .unwrap();
    // Parameter noise is required for an unknown process
    assert!(JointEstimator::new(&model, estimator_config(5, 2), DMatrix::identity(4, 4)).is_err());

    let mut config = estimator_config(5, 2);
    config.eta_prior = Some(CorrelatedNoise::uncorrelated(1.0, 2));
    config.eta_process = Some(CorrelatedNoise::uncorrelated(0.1, 2));
    assert!(matches!(
        JointEstimator::new(&model, config.clone(), DMatrix::identity(3, 3)),
        Err(GdeError::DimensionMismatch { .. })
    ));

    let estimator = JointEstimator::new(&model, config, DMatrix::identity(4, 4)).unwrap();
    let prior = estimator
        .prior(&DVector::from_element(4, 1.0), Some(&DVector::zeros(2)))
        .unwrap();
    let too_few = vec![DVector::zeros(4); 3];
    assert!(matches!(
        estimator.run(prior, &too_few),
        Err(GdeError::DimensionMismatch { .. })
    ));
}
