//! Joint estimation of the size distribution and a size-dependent deposition rate from
//! synthetic observations of element averages.
use aerosol_gde::config::{EstimatorConfig, GdeConfig, ScaleType};
use aerosol_gde::estimation::{evolve, JointEstimator};
use aerosol_gde::model::{GdeModelBuilder, Target};
use aerosol_gde::noise::{CorrelatedNoise, ObservationNoise};
use aerosol_gde::physics::gaussian;
use aerosol_gde::projection::compute_norm_difference;
use aerosol_gde::rate::{stationary, Process};
use nalgebra::{DMatrix, DVector};

fn true_deposition(dp: f64) -> f64 {
    0.05 + 0.2 * dp
}

fn main() -> eyre::Result<()> {
    let (ne, np) = (10, 2);
    let config = GdeConfig::from_diameter_range(ne, np, 0.01, 1.0, ScaleType::Log);
    let mean = config.scale.coordinate(0.1);
    let num_steps = 100;
    let dt = 0.05;

    let truth_model = GdeModelBuilder::new(config.clone())
        .add_process(Process::Condensation, stationary(|dp: f64| 0.005 / dp))?
        .add_process(Process::Deposition, stationary(true_deposition))?
        .compile()?;
    let alpha0 = truth_model.compute_coefficients(Target::Alpha, |x| gaussian(x, 500.0, mean, 2.0))?;
    let truth = evolve(&truth_model, &alpha0, dt, num_steps)?;

    // Only element averages are observed, perturbed by a deterministic oscillation
    let h = DMatrix::from_fn(ne, ne * np, |i, j| if j == i * np { 1.0 } else { 0.0 });
    let observations: Vec<DVector<f64>> = truth
        .coefficients
        .iter()
        .enumerate()
        .map(|(k, alpha)| {
            let y = &h * alpha;
            DVector::from_fn(ne, |i, _| y[i] * (1.0 + 0.01 * (1.7 * k as f64 + 2.3 * i as f64).sin()))
        })
        .collect();

    let model = GdeModelBuilder::new(config)
        .add_process(Process::Condensation, stationary(|dp: f64| 0.005 / dp))?
        .add_unknown(Process::Deposition, 3, 2)?
        .compile()?;
    let estimator_config = EstimatorConfig {
        dt,
        num_steps,
        smoothing: true,
        alpha_prior: CorrelatedNoise::new(vec![50.0, 10.0], 1.0),
        alpha_process: CorrelatedNoise::new(vec![1.0, 0.2], 1.0),
        eta_prior: Some(CorrelatedNoise::new(vec![0.2, 0.05], 2.0)),
        eta_process: Some(CorrelatedNoise::new(vec![0.01, 0.002], 2.0)),
        observation: ObservationNoise::new(1.0, 0.1),
    };
    let estimator = JointEstimator::new(&model, estimator_config, h)?;
    let eta_guess = model.compute_coefficients(Target::Eta, |_| 0.1)?;
    let prior = estimator.prior(&DVector::zeros(model.dim()), Some(&eta_guess))?;
    let result = estimator.run(prior, &observations)?;
    let estimates = estimator.unconstrained(&result)?;

    let alphas: Vec<_> = estimates.iter().map(|e| e.alpha.clone()).collect();
    let errors = compute_norm_difference(&truth.coefficients, &alphas, None, false)?;
    println!("Distribution error at first and last step: {:.3e}, {:.3e}", errors[0], errors[num_steps - 1]);

    if let Some(last) = estimates.last() {
        if let (Some(eta), Some(covariance)) = (&last.eta, &last.eta_covariance) {
            let plot = model.parameter_estimation_discretisation(Process::Deposition, eta, Some(covariance))?;
            println!("{:>10} {:>10} {:>10} {:>10}", "Dp (µm)", "true", "estimate", "sigma");
            let sigma = plot.sigma.unwrap_or_else(|| DVector::zeros(plot.values.len()));
            for (i, dp) in plot.diameters.iter().enumerate().step_by(3) {
                println!(
                    "{:10.4} {:10.4} {:10.4} {:10.4}",
                    dp,
                    true_deposition(*dp),
                    plot.values[i],
                    sigma[i]
                );
            }
        }
    }
    Ok(())
}
