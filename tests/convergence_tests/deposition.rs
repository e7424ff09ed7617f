use super::{export_summary, l2_error, ErrorSample, ErrorSummary};
use aerosol_gde::config::{GdeConfig, ScaleType};
use aerosol_gde::estimation::evolve;
use aerosol_gde::model::{GdeModelBuilder, Target};
use aerosol_gde::physics::gaussian;
use aerosol_gde::rate::{stationary, Process};

const T_FINAL: f64 = 0.5;

fn deposition(diameter: f64) -> f64 {
    1.0 + diameter
}

/// The deposition equation `∂n/∂t = -d(Dp) n` decouples in size, so
/// `n(x, t) = n(x, 0) exp(-d(Dp(x)) t)`.
fn exact(x: f64, t: f64, mean: f64) -> f64 {
    let dp = ScaleType::Log.diameter(x);
    gaussian(x, 100.0, mean, 2.5) * (-deposition(dp) * t).exp()
}

#[test]
fn size_dependent_deposition_converges_under_h_refinement() {
    let mut summary = ErrorSummary::new("deposition_h_np2");
    for num_elements in [8, 16, 32] {
        let config = GdeConfig::from_diameter_range(num_elements, 2, 0.01, 1.0, ScaleType::Log);
        let mean = 0.5 * (config.x_min + config.x_max);
        let model = GdeModelBuilder::new(config)
            .add_process(Process::Deposition, stationary(deposition))
            .unwrap()
            .compile()
            .unwrap();
        let alpha0 = model
            .compute_coefficients(Target::Alpha, |x| exact(x, 0.0, mean))
            .unwrap();
        let evolution = evolve(&model, &alpha0, 0.01, 51).unwrap();
        let alpha = evolution.coefficients.last().unwrap();
        assert!((evolution.times.last().unwrap() - T_FINAL).abs() < 1e-12);

        summary.samples.push(ErrorSample {
            num_elements,
            nodes_per_element: 2,
            L2_error: l2_error(model.space(), alpha, |x| exact(x, T_FINAL, mean)),
        });
    }
    export_summary(&summary);

    let errors = summary.errors();
    assert!(errors.windows(2).all(|w| w[1] < 0.5 * w[0]), "errors {:?}", errors);
}
