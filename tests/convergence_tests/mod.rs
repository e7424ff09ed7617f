//! Convergence of the discretisation under element (h) and degree (p) refinement.
use aerosol_gde::basis::LegendreSpace;
use aerosol_gde::quadrature::{gauss_on_interval, integrate};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::path::PathBuf;

mod deposition;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct ErrorSample {
    pub num_elements: usize,
    pub nodes_per_element: usize,
    pub L2_error: f64,
}

/// For serializing to JSON for subsequent analysis/plots
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub name: String,
    pub samples: Vec<ErrorSample>,
}

impl ErrorSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: Vec::new(),
        }
    }

    pub fn errors(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.L2_error).collect()
    }
}

pub fn export_summary(summary: &ErrorSummary) {
    let path = PathBuf::from("data/convergence_tests/").join(format!("{}_summary.json", summary.name));
    create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = File::create(path).unwrap();
    serde_json::to_writer_pretty(&mut file, summary).unwrap();
}

/// `‖u_h - u‖_L²` over the domain of `space`, with a high order rule on every element.
pub fn l2_error(space: &LegendreSpace<f64>, coefficients: &DVector<f64>, u: impl Fn(f64) -> f64) -> f64 {
    let mesh = space.mesh();
    (0..space.num_elements())
        .map(|e| {
            let (a, b) = mesh.element_interval(e);
            // Stay inside the element so that interface points are not evaluated twice
            let rule = gauss_on_interval(12, a, b);
            integrate(&rule, |x| (space.evaluate(coefficients, x).unwrap() - u(x)).powi(2))
        })
        .sum::<f64>()
        .sqrt()
}

/// Convergence rate between consecutive samples that halve the element size.
pub fn rates(errors: &[f64]) -> Vec<f64> {
    errors.windows(2).map(|w| (w[0] / w[1]).log2()).collect()
}
