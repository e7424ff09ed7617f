//! Immutable configuration for the discretisation and the estimator.
use crate::error::GdeError;
use crate::noise::{CorrelatedNoise, ObservationNoise};
use crate::physics::{diameter_to_volume, volume_to_diameter};
use crate::Real;
use eyre::Context;
use numeric_literals::replace_float_literals;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The coordinate in which the size distribution is discretised.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    /// `x = ln v`, with `v` the particle volume in µm³.
    Log,
    /// `x = v`.
    Linear,
}

impl ScaleType {
    /// Particle diameter (µm) at coordinate `x`.
    pub fn diameter<T: Real>(&self, x: T) -> T {
        match self {
            Self::Log => volume_to_diameter(x.exp()),
            Self::Linear => volume_to_diameter(x),
        }
    }

    /// Coordinate of a particle with the given diameter (µm).
    pub fn coordinate<T: Real>(&self, diameter: T) -> T {
        match self {
            Self::Log => diameter_to_volume(diameter).ln(),
            Self::Linear => diameter_to_volume(diameter),
        }
    }

    /// Factor converting a diameter growth rate `dDp/dt` into the coordinate growth rate `dx/dt`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn condensation_factor<T: Real>(&self, diameter: T) -> T {
        match self {
            Self::Log => 3.0 / diameter,
            Self::Linear => T::pi() / 2.0 * diameter * diameter,
        }
    }

    /// Coordinate of the particle formed by merging particles at coordinates `x` and `y`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn combine<T: Real>(&self, x: T, y: T) -> T {
        match self {
            Self::Log => {
                // ln(e^x + e^y) without overflow
                let (hi, lo) = if x >= y { (x, y) } else { (y, x) };
                hi + (1.0 + (lo - hi).exp()).ln()
            }
            Self::Linear => x + y,
        }
    }

    /// `ln Dp` at coordinate `x`.
    pub fn log_diameter<T: Real>(&self, x: T) -> T {
        self.diameter(x).ln()
    }

    /// Coordinate of a particle with `ln Dp = log_diameter`.
    pub fn coordinate_from_log_diameter<T: Real>(&self, log_diameter: T) -> T {
        self.coordinate(log_diameter.exp())
    }

    /// Factor converting `n_x` at coordinate `x` into `dN/dlog10 Dp`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn log10_diameter_density_factor<T: Real>(&self, x: T) -> T {
        let ln_10 = T::ln_10();
        match self {
            Self::Log => 3.0 * ln_10,
            Self::Linear => 3.0 * ln_10 * x,
        }
    }
}

/// Parameters of the size distribution discretisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdeConfig<T> {
    pub num_elements: usize,
    pub nodes_per_element: usize,
    pub x_min: T,
    pub x_max: T,
    /// Zero inflow at the lower boundary and zero the lower boundary degree of freedom.
    pub boundary_zero: bool,
    pub scale: ScaleType,
    /// Points per element for the one-dimensional process integrals.
    pub quadrature_points: usize,
    /// Points per dimension for the coagulation integrals.
    pub coagulation_quadrature_points: usize,
    /// Number of sub-intervals per dimension for the coagulation gain integral.
    pub coagulation_subdivisions: usize,
}

impl<T: Real> GdeConfig<T> {
    pub fn new(num_elements: usize, nodes_per_element: usize, x_min: T, x_max: T, scale: ScaleType) -> Self {
        Self {
            num_elements,
            nodes_per_element,
            x_min,
            x_max,
            boundary_zero: false,
            scale,
            quadrature_points: nodes_per_element + 4,
            coagulation_quadrature_points: nodes_per_element + 2,
            coagulation_subdivisions: 2,
        }
    }

    /// Configuration spanning particle diameters `[dp_min, dp_max]` (µm).
    pub fn from_diameter_range(
        num_elements: usize,
        nodes_per_element: usize,
        dp_min: T,
        dp_max: T,
        scale: ScaleType,
    ) -> Self {
        Self::new(
            num_elements,
            nodes_per_element,
            scale.coordinate(dp_min),
            scale.coordinate(dp_max),
            scale,
        )
    }

    pub fn with_boundary_zero(self, boundary_zero: bool) -> Self {
        Self { boundary_zero, ..self }
    }

    pub fn with_quadrature_points(self, quadrature_points: usize) -> Self {
        Self {
            quadrature_points,
            ..self
        }
    }

    pub fn with_coagulation_quadrature(self, points: usize, subdivisions: usize) -> Self {
        Self {
            coagulation_quadrature_points: points,
            coagulation_subdivisions: subdivisions,
            ..self
        }
    }

    /// Total number of coefficients `N = Ne * Np`.
    pub fn num_coefficients(&self) -> usize {
        self.num_elements * self.nodes_per_element
    }

    pub fn validate(&self) -> Result<(), GdeError> {
        if self.num_elements == 0 || self.nodes_per_element == 0 {
            return Err(GdeError::configuration(format!(
                "discretisation needs at least one element and one node per element, got Ne = {}, Np = {}",
                self.num_elements, self.nodes_per_element
            )));
        }
        if !(self.x_min.is_finite() && self.x_max.is_finite()) || self.x_min >= self.x_max {
            return Err(GdeError::configuration(format!(
                "invalid domain [{:?}, {:?}]",
                self.x_min, self.x_max
            )));
        }
        if self.scale == ScaleType::Linear && self.x_min <= T::zero() {
            return Err(GdeError::configuration("linear scale requires a positive lower volume bound"));
        }
        if self.quadrature_points == 0 || self.coagulation_quadrature_points == 0 || self.coagulation_subdivisions == 0
        {
            return Err(GdeError::configuration("quadrature sizes must be positive"));
        }
        Ok(())
    }
}

/// Parameters of the state and parameter estimation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig<T> {
    /// Time step (hours).
    pub dt: T,
    /// Number of time steps `NT`, including the prior at `k = 0`.
    pub num_steps: usize,
    /// Whether to run the fixed-interval smoother after filtering.
    pub smoothing: bool,
    pub alpha_prior: CorrelatedNoise<T>,
    pub alpha_process: CorrelatedNoise<T>,
    /// Required when an unknown process is registered.
    #[serde(default)]
    pub eta_prior: Option<CorrelatedNoise<T>>,
    #[serde(default)]
    pub eta_process: Option<CorrelatedNoise<T>>,
    pub observation: ObservationNoise<T>,
}

impl<T: Real> EstimatorConfig<T> {
    pub fn validate(&self) -> Result<(), GdeError> {
        if !(self.dt > T::zero()) {
            return Err(GdeError::configuration("time step must be positive"));
        }
        if self.num_steps < 2 {
            return Err(GdeError::configuration("estimation needs at least two time steps"));
        }
        if self.eta_prior.is_some() != self.eta_process.is_some() {
            return Err(GdeError::configuration(
                "parameter prior and process noise must be given together",
            ));
        }
        Ok(())
    }
}

/// Loads a configuration value from a JSON file.
pub fn load_json<C: DeserializeOwned>(path: impl AsRef<Path>) -> eyre::Result<C> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("failed to parse configuration in {}", path.display()))
}
