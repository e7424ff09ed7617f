//! Unit conversions and physical models for aerosol particles.
//!
//! Diameters are in micrometres, volumes in cubic micrometres and time in hours.
use crate::config::ScaleType;
use crate::rate::CoagulationKernel;
use crate::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Volume of a spherical particle, `v = (π/6) Dp³`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn diameter_to_volume<T: Real>(diameter: T) -> T {
    T::pi() / 6.0 * diameter.powi(3)
}

/// Diameter of a spherical particle with the given volume.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn volume_to_diameter<T: Real>(volume: T) -> T {
    (6.0 * volume / T::pi()).powf(1.0 / 3.0)
}

/// Gaussian bump `amplitude * exp(-(x - mean)² / (2 σ²))`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn gaussian<T: Real>(x: T, amplitude: T, mean: T, sigma: T) -> T {
    amplitude * (-(x - mean).powi(2) / (2.0 * sigma * sigma)).exp()
}

/// Brownian coagulation kernel with the Fuchs interpolation between the free-molecular
/// and continuum regimes.
///
/// Kernel values are returned in cm³/hour for particle diameters in µm.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuchsBrownian<T> {
    /// Gas temperature (K).
    pub temperature: T,
    /// Dynamic viscosity of air (Pa s).
    pub viscosity: T,
    /// Mean free path of air molecules (µm).
    pub mean_free_path: T,
    /// Particle mass density (kg/m³).
    pub particle_density: T,
    /// Coordinate system of the kernel arguments.
    pub scale: ScaleType,
}

impl<T: Real> FuchsBrownian<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn new(scale: ScaleType) -> Self {
        Self {
            temperature: 298.0,
            viscosity: 1.84e-5,
            mean_free_path: 0.0651,
            particle_density: 1000.0,
            scale,
        }
    }

    /// Evaluates the kernel for two particle diameters (µm).
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn kernel_from_diameters(&self, dp_1: T, dp_2: T) -> T {
        let boltzmann = 1.380649e-23;
        let kt = boltzmann * self.temperature;

        // SI units from here on
        let particle = |dp_um: T| {
            let dp = dp_um * 1e-6;
            let knudsen = 2.0 * self.mean_free_path / dp_um;
            let cunningham = 1.0 + knudsen * (1.257 + 0.4 * (-1.1 / knudsen).exp());
            let diffusivity = kt * cunningham / (3.0 * T::pi() * self.viscosity * dp);
            let mass = self.particle_density * T::pi() / 6.0 * dp.powi(3);
            let speed = (8.0 * kt / (T::pi() * mass)).sqrt();
            let path = 8.0 * diffusivity / (T::pi() * speed);
            let g = ((dp + path).powi(3) - (dp * dp + path * path).powf(1.5)) / (3.0 * dp * path) - dp;
            (dp, diffusivity, speed, g)
        };

        let (d1, diff1, c1, g1) = particle(dp_1);
        let (d2, diff2, c2, g2) = particle(dp_2);
        let d_sum = d1 + d2;
        let diff_sum = diff1 + diff2;
        let g12 = (g1 * g1 + g2 * g2).sqrt();
        let c12 = (c1 * c1 + c2 * c2).sqrt();

        let kernel_si = 2.0 * T::pi() * diff_sum * d_sum
            / (d_sum / (d_sum + 2.0 * g12) + 8.0 * diff_sum / (c12 * d_sum));

        // m³/s -> cm³/hour
        kernel_si * 1e6 * 3600.0
    }
}

impl<T: Real> CoagulationKernel<T> for FuchsBrownian<T> {
    fn kernel(&self, x: T, y: T) -> T {
        self.kernel_from_diameters(self.scale.diameter(x), self.scale.diameter(y))
    }

    fn name(&self) -> String {
        "fuchs_brownian".to_string()
    }
}
