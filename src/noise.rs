//! Covariance construction for process, prior and observation noise.
use crate::error::{check_dimension, GdeError};
use crate::Real;
use gde_traits::from_usize;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Gaussian noise on element-wise Legendre coefficients, correlated between elements.
///
/// The covariance between coefficient `p` of element `e` and coefficient `q` of element `f` is
/// `δ_pq σ_p² exp(-(e - f)² / (2 ℓ²))`. Coefficients of different polynomial degree are
/// uncorrelated. A zero correlation length gives independent elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedNoise<T> {
    /// Standard deviation for each polynomial degree.
    pub sigma: Vec<T>,
    /// Correlation length, measured in elements.
    pub correlation_length: T,
    /// Multiplies the standard deviation of the first element's coefficients.
    #[serde(default)]
    pub first_element_multiplier: Option<T>,
}

impl<T: Real> CorrelatedNoise<T> {
    pub fn new(sigma: Vec<T>, correlation_length: T) -> Self {
        Self {
            sigma,
            correlation_length,
            first_element_multiplier: None,
        }
    }

    /// Same standard deviation for every degree, uncorrelated elements.
    pub fn uncorrelated(sigma: T, nodes_per_element: usize) -> Self {
        Self::new(vec![sigma; nodes_per_element], T::zero())
    }

    pub fn with_first_element_multiplier(self, multiplier: T) -> Self {
        Self {
            first_element_multiplier: Some(multiplier),
            ..self
        }
    }

    /// Covariance for `num_elements` elements with `nodes_per_element` coefficients each.
    pub fn covariance(&self, num_elements: usize, nodes_per_element: usize) -> Result<DMatrix<T>, GdeError> {
        if self.sigma.len() < nodes_per_element {
            return Err(GdeError::DimensionMismatch {
                context: "standard deviations per polynomial degree",
                expected: nodes_per_element,
                actual: self.sigma.len(),
            });
        }
        correlated_covariance(
            num_elements,
            nodes_per_element,
            &self.sigma[..nodes_per_element],
            self.correlation_length,
            self.first_element_multiplier,
        )
    }
}

/// Builds the element-correlated covariance described on [`CorrelatedNoise`].
///
/// `sigma` holds one standard deviation per polynomial degree. A length other than
/// `nodes_per_element` is reported as [`GdeError::DimensionMismatch`].
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn correlated_covariance<T: Real>(
    num_elements: usize,
    nodes_per_element: usize,
    sigma: &[T],
    correlation_length: T,
    first_element_multiplier: Option<T>,
) -> Result<DMatrix<T>, GdeError> {
    check_dimension("standard deviations per polynomial degree", nodes_per_element, sigma.len())?;
    let np = nodes_per_element;
    let n = num_elements * np;

    let correlation = |e: usize, f: usize| {
        if e == f {
            1.0
        } else if correlation_length <= T::zero() {
            0.0
        } else {
            let distance = from_usize::<T>(e.abs_diff(f));
            (-distance * distance / (2.0 * correlation_length * correlation_length)).exp()
        }
    };
    let element_scale = |e: usize| match first_element_multiplier {
        Some(multiplier) if e == 0 => multiplier,
        _ => 1.0,
    };

    Ok(DMatrix::from_fn(n, n, |row, col| {
        let (e, p) = (row / np, row % np);
        let (f, q) = (col / np, col % np);
        if p != q {
            0.0
        } else {
            sigma[p] * sigma[p] * correlation(e, f) * element_scale(e) * element_scale(f)
        }
    }))
}

/// Signal-dependent observation noise `Γ_v = σ_mult² diag(y) + σ_v² I`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationNoise<T> {
    pub sigma_additive: T,
    pub sigma_multiplier: T,
}

impl<T: Real> ObservationNoise<T> {
    pub fn new(sigma_additive: T, sigma_multiplier: T) -> Self {
        Self {
            sigma_additive,
            sigma_multiplier,
        }
    }

    /// Observation covariance for the observation vector `y`.
    ///
    /// Negative observations do not contribute a multiplicative part.
    pub fn covariance(&self, observation: &DVector<T>) -> DMatrix<T> {
        let additive = self.sigma_additive * self.sigma_additive;
        let multiplier = self.sigma_multiplier * self.sigma_multiplier;
        let diagonal = observation.map(|y| multiplier * y.max(T::zero()) + additive);
        DMatrix::from_diagonal(&diagonal)
    }

    /// Observation covariances for a sequence of observations.
    pub fn covariances(&self, observations: &[DVector<T>], dim: usize) -> Result<Vec<DMatrix<T>>, GdeError> {
        observations
            .iter()
            .map(|y| {
                check_dimension("observation vector", dim, y.len())?;
                Ok(self.covariance(y))
            })
            .collect()
    }
}
