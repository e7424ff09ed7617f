//! Conversions between continuous functions and coefficient vectors.
use crate::assembly::element_rules;
use crate::basis::LegendreSpace;
use crate::config::ScaleType;
use crate::error::{check_dimension, GdeError};
use crate::Real;
use gde_traits::from_usize;
use itertools::izip;
use nalgebra::{DMatrix, DVector};

/// Galerkin L² projection of `f` onto `space`, using `num_points` Gauss points per element.
pub fn project<T: Real>(space: &LegendreSpace<T>, num_points: usize, f: impl Fn(T) -> T) -> DVector<T> {
    let np = space.nodes_per_element();
    let mass = space.mass_diagonal();
    let rules = element_rules(space, num_points, &[]);
    let mut coefficients = DVector::zeros(space.dim());
    let mut values = vec![T::zero(); np];
    let mut derivatives = vec![T::zero(); np];

    for (e, (weights, points)) in rules.iter().enumerate() {
        for (&w, &x) in izip!(weights, points) {
            space.populate_element_basis(e, x, &mut values, &mut derivatives);
            let fx = f(x);
            for (p, &phi) in values.iter().enumerate() {
                coefficients[e * np + p] += w * fx * phi;
            }
        }
    }
    coefficients.component_div_assign(&mass);
    coefficients
}

/// Matrix `Φ` with `Φ[(m, i)] = φ_i(points[m])`.
pub fn evaluation_matrix<T: Real>(space: &LegendreSpace<T>, points: &[T]) -> DMatrix<T> {
    let mut matrix = DMatrix::zeros(points.len(), space.dim());
    for (m, &x) in points.iter().enumerate() {
        matrix.row_mut(m).tr_copy_from(&space.basis_row(x));
    }
    matrix
}

/// `count` equally spaced points on `[a, b]`, including both ends.
pub fn linspace<T: Real>(a: T, b: T, count: usize) -> Vec<T> {
    match count {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let h = (b - a) / from_usize::<T>(count - 1);
            (0..count)
                .map(|i| {
                    if i + 1 == count {
                        b
                    } else {
                        a + h * from_usize::<T>(i)
                    }
                })
                .collect()
        }
    }
}

/// Default points for reconstruction: a uniform grid with five points per degree of freedom.
pub fn plotting_points<T: Real>(space: &LegendreSpace<T>) -> Vec<T> {
    let mesh = space.mesh();
    linspace(mesh.x_min(), mesh.x_max(), 5 * space.dim())
}

/// A function reconstructed from coefficients on a set of points.
#[derive(Debug, Clone)]
pub struct Reconstruction<T> {
    pub points: Vec<T>,
    pub values: DVector<T>,
    /// Pointwise standard deviation `sqrt(diag(Φ Γ Φᵀ))`, when a covariance was given.
    pub sigma: Option<DVector<T>>,
}

/// Evaluates the function with the given coefficients at `points`, with optional
/// standard deviation bands from the coefficient covariance.
pub fn reconstruct<T: Real>(
    space: &LegendreSpace<T>,
    coefficients: &DVector<T>,
    covariance: Option<&DMatrix<T>>,
    points: &[T],
) -> Result<Reconstruction<T>, GdeError> {
    check_dimension("reconstruction coefficients", space.dim(), coefficients.len())?;
    let phi = evaluation_matrix(space, points);
    let values = &phi * coefficients;
    let sigma = match covariance {
        Some(gamma) => {
            check_dimension("reconstruction covariance", space.dim(), gamma.nrows())?;
            check_dimension("reconstruction covariance", space.dim(), gamma.ncols())?;
            let phi_gamma = &phi * gamma;
            Some(DVector::from_fn(points.len(), |m, _| {
                phi_gamma.row(m).dot(&phi.row(m)).max(T::zero()).sqrt()
            }))
        }
        None => None,
    };
    Ok(Reconstruction {
        points: points.to_vec(),
        values,
        sigma,
    })
}

/// Converts the density `n_x` at the coordinates `points` into `dN/dlog10 Dp`.
pub fn change_basis_x_to_log_dp<T: Real>(
    values: &DVector<T>,
    points: &[T],
    scale: ScaleType,
) -> Result<DVector<T>, GdeError> {
    check_dimension("values per point", points.len(), values.len())?;
    Ok(DVector::from_fn(values.len(), |m, _| {
        scale.log10_diameter_density_factor(points[m]) * values[m]
    }))
}

/// Euclidean norm of `truth - estimate` at every time step.
///
/// With `weighted`, every component is divided by its standard deviation first. Components
/// with zero standard deviation are skipped.
pub fn compute_norm_difference<T: Real>(
    truth: &[DVector<T>],
    estimate: &[DVector<T>],
    sigma: Option<&[DVector<T>]>,
    weighted: bool,
) -> Result<Vec<T>, GdeError> {
    check_dimension("norm difference time steps", truth.len(), estimate.len())?;
    let sigma = match (weighted, sigma) {
        (true, Some(sigma)) => {
            check_dimension("norm difference time steps", truth.len(), sigma.len())?;
            Some(sigma)
        }
        (true, None) => {
            return Err(GdeError::configuration(
                "a weighted norm difference needs standard deviations",
            ))
        }
        (false, _) => None,
    };

    truth
        .iter()
        .zip(estimate)
        .enumerate()
        .map(|(k, (t, e))| {
            check_dimension("norm difference vector", t.len(), e.len())?;
            let difference = t - e;
            match sigma {
                Some(sigma) => {
                    let s = &sigma[k];
                    check_dimension("norm difference deviations", t.len(), s.len())?;
                    let squared = izip!(difference.iter(), s.iter())
                        .filter(|(_, s)| **s > T::zero())
                        .fold(T::zero(), |acc, (&d, &s)| acc + (d / s) * (d / s));
                    Ok(squared.sqrt())
                }
                None => Ok(difference.norm()),
            }
        })
        .collect()
}
