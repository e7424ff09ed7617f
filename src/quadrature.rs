//! Quadrature rules in the scalar type of the discretisation.
//!
//! The reference rules are computed in `f64` by `gde-quadrature` and converted here.
use crate::Real;
use gde_quadrature::{tensor, univariate};
use itertools::izip;
use numeric_literals::replace_float_literals;

/// A one-dimensional rule stored as `(weights, points)`.
pub type QuadraturePair1d<T> = (Vec<T>, Vec<T>);

/// A two-dimensional rule stored as `(weights, points)`.
pub type QuadraturePair2d<T> = (Vec<T>, Vec<[T; 2]>);

fn convert<T: Real>(value: f64) -> T {
    gde_traits::from_f64(value)
}

/// Gauss rule with `num_points` points on the reference interval `[-1, 1]`.
pub fn reference_gauss<T: Real>(num_points: usize) -> QuadraturePair1d<T> {
    let (weights, points) = univariate::gauss(num_points);
    (
        weights.into_iter().map(convert).collect(),
        points.into_iter().map(|[xi]| convert(xi)).collect(),
    )
}

/// Gauss rule with `num_points` points on `[a, b]`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn gauss_on_interval<T: Real>(num_points: usize, a: T, b: T) -> QuadraturePair1d<T> {
    let (weights, points) = reference_gauss::<T>(num_points);
    let half_length = 0.5 * (b - a);
    let midpoint = 0.5 * (a + b);
    (
        weights.into_iter().map(|w| w * half_length).collect(),
        points.into_iter().map(|xi| midpoint + half_length * xi).collect(),
    )
}

/// Composite Gauss rule over consecutive intervals `[breakpoints[i], breakpoints[i + 1]]`.
///
/// Degenerate intervals are skipped.
pub fn composite_gauss<T: Real>(num_points: usize, breakpoints: &[T]) -> QuadraturePair1d<T> {
    let mut weights = Vec::with_capacity(num_points * breakpoints.len());
    let mut points = Vec::with_capacity(num_points * breakpoints.len());
    for pair in breakpoints.windows(2) {
        if pair[1] > pair[0] {
            let (w, p) = gauss_on_interval(num_points, pair[0], pair[1]);
            weights.extend(w);
            points.extend(p);
        }
    }
    (weights, points)
}

/// Tensor Gauss rule on the reference square, with each dimension split into `pieces`.
pub fn reference_square_gauss<T: Real>(num_points_per_dim: usize, pieces: usize) -> QuadraturePair2d<T> {
    let (weights, points) = if pieces > 1 {
        tensor::subdivided_quadrilateral_gauss(num_points_per_dim, pieces)
    } else {
        tensor::quadrilateral_gauss(num_points_per_dim)
    };
    (
        weights.into_iter().map(convert).collect(),
        points
            .into_iter()
            .map(|[xi, eta]| [convert(xi), convert(eta)])
            .collect(),
    )
}

/// Approximates the integral of `f` with a one-dimensional rule.
pub fn integrate<T: Real>(rule: &QuadraturePair1d<T>, f: impl Fn(T) -> T) -> T {
    let (weights, points) = rule;
    izip!(weights, points).fold(T::zero(), |acc, (&w, &x)| acc + w * f(x))
}
