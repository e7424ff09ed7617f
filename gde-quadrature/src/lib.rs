//! Quadrature rules for the reference interval `[-1, 1]` and the reference square `[-1, 1]^2`.
//!
//! The rules are computed in `f64`. Consumers working with other scalar types convert
//! weights and points after construction.

pub mod tensor;
pub mod univariate;

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule, stored as `(weights, points)`.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A one-dimensional quadrature rule.
pub type Rule1d = Rule<1>;

/// A two-dimensional quadrature rule.
pub type Rule2d = Rule<2>;

/// Approximates the integral of `f` with the given rule.
pub fn integrate<const D: usize>(rule: &Rule<D>, f: impl Fn(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, p)| w * f(p)).sum()
}
