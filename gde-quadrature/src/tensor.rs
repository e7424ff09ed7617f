//! Quadrature rules for the reference square formed by tensor products of 1D rules.

use crate::univariate::{gauss, subdivided_gauss};
use crate::{Rule1d, Rule2d};

fn tensor_product(rule: &Rule1d) -> Rule2d {
    let (weights1d, points1d) = rule;
    let n = weights1d.len();
    let mut weights2d = Vec::with_capacity(n * n);
    let mut points2d = Vec::with_capacity(n * n);

    let rule1d_iter = || weights1d.iter().zip(points1d);

    for (&wx, &[x]) in rule1d_iter() {
        for (&wy, &[y]) in rule1d_iter() {
            weights2d.push(wx * wy);
            points2d.push([x, y]);
        }
    }

    (weights2d, points2d)
}

/// A Gauss quadrature rule for the reference square with the provided number of points
/// per dimension.
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule2d {
    tensor_product(&gauss(num_points_per_dim))
}

/// A tensor-product rule for the reference square where each dimension is split into
/// `pieces` sub-intervals.
///
/// Useful for integrands with kinks or jumps inside the square, where increasing the
/// polynomial strength of a single rule does not help much.
pub fn subdivided_quadrilateral_gauss(num_points_per_dim: usize, pieces: usize) -> Rule2d {
    tensor_product(&subdivided_gauss(num_points_per_dim, pieces))
}
