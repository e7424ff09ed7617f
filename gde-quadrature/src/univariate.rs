//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::Rule1d;
use std::f64::consts::PI;

/// Value and derivative of the Legendre polynomial `P_n` at a point.
///
/// The derivative uses the recurrence `P'_m(x) = m P_{m-1}(x) + x P'_{m-1}(x)`, which unlike
/// the closed-form expression `n (x P_n - P_{n-1}) / (x^2 - 1)` stays well defined at the
/// endpoints `|x| = 1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Legendre {
    pub value: f64,
    pub derivative: f64,
}

impl Legendre {
    pub fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p = 1.0;
        let mut p_prev = 0.0;
        let mut dp = 0.0;
        for m in 1..=n {
            let m = m as f64;
            let p_next = ((2.0 * m - 1.0) * x * p - (m - 1.0) * p_prev) / m;
            dp = m * p + x * dp;
            p_prev = p;
            p = p_next;
        }
        Self { value: p, derivative: dp }
    }
}

/// Gauss quadrature for the reference interval [-1, 1].
///
/// Returns the [Gauss quadrature rule] with the given number of points. Given `n` points,
/// the rule integrates polynomials of order up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
///
/// [Gauss quadrature rule]: https://en.wikipedia.org/wiki/Gaussian_quadrature
pub fn gauss(num_points: usize) -> Rule1d {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    // Only the first half of the roots are located with Newton's method,
    // the rest follow from symmetry about the origin
    let m = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    for i in 0..m {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut legendre = Legendre::evaluate(n, x);
        for _ in 0..100 {
            let dx = -legendre.value / legendre.derivative;
            x += dx;
            legendre = Legendre::evaluate(n, x);
            if dx.abs() <= 1e-15 {
                break;
            }
        }

        let dp = legendre.derivative;
        points.push([x]);
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
    }

    for i in m..n {
        let mirror_idx = n - i - 1;
        points.push([-points[mirror_idx][0]]);
        weights.push(weights[mirror_idx]);
    }

    assert_eq!(points.len(), n, "Internal error: incorrect number of points produced");
    (weights, points)
}

/// Gauss quadrature mapped onto the interval `[a, b]`.
pub fn gauss_on_interval(num_points: usize, a: f64, b: f64) -> Rule1d {
    let (weights, points) = gauss(num_points);
    let half_length = 0.5 * (b - a);
    let midpoint = 0.5 * (a + b);
    let weights = weights.into_iter().map(|w| w * half_length).collect();
    let points = points
        .into_iter()
        .map(|[xi]| [midpoint + half_length * xi])
        .collect();
    (weights, points)
}

/// Composite Gauss rule for `[-1, 1]`, built by splitting the interval into
/// `pieces` equal sub-intervals and applying a `num_points` Gauss rule on each.
///
/// # Panics
///
/// Panics if `pieces` is zero.
pub fn subdivided_gauss(num_points: usize, pieces: usize) -> Rule1d {
    assert!(pieces > 0, "number of subdivisions must be positive");
    let size = 2.0 / pieces as f64;
    let mut weights = Vec::with_capacity(num_points * pieces);
    let mut points = Vec::with_capacity(num_points * pieces);
    for i in 0..pieces {
        let a = -1.0 + i as f64 * size;
        let (w, p) = gauss_on_interval(num_points, a, a + size);
        weights.extend(w);
        points.extend(p);
    }
    (weights, points)
}
