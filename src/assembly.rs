//! Assembly of the discrete process operators.
//!
//! Every operator is assembled in weak form against the Legendre test functions and then
//! scaled by the inverse of the diagonal mass matrix, so that a process contributes
//! `dα/dt = A α` directly.
use crate::basis::LegendreSpace;
use crate::quadrature::{composite_gauss, QuadraturePair1d};
use crate::Real;
use nalgebra::{DMatrix, DVector};

pub mod coagulation;
pub mod condensation;
pub mod deposition;

pub use coagulation::{CoagulationTensor, DiscretisationSignature};
pub use condensation::{assemble_condensation, Upwind};
pub use deposition::assemble_deposition;

/// Composite quadrature rules for each element of `space`.
///
/// Each element is split at the `breakpoints` that lie strictly inside it, so that
/// integrands that are only piecewise smooth (such as a parameter field discretised on a
/// different mesh) are integrated accurately.
pub fn element_rules<T: Real>(
    space: &LegendreSpace<T>,
    num_points: usize,
    breakpoints: &[T],
) -> Vec<QuadraturePair1d<T>> {
    (0..space.num_elements())
        .map(|e| {
            let (a, b) = space.mesh().element_interval(e);
            let mut points = vec![a];
            points.extend(breakpoints.iter().copied().filter(|&x| x > a && x < b));
            points.push(b);
            points.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
            composite_gauss(num_points, &points)
        })
        .collect()
}

/// Scales the rows of a weak-form operator by the inverse mass matrix and applies the
/// lower boundary condition.
///
/// # Panics
///
/// Panics if the number of rows of `operator` differs from the length of `mass`.
pub(crate) fn finalize_operator<T: Real>(
    mut operator: DMatrix<T>,
    mass: &DVector<T>,
    boundary_zero: bool,
) -> DMatrix<T> {
    assert_eq!(operator.nrows(), mass.len(), "one mass entry per operator row");
    for (mut row, &m) in operator.row_iter_mut().zip(mass.iter()) {
        row /= m;
    }
    if boundary_zero {
        operator.row_mut(0).fill(T::zero());
    }
    operator
}
