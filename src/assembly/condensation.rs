//! Condensation: advection in the size coordinate with upwind interface fluxes.
use crate::basis::{legendre_endpoint, LegendreSpace};
use crate::quadrature::QuadraturePair1d;
use crate::Real;
use itertools::izip;
use nalgebra::DMatrix;

/// Choice of upwind direction at element interfaces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Upwind {
    /// Upwind according to the sign of the growth rate at each interface.
    BySign,
    /// Always take the trace from the left element, i.e. assume non-negative growth.
    ///
    /// The resulting operator is linear in the growth rate, which is what makes an
    /// unknown condensation rate enter the model bilinearly.
    AlwaysLeft,
}

impl Upwind {
    fn from_left<T: Real>(&self, growth: T) -> bool {
        match self {
            Self::BySign => growth >= T::zero(),
            Self::AlwaysLeft => true,
        }
    }
}

/// Assembles the weak-form condensation operator for the coordinate growth rate `growth(x)`.
///
/// Row `(e, i)` holds `∫_e I n φ_i' - F_b φ_i(b) + F_a φ_i(a)` with the upwind fluxes
/// `F = I n*` at the element ends. Particles leave through `x_max` when growing and through
/// `x_min` when shrinking. Inflow at `x_min` uses the interior trace, unless
/// `boundary_zero` is set, in which case it is zero.
///
/// The result is not scaled by the mass matrix.
pub fn assemble_condensation<T: Real>(
    space: &LegendreSpace<T>,
    rules: &[QuadraturePair1d<T>],
    growth: impl Fn(T) -> T,
    upwind: Upwind,
    boundary_zero: bool,
) -> DMatrix<T> {
    let np = space.nodes_per_element();
    let ne = space.num_elements();
    let n = space.dim();
    let mesh = space.mesh();
    let mut operator = DMatrix::zeros(n, n);

    let mut values = vec![T::zero(); np];
    let mut derivatives = vec![T::zero(); np];

    // Volume terms
    for (e, (weights, points)) in rules.iter().enumerate() {
        let offset = e * np;
        for (&w, &x) in izip!(weights, points) {
            space.populate_element_basis(e, x, &mut values, &mut derivatives);
            let g = growth(x);
            for i in 0..np {
                for j in 0..np {
                    operator[(offset + i, offset + j)] += w * g * values[j] * derivatives[i];
                }
            }
        }
    }

    let right = |q: usize| legendre_endpoint::<T>(q, true);
    let left = |q: usize| legendre_endpoint::<T>(q, false);

    // Interior interfaces between element b - 1 and element b
    for b in 1..ne {
        let g = growth(mesh.boundaries()[b]);
        let (l, r) = ((b - 1) * np, b * np);
        for i in 0..np {
            for j in 0..np {
                if upwind.from_left(g) {
                    operator[(l + i, l + j)] -= g * right(i) * right(j);
                    operator[(r + i, l + j)] += g * left(i) * right(j);
                } else {
                    operator[(l + i, r + j)] -= g * right(i) * left(j);
                    operator[(r + i, r + j)] += g * left(i) * left(j);
                }
            }
        }
    }

    // Upper boundary: outflow only
    let g = growth(mesh.x_max());
    if upwind.from_left(g) {
        let last = (ne - 1) * np;
        for i in 0..np {
            for j in 0..np {
                operator[(last + i, last + j)] -= g * right(i) * right(j);
            }
        }
    }

    // Lower boundary: outflow, or inflow extrapolated from the interior trace
    let g = growth(mesh.x_min());
    let inflow = upwind.from_left(g);
    if !(inflow && boundary_zero) {
        for i in 0..np {
            for j in 0..np {
                operator[(i, j)] += g * left(i) * left(j);
            }
        }
    }

    operator
}
