//! Deposition: a size-dependent first-order sink.
use crate::basis::LegendreSpace;
use crate::quadrature::QuadraturePair1d;
use crate::Real;
use itertools::izip;
use nalgebra::DMatrix;

/// Assembles the weak-form deposition operator `A[(e, i), (e, j)] = -∫_e d φ_i φ_j`.
///
/// The operator is block diagonal. The result is not scaled by the mass matrix.
pub fn assemble_deposition<T: Real>(
    space: &LegendreSpace<T>,
    rules: &[QuadraturePair1d<T>],
    rate: impl Fn(T) -> T,
) -> DMatrix<T> {
    let np = space.nodes_per_element();
    let n = space.dim();
    let mut operator = DMatrix::zeros(n, n);
    let mut values = vec![T::zero(); np];
    let mut derivatives = vec![T::zero(); np];

    for (e, (weights, points)) in rules.iter().enumerate() {
        let offset = e * np;
        for (&w, &x) in izip!(weights, points) {
            space.populate_element_basis(e, x, &mut values, &mut derivatives);
            let d = rate(x);
            for i in 0..np {
                for j in 0..np {
                    operator[(offset + i, offset + j)] -= w * d * values[i] * values[j];
                }
            }
        }
    }
    operator
}
