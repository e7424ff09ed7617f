//! Finite difference approximations used to check analytic derivatives.
use crate::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;

/// Approximates the Jacobian of a vector function evaluated at `x`, using
/// central finite differences with resolution `h`.
///
/// Errors from evaluating `f` are passed through.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn approximate_jacobian_fd<T, E>(
    mut f: impl FnMut(&DVector<T>) -> Result<DVector<T>, E>,
    x: &DVector<T>,
    h: T,
) -> Result<DMatrix<T>, E>
where
    T: Real,
{
    let in_dim = x.len();
    // x+ := x + h e_j
    // x- := x - h e_j
    let mut x_perturbed = x.clone();
    let mut columns = Vec::with_capacity(in_dim);

    for j in 0..in_dim {
        x_perturbed[j] = x[j] + h;
        let f_plus = f(&x_perturbed)?;
        x_perturbed[j] = x[j] - h;
        let f_minus = f(&x_perturbed)?;
        x_perturbed[j] = x[j];

        // result[.., j] := (f+ - f-) / 2h
        columns.push((f_plus - f_minus) / (2.0 * h));
    }

    match columns.first() {
        Some(first) => {
            let out_dim = first.len();
            Ok(DMatrix::from_fn(out_dim, in_dim, |i, j| columns[j][i]))
        }
        None => Ok(DMatrix::zeros(0, 0)),
    }
}
