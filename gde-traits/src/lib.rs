use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used throughout the discretisation and estimation code.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Converts an `f64` constant into `T`.
///
/// # Panics
///
/// Panics if the value cannot be represented by `T`.
pub fn from_f64<T: Real>(value: f64) -> T {
    T::from_f64(value).expect("Literal must fit in T")
}

/// Converts a count or index into `T`.
///
/// # Panics
///
/// Panics if the value cannot be represented by `T`.
pub fn from_usize<T: Real>(value: usize) -> T {
    T::from_usize(value).expect("usize must fit in T")
}
