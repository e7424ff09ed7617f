//! Process identifiers and the narrow function interfaces through which process rates are
//! supplied to the model.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// A physical process contributing to the evolution of the size distribution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Process {
    Condensation,
    Deposition,
    Coagulation,
}

impl Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condensation => write!(f, "condensation"),
            Self::Deposition => write!(f, "deposition"),
            Self::Coagulation => write!(f, "coagulation"),
        }
    }
}

/// A rate as a function of particle diameter (µm) and time (hours).
///
/// For condensation this is the diameter growth rate `dDp/dt` (µm/hour), for deposition
/// the removal rate (1/hour).
pub trait RateFunction<T>: Send + Sync {
    fn rate(&self, diameter: T, time: T) -> T;

    /// Whether the rate changes with time. Time-independent rates are discretised once.
    fn is_time_dependent(&self) -> bool {
        true
    }
}

/// A rate that depends on diameter only.
#[derive(Debug, Copy, Clone)]
pub struct Stationary<F>(pub F);

/// A rate that depends on diameter and time.
#[derive(Debug, Copy, Clone)]
pub struct TimeDependent<F>(pub F);

/// Wraps a closure `Dp -> rate`.
pub fn stationary<F>(function: F) -> Stationary<F> {
    Stationary(function)
}

/// Wraps a closure `(Dp, t) -> rate`.
pub fn time_dependent<F>(function: F) -> TimeDependent<F> {
    TimeDependent(function)
}

impl<T, F> RateFunction<T> for Stationary<F>
where
    F: Fn(T) -> T + Send + Sync,
{
    fn rate(&self, diameter: T, _time: T) -> T {
        (self.0)(diameter)
    }

    fn is_time_dependent(&self) -> bool {
        false
    }
}

impl<T, F> RateFunction<T> for TimeDependent<F>
where
    F: Fn(T, T) -> T + Send + Sync,
{
    fn rate(&self, diameter: T, time: T) -> T {
        (self.0)(diameter, time)
    }
}

/// A symmetric collision kernel in the model's state coordinates.
///
/// The name identifies the kernel in the signature of precomputed coagulation tensors.
pub trait CoagulationKernel<T>: Send + Sync {
    fn kernel(&self, x: T, y: T) -> T;

    fn name(&self) -> String;
}

/// A coagulation kernel given by a closure `(x, y) -> K(x, y)` and a name.
#[derive(Debug, Clone)]
pub struct NamedKernel<F> {
    name: String,
    function: F,
}

impl<F> NamedKernel<F> {
    pub fn new(name: impl Into<String>, function: F) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

impl<T, F> CoagulationKernel<T> for NamedKernel<F>
where
    F: Fn(T, T) -> T + Send + Sync,
{
    fn kernel(&self, x: T, y: T) -> T {
        (self.function)(x, y)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
