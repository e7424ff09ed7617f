//! Error types for model construction, linearisation and estimation.
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// The matrix operation that failed in a [`GdeError::Numerical`] error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NumericalOperation {
    /// Inverting `I - (dt/2) J` in the Crank-Nicolson linearisation.
    CrankNicolsonInverse,
    /// Factorising the innovation covariance `H P Hᵀ + R` in the Kalman update.
    InnovationFactorization,
    /// Solving with the predicted covariance for the smoother gain.
    SmootherGain,
    /// Computing the null space of the parameter continuity constraints.
    ContinuityNullSpace,
    /// A computation produced non-finite values.
    NonFiniteResult,
}

impl Display for NumericalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Self::CrankNicolsonInverse => "inversion of the Crank-Nicolson implicit operator",
            Self::InnovationFactorization => "factorization of the innovation covariance",
            Self::SmootherGain => "solve for the smoother gain",
            Self::ContinuityNullSpace => "null space computation for the continuity constraints",
            Self::NonFiniteResult => "non-finite result",
        };
        write!(f, "{}", description)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum GdeError {
    /// The model or estimator was configured inconsistently.
    Configuration(String),
    /// A vector or matrix passed across an API boundary has the wrong size.
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A matrix operation failed, typically because a matrix is singular.
    Numerical {
        step: Option<usize>,
        operation: NumericalOperation,
    },
    /// A precomputed coagulation tensor does not match the configured discretisation.
    TensorMismatch { expected: String, found: String },
}

impl GdeError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn numerical(operation: NumericalOperation) -> Self {
        Self::Numerical { step: None, operation }
    }

    /// Attaches the time step index to numerical errors that do not yet carry one.
    pub fn at_step(self, step: usize) -> Self {
        match self {
            Self::Numerical { step: None, operation } => Self::Numerical {
                step: Some(step),
                operation,
            },
            other => other,
        }
    }
}

impl Display for GdeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "Invalid configuration: {}", message),
            Self::DimensionMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "Dimension mismatch in {}: expected {}, got {}.",
                context, expected, actual
            ),
            Self::Numerical { step: Some(step), operation } => {
                write!(f, "Numerical failure at time step {}: {}.", step, operation)
            }
            Self::Numerical { step: None, operation } => write!(f, "Numerical failure: {}.", operation),
            Self::TensorMismatch { expected, found } => write!(
                f,
                "Coagulation tensor does not match the discretisation. Expected {}, found {}.",
                expected, found
            ),
        }
    }
}

impl Error for GdeError {}

/// Returns a dimension mismatch error unless `actual == expected`.
pub(crate) fn check_dimension(context: &'static str, expected: usize, actual: usize) -> Result<(), GdeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(GdeError::DimensionMismatch {
            context,
            expected,
            actual,
        })
    }
}
