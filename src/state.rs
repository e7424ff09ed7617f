//! Layout of the composite estimation state `[α ; η̃_c]`.
//!
//! The parameter part holds `p` lags of the continuity-reduced parameter coefficients,
//! lag 0 first. All block index arithmetic on composite vectors and covariances goes
//! through [`StateLayout`].
use crate::error::{check_dimension, GdeError};
use crate::Real;
use nalgebra::{DMatrix, DVector};
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StateLayout {
    alpha_dim: usize,
    reduced_parameter_dim: usize,
    lags: usize,
}

impl StateLayout {
    /// A state holding only the size distribution coefficients.
    pub fn alpha_only(alpha_dim: usize) -> Self {
        Self {
            alpha_dim,
            reduced_parameter_dim: 0,
            lags: 0,
        }
    }

    pub fn new(alpha_dim: usize, reduced_parameter_dim: usize, lags: usize) -> Self {
        Self {
            alpha_dim,
            reduced_parameter_dim,
            lags,
        }
    }

    pub fn dim(&self) -> usize {
        self.alpha_dim + self.parameter_dim()
    }

    pub fn alpha_dim(&self) -> usize {
        self.alpha_dim
    }

    /// Dimension of all parameter lags together.
    pub fn parameter_dim(&self) -> usize {
        self.lags * self.reduced_parameter_dim
    }

    pub fn reduced_parameter_dim(&self) -> usize {
        self.reduced_parameter_dim
    }

    pub fn lags(&self) -> usize {
        self.lags
    }

    pub fn has_parameters(&self) -> bool {
        self.parameter_dim() > 0
    }

    pub fn alpha_range(&self) -> Range<usize> {
        0..self.alpha_dim
    }

    pub fn parameter_range(&self) -> Range<usize> {
        self.alpha_dim..self.dim()
    }

    /// Range of lag `lag` of the reduced parameters.
    pub fn lag_range(&self, lag: usize) -> Range<usize> {
        assert!(lag < self.lags, "lag out of bounds");
        let start = self.alpha_dim + lag * self.reduced_parameter_dim;
        start..start + self.reduced_parameter_dim
    }

    pub fn check<T: Real>(&self, state: &DVector<T>) -> Result<(), GdeError> {
        check_dimension("composite state", self.dim(), state.len())
    }

    pub fn alpha<T: Real>(&self, state: &DVector<T>) -> DVector<T> {
        state.rows_range(self.alpha_range()).into_owned()
    }

    pub fn parameters<T: Real>(&self, state: &DVector<T>) -> DVector<T> {
        state.rows_range(self.parameter_range()).into_owned()
    }

    pub fn lag<T: Real>(&self, state: &DVector<T>, lag: usize) -> DVector<T> {
        state.rows_range(self.lag_range(lag)).into_owned()
    }

    /// Concatenates the distribution and parameter blocks.
    pub fn compose<T: Real>(&self, alpha: &DVector<T>, parameters: &DVector<T>) -> Result<DVector<T>, GdeError> {
        check_dimension("distribution block", self.alpha_dim, alpha.len())?;
        check_dimension("parameter block", self.parameter_dim(), parameters.len())?;
        let mut state = DVector::zeros(self.dim());
        state.rows_range_mut(self.alpha_range()).copy_from(alpha);
        state.rows_range_mut(self.parameter_range()).copy_from(parameters);
        Ok(state)
    }

    /// Block diagonal covariance from distribution and parameter blocks.
    pub fn compose_covariance<T: Real>(
        &self,
        alpha: &DMatrix<T>,
        parameters: &DMatrix<T>,
    ) -> Result<DMatrix<T>, GdeError> {
        check_dimension("distribution covariance", self.alpha_dim, alpha.nrows())?;
        check_dimension("distribution covariance", self.alpha_dim, alpha.ncols())?;
        check_dimension("parameter covariance", self.parameter_dim(), parameters.nrows())?;
        check_dimension("parameter covariance", self.parameter_dim(), parameters.ncols())?;
        let mut covariance = DMatrix::zeros(self.dim(), self.dim());
        let (n, m) = (self.alpha_dim, self.parameter_dim());
        covariance.view_mut((0, 0), (n, n)).copy_from(alpha);
        covariance.view_mut((n, n), (m, m)).copy_from(parameters);
        Ok(covariance)
    }

    pub fn alpha_covariance<T: Real>(&self, covariance: &DMatrix<T>) -> DMatrix<T> {
        let n = self.alpha_dim;
        covariance.view((0, 0), (n, n)).into_owned()
    }

    pub fn parameter_covariance<T: Real>(&self, covariance: &DMatrix<T>) -> DMatrix<T> {
        let (n, m) = (self.alpha_dim, self.parameter_dim());
        covariance.view((n, n), (m, m)).into_owned()
    }

    /// Cross covariance between the distribution block (rows) and the parameter block.
    pub fn cross_covariance<T: Real>(&self, covariance: &DMatrix<T>) -> DMatrix<T> {
        let (n, m) = (self.alpha_dim, self.parameter_dim());
        covariance.view((0, n), (n, m)).into_owned()
    }
}
