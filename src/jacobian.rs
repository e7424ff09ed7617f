//! Exact Jacobians of the compiled evolution model.
//!
//! Condensation and deposition are linear in `α`, so they contribute their operators
//! directly. The unknown process is bilinear in `(α, η)`, and coagulation contributes the
//! state-dependent `(T_i + T_iᵀ) α` rows.
use crate::calculus::approximate_jacobian_fd;
use crate::error::GdeError;
use crate::model::GdeModel;
use crate::Real;
use nalgebra::{DMatrix, DVector};

#[derive(Clone, Copy)]
pub struct GdeJacobian<'a, T> {
    model: &'a GdeModel<T>,
}

impl<'a, T: Real> GdeJacobian<'a, T> {
    pub fn new(model: &'a GdeModel<T>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'a GdeModel<T> {
        self.model
    }

    /// `∂F/∂α` at the state `[α ; η]`, of shape `N × N`.
    pub fn eval_d_alpha(&self, state: &DVector<T>, time: T) -> Result<DMatrix<T>, GdeError> {
        let (alpha, eta) = self.model.split_state(state)?;
        let mut jacobian = self.model.linear_operator(time);
        if let Some(eta) = &eta {
            jacobian += self.model.unknown_operator(eta)?;
        }
        if let Some(tensor) = self.model.coagulation() {
            jacobian += tensor.jacobian(&alpha)?;
        }
        Ok(jacobian)
    }

    /// `∂F/∂η` at the state `[α ; η]`, of shape `N × N_eta`. Column `k` is `A_k α`.
    pub fn eval_d_eta(&self, state: &DVector<T>, _time: T) -> Result<DMatrix<T>, GdeError> {
        let unknown = self
            .model
            .unknown()
            .ok_or_else(|| GdeError::configuration("parameter Jacobian needs an unknown process"))?;
        let (alpha, _) = self.model.split_state(state)?;
        let mut jacobian = DMatrix::zeros(self.model.dim(), unknown.dim());
        for k in 0..unknown.dim() {
            jacobian.set_column(k, &(unknown.operator(k) * &alpha));
        }
        Ok(jacobian)
    }

    /// Full Jacobian `[∂F/∂α  ∂F/∂η]` with respect to the whole state.
    pub fn eval_d_state(&self, state: &DVector<T>, time: T) -> Result<DMatrix<T>, GdeError> {
        let d_alpha = self.eval_d_alpha(state, time)?;
        if self.model.unknown().is_none() {
            return Ok(d_alpha);
        }
        let d_eta = self.eval_d_eta(state, time)?;
        let n = self.model.dim();
        let mut jacobian = DMatrix::zeros(n, self.model.state_dim());
        jacobian.view_mut((0, 0), (n, n)).copy_from(&d_alpha);
        jacobian
            .view_mut((0, n), (n, d_eta.ncols()))
            .copy_from(&d_eta);
        Ok(jacobian)
    }

    /// Central finite difference approximation of [`eval_d_state`](Self::eval_d_state), used
    /// to check the analytic Jacobian.
    pub fn approximate(&self, state: &DVector<T>, time: T, h: T) -> Result<DMatrix<T>, GdeError> {
        approximate_jacobian_fd(|x| self.model.eval(x, time), state, h)
    }
}
