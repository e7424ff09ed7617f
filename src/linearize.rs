//! Crank-Nicolson linearisation of the evolution model about the current state.
//!
//! With `J = ∂F/∂α` at `α_k` and the bias `c = F(α_k) - J α_k`, the trapezoidal step
//! `α_{k+1} = α_k + dt/2 (F_k + F_{k+1})` with `F_{k+1} ≈ J α_{k+1} + c` gives
//!
//! ```text
//! α_{k+1} = M (I + dt/2 J) α_k + M dt c,    M = (I - dt/2 J)⁻¹.
//! ```
//!
//! The Jacobian is not re-evaluated at the new state, so there is no inner iteration.
use crate::error::{GdeError, NumericalOperation};
use crate::jacobian::GdeJacobian;
use crate::kalman::symmetrize;
use crate::model::GdeModel;
use crate::parameter::ParameterModel;
use crate::state::StateLayout;
use crate::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;

/// The map `x -> F x + b`.
#[derive(Debug, Clone)]
pub struct AffineTransition<T> {
    pub matrix: DMatrix<T>,
    pub vector: DVector<T>,
}

impl<T: Real> AffineTransition<T> {
    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn apply(&self, x: &DVector<T>) -> DVector<T> {
        &self.matrix * x + &self.vector
    }
}

/// A linearised step of the joint state `[α ; η̃_c]`.
#[derive(Debug, Clone)]
pub struct JointStep<T> {
    pub transition: AffineTransition<T>,
    /// `T = [[I, L], [0, I]]`, where `L = M (dt/2) J_η U` acts on the newest parameter lag.
    /// Noise on the parameters enters the distribution through `L`.
    pub noise_transform: DMatrix<T>,
}

impl<T: Real> JointStep<T> {
    /// Process noise of this step, `T Q Tᵀ`, from the noise `Q` of independent distribution
    /// and parameter perturbations.
    pub fn process_noise(&self, base: &DMatrix<T>) -> DMatrix<T> {
        let t = &self.noise_transform;
        let mut noise = t * base * t.transpose();
        symmetrize(&mut noise);
        noise
    }
}

pub struct CrankNicolson<'a, T> {
    jacobian: GdeJacobian<'a, T>,
    dt: T,
}

impl<'a, T: Real> CrankNicolson<'a, T> {
    pub fn new(model: &'a GdeModel<T>, dt: T) -> Result<Self, GdeError> {
        if !(dt > T::zero()) {
            return Err(GdeError::configuration("time step must be positive"));
        }
        Ok(Self {
            jacobian: GdeJacobian::new(model),
            dt,
        })
    }

    pub fn dt(&self) -> T {
        self.dt
    }

    pub fn model(&self) -> &'a GdeModel<T> {
        self.jacobian.model()
    }

    /// Returns `M = (I - dt/2 J)⁻¹`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn implicit_inverse(&self, jacobian: &DMatrix<T>) -> Result<DMatrix<T>, GdeError> {
        let n = jacobian.nrows();
        let implicit = DMatrix::identity(n, n) - jacobian * (self.dt / 2.0);
        let lu = implicit.lu();

        // Treat pivots at round-off level as exact zeros
        let pivots = lu.u().diagonal();
        let largest = pivots.amax().max(1.0);
        if pivots.iter().any(|u| u.abs() <= 1e-12 * largest) {
            return Err(GdeError::numerical(NumericalOperation::CrankNicolsonInverse));
        }
        let inverse = lu
            .try_inverse()
            .ok_or_else(|| GdeError::numerical(NumericalOperation::CrankNicolsonInverse))?;
        if inverse.iter().all(|x| x.is_finite()) {
            Ok(inverse)
        } else {
            Err(GdeError::numerical(NumericalOperation::CrankNicolsonInverse))
        }
    }

    /// Transition of the distribution coefficients for a model without unknown parameters.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn transition(&self, alpha: &DVector<T>, time: T) -> Result<AffineTransition<T>, GdeError> {
        let model = self.model();
        if model.unknown().is_some() {
            return Err(GdeError::configuration(
                "a model with unknown parameters is linearised with joint_transition",
            ));
        }
        let n = model.dim();
        let j = self.jacobian.eval_d_alpha(alpha, time)?;
        let bias = model.eval(alpha, time)? - &j * alpha;
        let m = self.implicit_inverse(&j)?;

        let matrix = &m * (DMatrix::identity(n, n) + &j * (self.dt / 2.0));
        let vector = &m * (bias * self.dt);
        Ok(AffineTransition { matrix, vector })
    }

    /// Transition of the joint state `[α ; η̃_c]`, linearised at `state`.
    ///
    /// The distribution block uses the current parameters `η_k = U C η̃_c`. The parameter
    /// lags evolve under their reduced VAR transition and do not depend on `α`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn joint_transition(
        &self,
        state: &DVector<T>,
        time: T,
        parameters: &ParameterModel<T>,
    ) -> Result<JointStep<T>, GdeError> {
        let model = self.model();
        let n = model.dim();
        let layout = StateLayout::new(n, parameters.reduced_dim(), parameters.order());
        layout.check(state)?;
        if model.parameter_dim() != parameters.full_dim() {
            return Err(GdeError::DimensionMismatch {
                context: "parameter model",
                expected: model.parameter_dim(),
                actual: parameters.full_dim(),
            });
        }

        let alpha = layout.alpha(state);
        let eta = parameters.current(&layout.parameters(state))?;
        let mut full = DVector::zeros(model.state_dim());
        full.rows_mut(0, n).copy_from(&alpha);
        full.rows_mut(n, eta.len()).copy_from(&eta);

        let j = self.jacobian.eval_d_alpha(&full, time)?;
        let j_eta = self.jacobian.eval_d_eta(&full, time)?;
        let bias = model.eval(&full, time)? - &j * &alpha - &j_eta * &eta;
        let m = self.implicit_inverse(&j)?;

        // L = M (dt/2) J_η, acting on unreduced parameters
        let l = &m * &j_eta * (self.dt / 2.0);
        let dim = layout.dim();
        let mut matrix = DMatrix::zeros(dim, dim);
        matrix
            .view_mut((0, 0), (n, n))
            .copy_from(&(&m * (DMatrix::identity(n, n) + &j * (self.dt / 2.0))));
        let stacked = layout.parameter_dim();
        matrix
            .view_mut((0, n), (n, stacked))
            .copy_from(&(&l * parameters.alpha_coupling()));
        matrix
            .view_mut((n, n), (stacked, stacked))
            .copy_from(parameters.reduced_transition());

        let mut vector = DVector::zeros(dim);
        vector.rows_mut(0, n).copy_from(&(&m * (bias * self.dt)));

        let mut noise_transform = DMatrix::identity(dim, dim);
        let lag0 = layout.lag_range(0);
        noise_transform
            .view_mut((0, lag0.start), (n, lag0.len()))
            .copy_from(&(&l * parameters.constraint().u()));

        Ok(JointStep {
            transition: AffineTransition { matrix, vector },
            noise_transform,
        })
    }
}
