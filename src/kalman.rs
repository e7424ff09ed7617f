//! Kalman filter with explicit per-step transitions and a fixed-interval RTS smoother.
//!
//! The filter holds only time-invariant data (observation operator and the optional
//! approximation error). Transitions and noise covariances are passed into every call.
use crate::error::{check_dimension, GdeError, NumericalOperation};
use crate::linearize::AffineTransition;
use crate::Real;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;

/// Mean and covariance of a Gaussian state estimate.
#[derive(Debug, Clone)]
pub struct GaussianEstimate<T> {
    pub mean: DVector<T>,
    pub covariance: DMatrix<T>,
}

impl<T: Real> GaussianEstimate<T> {
    pub fn new(mean: DVector<T>, covariance: DMatrix<T>) -> Result<Self, GdeError> {
        check_dimension("covariance rows", mean.len(), covariance.nrows())?;
        check_dimension("covariance columns", mean.len(), covariance.ncols())?;
        Ok(Self { mean, covariance })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

/// A fixed model error `ε ~ N(mean, covariance)` added to every prediction.
#[derive(Debug, Clone)]
pub struct ApproximationError<T> {
    pub mean: DVector<T>,
    pub covariance: DMatrix<T>,
}

#[derive(Debug, Clone)]
pub struct KalmanFilter<T> {
    observation_operator: DMatrix<T>,
    approximation_error: Option<ApproximationError<T>>,
}

impl<T: Real> KalmanFilter<T> {
    /// Creates a filter for the observation model `y = H x + v`.
    pub fn new(observation_operator: DMatrix<T>) -> Self {
        Self {
            observation_operator,
            approximation_error: None,
        }
    }

    pub fn with_approximation_error(self, error: ApproximationError<T>) -> Result<Self, GdeError> {
        check_dimension("approximation error mean", self.state_dim(), error.mean.len())?;
        check_dimension("approximation error covariance", self.state_dim(), error.covariance.nrows())?;
        check_dimension("approximation error covariance", self.state_dim(), error.covariance.ncols())?;
        Ok(Self {
            approximation_error: Some(error),
            ..self
        })
    }

    pub fn observation_operator(&self) -> &DMatrix<T> {
        &self.observation_operator
    }

    pub fn state_dim(&self) -> usize {
        self.observation_operator.ncols()
    }

    pub fn observation_dim(&self) -> usize {
        self.observation_operator.nrows()
    }

    /// Predicts the estimate at step `step + 1` from the estimate at `step`.
    ///
    /// `x' = F x + b (+ ε̄)`, `P' = F P Fᵀ + Q (+ Γ_ε)`.
    pub fn predict(
        &self,
        estimate: &GaussianEstimate<T>,
        transition: &AffineTransition<T>,
        process_noise: &DMatrix<T>,
        step: usize,
    ) -> Result<GaussianEstimate<T>, GdeError> {
        let n = self.state_dim();
        check_estimate("predicted state", n, estimate)?;
        check_dimension("transition matrix", n, transition.matrix.nrows())?;
        check_dimension("transition matrix", n, transition.matrix.ncols())?;
        check_dimension("transition vector", n, transition.vector.len())?;
        check_dimension("process noise", n, process_noise.nrows())?;
        check_dimension("process noise", n, process_noise.ncols())?;

        let f = &transition.matrix;
        let mut mean = f * &estimate.mean + &transition.vector;
        let mut covariance = f * &estimate.covariance * f.transpose() + process_noise;
        if let Some(error) = &self.approximation_error {
            mean += &error.mean;
            covariance += &error.covariance;
        }
        symmetrize(&mut covariance);
        check_finite(&mean, &covariance, step)?;
        Ok(GaussianEstimate { mean, covariance })
    }

    /// Corrects the prediction at `step` with the observation `y`, using the Joseph form of
    /// the covariance update.
    pub fn update(
        &self,
        predicted: &GaussianEstimate<T>,
        observation: &DVector<T>,
        observation_noise: &DMatrix<T>,
        step: usize,
    ) -> Result<GaussianEstimate<T>, GdeError> {
        let (n, m) = (self.state_dim(), self.observation_dim());
        check_estimate("updated state", n, predicted)?;
        check_dimension("observation vector", m, observation.len())?;
        check_dimension("observation noise", m, observation_noise.nrows())?;
        check_dimension("observation noise", m, observation_noise.ncols())?;

        let h = &self.observation_operator;
        let p = &predicted.covariance;
        let hp = h * p;
        let mut innovation_covariance = &hp * h.transpose() + observation_noise;
        symmetrize(&mut innovation_covariance);
        let cholesky = innovation_covariance.cholesky().ok_or(GdeError::Numerical {
            step: Some(step),
            operation: NumericalOperation::InnovationFactorization,
        })?;
        // K = P Hᵀ S⁻¹ = (S⁻¹ H P)ᵀ since P and S are symmetric
        let gain = cholesky.solve(&hp).transpose();

        let innovation = observation - h * &predicted.mean;
        let mean = &predicted.mean + &gain * innovation;

        let i_kh = DMatrix::identity(n, n) - &gain * h;
        let mut covariance = &i_kh * p * i_kh.transpose() + &gain * observation_noise * gain.transpose();
        symmetrize(&mut covariance);
        check_finite(&mean, &covariance, step)?;
        Ok(GaussianEstimate { mean, covariance })
    }
}

/// Filtered and predicted estimates of a complete forward pass, with the transition
/// matrices used between consecutive steps.
///
/// `predicted[0]` is the prior, and `transitions[k]` maps step `k` to step `k + 1`.
#[derive(Debug, Clone)]
pub struct KalmanTrajectory<T> {
    pub filtered: Vec<GaussianEstimate<T>>,
    pub predicted: Vec<GaussianEstimate<T>>,
    pub transitions: Vec<DMatrix<T>>,
}

impl<T: Real> KalmanTrajectory<T> {
    pub fn new(prior: GaussianEstimate<T>) -> Self {
        Self {
            filtered: vec![prior.clone()],
            predicted: vec![prior],
            transitions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub fn last(&self) -> &GaussianEstimate<T> {
        &self.filtered[self.filtered.len() - 1]
    }

    pub fn push(&mut self, transition: DMatrix<T>, predicted: GaussianEstimate<T>, filtered: GaussianEstimate<T>) {
        self.transitions.push(transition);
        self.predicted.push(predicted);
        self.filtered.push(filtered);
    }
}

/// Rauch-Tung-Striebel fixed-interval smoother.
///
/// With `C_k = P_k F_kᵀ (P_{k+1|k})⁻¹`, runs backwards
/// `x_k^s = x_k + C_k (x_{k+1}^s - x_{k+1|k})` and
/// `P_k^s = P_k + C_k (P_{k+1}^s - P_{k+1|k}) C_kᵀ`.
pub fn rts_smooth<T: Real>(trajectory: &KalmanTrajectory<T>) -> Result<Vec<GaussianEstimate<T>>, GdeError> {
    let steps = trajectory.len();
    check_dimension("predicted estimates", steps, trajectory.predicted.len())?;
    check_dimension("transitions", steps.saturating_sub(1), trajectory.transitions.len())?;
    if steps == 0 {
        return Ok(Vec::new());
    }
    for (k, filtered) in trajectory.filtered.iter().enumerate() {
        let n = filtered.dim();
        check_estimate("filtered estimate", n, filtered)?;
        check_estimate("predicted estimate", n, &trajectory.predicted[k])?;
        if let Some(f) = k.checked_sub(1).map(|j| &trajectory.transitions[j]) {
            // F_{k-1} maps step k - 1 onto step k
            check_dimension("smoother transition", n, f.nrows())?;
            check_dimension("smoother transition", trajectory.filtered[k - 1].dim(), f.ncols())?;
        }
    }

    let mut smoothed = trajectory.filtered.clone();
    for k in (0..steps - 1).rev() {
        let filtered = &trajectory.filtered[k];
        let predicted = &trajectory.predicted[k + 1];
        let f = &trajectory.transitions[k];

        let cholesky = predicted.covariance.clone().cholesky().ok_or(GdeError::Numerical {
            step: Some(k),
            operation: NumericalOperation::SmootherGain,
        })?;
        // Cᵀ = P_{k+1|k}⁻¹ F P_k
        let gain = cholesky.solve(&(f * &filtered.covariance)).transpose();

        let next = &smoothed[k + 1];
        let mean = &filtered.mean + &gain * (&next.mean - &predicted.mean);
        let mut covariance =
            &filtered.covariance + &gain * (&next.covariance - &predicted.covariance) * gain.transpose();
        symmetrize(&mut covariance);
        smoothed[k] = GaussianEstimate { mean, covariance };
    }
    Ok(smoothed)
}

/// Symmetrises a matrix in place, `P <- (P + Pᵀ) / 2`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub(crate) fn symmetrize<T: Real>(matrix: &mut DMatrix<T>) {
    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let mean = 0.5 * (matrix[(i, j)] + matrix[(j, i)]);
            matrix[(i, j)] = mean;
            matrix[(j, i)] = mean;
        }
    }
}

/// Checks that the mean has length `n` and the covariance is `n x n`.
fn check_estimate<T: Real>(context: &'static str, n: usize, estimate: &GaussianEstimate<T>) -> Result<(), GdeError> {
    check_dimension(context, n, estimate.mean.len())?;
    check_dimension(context, n, estimate.covariance.nrows())?;
    check_dimension(context, n, estimate.covariance.ncols())
}

fn check_finite<T: Real>(mean: &DVector<T>, covariance: &DMatrix<T>, step: usize) -> Result<(), GdeError> {
    if mean.iter().chain(covariance.iter()).all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(GdeError::Numerical {
            step: Some(step),
            operation: NumericalOperation::NonFiniteResult,
        })
    }
}
