//! Drivers: forward evolution and joint state and parameter estimation.
use crate::config::EstimatorConfig;
use crate::error::{check_dimension, GdeError};
use crate::kalman::{rts_smooth, ApproximationError, GaussianEstimate, KalmanFilter, KalmanTrajectory};
use crate::linearize::CrankNicolson;
use crate::model::GdeModel;
use crate::parameter::{ParameterModel, VarModel};
use crate::state::StateLayout;
use crate::Real;
use gde_traits::from_usize;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use std::time::Instant;

fn step_time<T: Real>(dt: T, k: usize) -> T {
    dt * from_usize::<T>(k)
}

/// Coefficients of a forward simulation at `times[k] = k dt`.
#[derive(Debug, Clone)]
pub struct Evolution<T> {
    pub times: Vec<T>,
    pub coefficients: Vec<DVector<T>>,
}

/// Evolves `alpha0` over `num_steps - 1` Crank-Nicolson steps of size `dt`.
pub fn evolve<T: Real>(
    model: &GdeModel<T>,
    alpha0: &DVector<T>,
    dt: T,
    num_steps: usize,
) -> Result<Evolution<T>, GdeError> {
    check_dimension("initial coefficients", model.dim(), alpha0.len())?;
    if num_steps == 0 {
        return Err(GdeError::configuration("evolution needs at least one time step"));
    }
    let timer = Instant::now();
    let cn = CrankNicolson::new(model, dt)?;
    let mut times = Vec::with_capacity(num_steps);
    let mut coefficients = Vec::with_capacity(num_steps);
    times.push(T::zero());
    coefficients.push(alpha0.clone());

    for k in 0..num_steps - 1 {
        let alpha = &coefficients[k];
        let transition = cn.transition(alpha, times[k]).map_err(|e| e.at_step(k))?;
        let next = transition.apply(alpha);
        coefficients.push(next);
        times.push(step_time(dt, k + 1));
    }
    info!(
        "Evolved {} coefficients over {} steps in {:.2?}",
        model.dim(),
        num_steps,
        timer.elapsed()
    );
    Ok(Evolution { times, coefficients })
}

/// Result of [`JointEstimator::run`].
#[derive(Debug, Clone)]
pub struct EstimationResult<T> {
    pub times: Vec<T>,
    pub layout: StateLayout,
    pub trajectory: KalmanTrajectory<T>,
    pub smoothed: Option<Vec<GaussianEstimate<T>>>,
}

impl<T: Real> EstimationResult<T> {
    /// Smoothed estimates if smoothing was run, filtered estimates otherwise.
    pub fn estimates(&self) -> &[GaussianEstimate<T>] {
        match &self.smoothed {
            Some(smoothed) => smoothed,
            None => &self.trajectory.filtered,
        }
    }
}

/// Distribution and parameter estimate at one step, in unreduced coordinates.
#[derive(Debug, Clone)]
pub struct UnconstrainedEstimate<T> {
    pub alpha: DVector<T>,
    pub alpha_covariance: DMatrix<T>,
    pub eta: Option<DVector<T>>,
    pub eta_covariance: Option<DMatrix<T>>,
}

/// Kalman estimation of the size distribution, jointly with the unknown process rate when
/// the model has one.
///
/// The composite state is `[α ; η̃_c]`. Every step linearises the model at the current
/// estimate, predicts, and updates with the observation of the next step.
pub struct JointEstimator<'a, T> {
    model: &'a GdeModel<T>,
    config: EstimatorConfig<T>,
    alpha_observation_operator: DMatrix<T>,
    parameters: Option<ParameterModel<T>>,
    approximation_error: Option<ApproximationError<T>>,
    layout: StateLayout,
    filter: KalmanFilter<T>,
    base_noise: DMatrix<T>,
}

impl<'a, T: Real> JointEstimator<'a, T> {
    /// Creates an estimator for observations `y = H α + v`, with `H` of shape `M × N`.
    ///
    /// Unknown parameters follow a random walk unless changed with
    /// [`with_var_coefficients`](Self::with_var_coefficients).
    pub fn new(
        model: &'a GdeModel<T>,
        config: EstimatorConfig<T>,
        observation_operator: DMatrix<T>,
    ) -> Result<Self, GdeError> {
        config.validate()?;
        check_dimension("observation operator columns", model.dim(), observation_operator.ncols())?;
        let parameters = match model.unknown() {
            Some(unknown) => {
                if config.eta_prior.is_none() {
                    return Err(GdeError::configuration(
                        "estimating an unknown process needs a parameter prior and process noise",
                    ));
                }
                Some(ParameterModel::random_walk(unknown.space())?)
            }
            None => {
                if config.eta_prior.is_some() {
                    warn!("Parameter noise is configured, but the model has no unknown process");
                }
                None
            }
        };
        Self::assemble(model, config, observation_operator, parameters, None)
    }

    fn assemble(
        model: &'a GdeModel<T>,
        config: EstimatorConfig<T>,
        alpha_observation_operator: DMatrix<T>,
        parameters: Option<ParameterModel<T>>,
        approximation_error: Option<ApproximationError<T>>,
    ) -> Result<Self, GdeError> {
        let n = model.dim();
        let layout = match &parameters {
            Some(p) => StateLayout::new(n, p.reduced_dim(), p.order()),
            None => StateLayout::alpha_only(n),
        };

        let mut h = DMatrix::zeros(alpha_observation_operator.nrows(), layout.dim());
        h.view_mut((0, 0), (alpha_observation_operator.nrows(), n))
            .copy_from(&alpha_observation_operator);
        let mut filter = KalmanFilter::new(h);
        if let Some(error) = &approximation_error {
            filter = filter.with_approximation_error(error.clone())?;
        }

        let (ne, np) = (model.config().num_elements, model.config().nodes_per_element);
        let alpha_noise = config.alpha_process.covariance(ne, np)?;
        let base_noise = match (&parameters, &config.eta_process, model.unknown()) {
            (Some(p), Some(eta_process), Some(unknown)) => {
                let space = unknown.space();
                let eta_noise = eta_process.covariance(space.num_elements(), space.nodes_per_element())?;
                layout.compose_covariance(&alpha_noise, &p.process_noise(&eta_noise)?)?
            }
            _ => alpha_noise,
        };
        debug!(
            "Estimator state has {} entries ({} distribution, {} parameter)",
            layout.dim(),
            layout.alpha_dim(),
            layout.parameter_dim()
        );

        Ok(Self {
            model,
            config,
            alpha_observation_operator,
            parameters,
            approximation_error,
            layout,
            filter,
            base_noise,
        })
    }

    /// Replaces the random walk with the VAR(p) coefficients `A_1, …, A_p` on the unreduced
    /// parameters.
    pub fn with_var_coefficients(self, coefficients: Vec<DMatrix<T>>) -> Result<Self, GdeError> {
        let constraint = match &self.parameters {
            Some(p) => p.constraint().clone(),
            None => return Err(GdeError::configuration("VAR coefficients need an unknown process")),
        };
        let parameters = ParameterModel::new(constraint, VarModel::new(coefficients)?)?;
        Self::assemble(
            self.model,
            self.config,
            self.alpha_observation_operator,
            Some(parameters),
            self.approximation_error,
        )
    }

    /// Adds a fixed approximation error to every prediction. It is given on the composite
    /// state.
    pub fn with_approximation_error(self, error: ApproximationError<T>) -> Result<Self, GdeError> {
        Self::assemble(
            self.model,
            self.config,
            self.alpha_observation_operator,
            self.parameters,
            Some(error),
        )
    }

    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    pub fn parameter_model(&self) -> Option<&ParameterModel<T>> {
        self.parameters.as_ref()
    }

    pub fn filter(&self) -> &KalmanFilter<T> {
        &self.filter
    }

    /// Per-step process noise before the parameter coupling is applied.
    pub fn base_noise(&self) -> &DMatrix<T> {
        &self.base_noise
    }

    /// Prior on the composite state from the configured prior covariances.
    pub fn prior(&self, alpha_mean: &DVector<T>, eta_mean: Option<&DVector<T>>) -> Result<GaussianEstimate<T>, GdeError> {
        check_dimension("distribution prior", self.model.dim(), alpha_mean.len())?;
        let config = self.model.config();
        let alpha_covariance = self
            .config
            .alpha_prior
            .covariance(config.num_elements, config.nodes_per_element)?;
        match (&self.parameters, self.model.unknown()) {
            (Some(parameters), Some(unknown)) => {
                let eta_mean = eta_mean.ok_or_else(|| GdeError::configuration("the parameter prior needs a mean"))?;
                let eta_prior = self
                    .config
                    .eta_prior
                    .as_ref()
                    .ok_or_else(|| GdeError::configuration("no parameter prior covariance is configured"))?;
                let space = unknown.space();
                let eta_covariance = eta_prior.covariance(space.num_elements(), space.nodes_per_element())?;
                let (mean, covariance) = parameters.prior(eta_mean, &eta_covariance)?;
                GaussianEstimate::new(
                    self.layout.compose(alpha_mean, &mean)?,
                    self.layout.compose_covariance(&alpha_covariance, &covariance)?,
                )
            }
            _ => GaussianEstimate::new(alpha_mean.clone(), alpha_covariance),
        }
    }

    /// Filters the observations `y_0, …, y_{NT-1}` starting from `prior` at step 0, and
    /// smooths the trajectory when configured. The observation at step 0 is not used.
    pub fn run(&self, prior: GaussianEstimate<T>, observations: &[DVector<T>]) -> Result<EstimationResult<T>, GdeError> {
        let timer = Instant::now();
        let num_steps = self.config.num_steps;
        check_dimension("observation time steps", num_steps, observations.len())?;
        check_dimension("prior", self.layout.dim(), prior.dim())?;
        let observation_covariances = self
            .config
            .observation
            .covariances(observations, self.filter.observation_dim())?;
        let cn = CrankNicolson::new(self.model, self.config.dt)?;

        let mut times = vec![T::zero()];
        let mut trajectory = KalmanTrajectory::new(prior);
        for k in 0..num_steps - 1 {
            let time = times[k];
            let current = trajectory.last();
            let (transition, noise) = match &self.parameters {
                Some(parameters) => {
                    let step = cn
                        .joint_transition(&current.mean, time, parameters)
                        .map_err(|e| e.at_step(k))?;
                    let noise = step.process_noise(&self.base_noise);
                    (step.transition, noise)
                }
                None => (
                    cn.transition(&current.mean, time).map_err(|e| e.at_step(k))?,
                    self.base_noise.clone(),
                ),
            };

            let predicted = self.filter.predict(current, &transition, &noise, k + 1)?;
            let updated = self
                .filter
                .update(&predicted, &observations[k + 1], &observation_covariances[k + 1], k + 1)?;
            debug!(
                "Step {}: predicted trace {:?}, filtered trace {:?}",
                k + 1,
                predicted.covariance.trace(),
                updated.covariance.trace()
            );
            trajectory.push(transition.matrix, predicted, updated);
            times.push(step_time(self.config.dt, k + 1));
        }

        let smoothed = if self.config.smoothing {
            Some(rts_smooth(&trajectory)?)
        } else {
            None
        };
        info!(
            "Estimated {} steps of a {}-dimensional state in {:.2?}",
            num_steps,
            self.layout.dim(),
            timer.elapsed()
        );
        Ok(EstimationResult {
            times,
            layout: self.layout,
            trajectory,
            smoothed,
        })
    }

    /// Expands the estimates of `result` to the unreduced distribution and current
    /// parameter coefficients.
    pub fn unconstrained(&self, result: &EstimationResult<T>) -> Result<Vec<UnconstrainedEstimate<T>>, GdeError> {
        result
            .estimates()
            .iter()
            .map(|estimate| {
                self.layout.check(&estimate.mean)?;
                let (eta, eta_covariance) = match &self.parameters {
                    Some(parameters) => {
                        let eta = parameters.current(&self.layout.parameters(&estimate.mean))?;
                        let covariance =
                            parameters.current_covariance(&self.layout.parameter_covariance(&estimate.covariance))?;
                        (Some(eta), Some(covariance))
                    }
                    None => (None, None),
                };
                Ok(UnconstrainedEstimate {
                    alpha: self.layout.alpha(&estimate.mean),
                    alpha_covariance: self.layout.alpha_covariance(&estimate.covariance),
                    eta,
                    eta_covariance,
                })
            })
            .collect()
    }
}
