//! The compiled evolution model `dα/dt = F(α, η, t)`.
//!
//! Processes are registered on a [`GdeModelBuilder`] and frozen by
//! [`compile`](GdeModelBuilder::compile). Stationary process operators and the coagulation
//! tensor are assembled once; time-dependent rates are reassembled at every evaluation.
use crate::assembly::{
    assemble_condensation, assemble_deposition, element_rules, finalize_operator, CoagulationTensor,
    DiscretisationSignature, Upwind,
};
use crate::basis::LegendreSpace;
use crate::config::{GdeConfig, ScaleType};
use crate::error::{check_dimension, GdeError};
use crate::mesh::Mesh1d;
use crate::projection::{change_basis_x_to_log_dp, linspace, plotting_points, project, reconstruct};
use crate::quadrature::QuadraturePair1d;
use crate::rate::{CoagulationKernel, Process, RateFunction};
use crate::Real;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::time::Instant;

/// The coefficient vector a function is projected onto.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Target {
    /// The size distribution, as a function of the coordinate `x`.
    Alpha,
    /// The unknown rate, as a function of the particle diameter (µm).
    Eta,
}

/// Where the coagulation tensor comes from.
#[derive(Debug, Clone)]
pub enum CoagulationSource<T> {
    /// Assemble the tensor from the kernel.
    Compute,
    /// Use a tensor assembled earlier, for example one read with
    /// [`CoagulationTensor::load_json`]. It must match the configured discretisation.
    Provided(CoagulationTensor<T>),
}

struct RegisteredRate<T> {
    process: Process,
    rate: Box<dyn RateFunction<T>>,
}

struct UnknownSpec {
    process: Process,
    num_elements: usize,
    nodes_per_element: usize,
}

/// Collects processes before compiling them into a [`GdeModel`].
pub struct GdeModelBuilder<T> {
    config: GdeConfig<T>,
    rates: Vec<RegisteredRate<T>>,
    coagulation: Option<(Box<dyn CoagulationKernel<T>>, CoagulationSource<T>)>,
    unknown: Option<UnknownSpec>,
}

impl<T: Real> GdeModelBuilder<T> {
    pub fn new(config: GdeConfig<T>) -> Self {
        Self {
            config,
            rates: Vec::new(),
            coagulation: None,
            unknown: None,
        }
    }

    fn is_registered(&self, process: Process) -> bool {
        self.rates.iter().any(|r| r.process == process)
            || self.unknown.as_ref().map(|u| u.process) == Some(process)
            || (process == Process::Coagulation && self.coagulation.is_some())
    }

    /// Registers a known condensation or deposition rate.
    pub fn add_process(mut self, process: Process, rate: impl RateFunction<T> + 'static) -> Result<Self, GdeError> {
        if process == Process::Coagulation {
            return Err(GdeError::configuration(
                "coagulation is registered with a kernel through add_coagulation",
            ));
        }
        if self.is_registered(process) {
            return Err(GdeError::configuration(format!("{} is already registered", process)));
        }
        self.rates.push(RegisteredRate {
            process,
            rate: Box::new(rate),
        });
        Ok(self)
    }

    /// Registers coagulation with a symmetric kernel `K(x, y)`.
    pub fn add_coagulation(
        mut self,
        kernel: impl CoagulationKernel<T> + 'static,
        source: CoagulationSource<T>,
    ) -> Result<Self, GdeError> {
        if self.is_registered(Process::Coagulation) {
            return Err(GdeError::configuration("coagulation is already registered"));
        }
        self.coagulation = Some((Box::new(kernel), source));
        Ok(self)
    }

    /// Declares the rate of `process` unknown, discretised on `ln Dp` with `num_elements`
    /// elements of `nodes_per_element` Legendre polynomials.
    pub fn add_unknown(
        mut self,
        process: Process,
        num_elements: usize,
        nodes_per_element: usize,
    ) -> Result<Self, GdeError> {
        if process == Process::Coagulation {
            return Err(GdeError::configuration("only condensation and deposition can be unknown"));
        }
        if self.unknown.is_some() {
            return Err(GdeError::configuration("only one unknown process is supported"));
        }
        if self.is_registered(process) {
            return Err(GdeError::configuration(format!("{} is already registered", process)));
        }
        if num_elements == 0 || nodes_per_element == 0 {
            return Err(GdeError::configuration(
                "the unknown rate needs at least one element and one node per element",
            ));
        }
        self.unknown = Some(UnknownSpec {
            process,
            num_elements,
            nodes_per_element,
        });
        Ok(self)
    }

    pub fn compile(self) -> Result<GdeModel<T>, GdeError> {
        let timer = Instant::now();
        let config = self.config;
        config.validate()?;
        if self.rates.is_empty() && self.coagulation.is_none() && self.unknown.is_none() {
            return Err(GdeError::configuration(
                "the model has no processes and no unknowns registered",
            ));
        }

        let mesh = Mesh1d::uniform(config.x_min, config.x_max, config.num_elements)?;
        let space = LegendreSpace::new(mesh, config.nodes_per_element);
        let mass = space.mass_diagonal();

        let parameter_space = match &self.unknown {
            Some(spec) => {
                let y_min = config.scale.log_diameter(config.x_min);
                let y_max = config.scale.log_diameter(config.x_max);
                let mesh = Mesh1d::uniform(y_min, y_max, spec.num_elements)?;
                Some(LegendreSpace::new(mesh, spec.nodes_per_element))
            }
            None => None,
        };

        // Split the integrals where the parameter field has kinks
        let breakpoints: Vec<T> = parameter_space
            .iter()
            .flat_map(|p| p.mesh().boundaries().iter())
            .map(|&y| config.scale.coordinate_from_log_diameter(y))
            .collect();
        let rules = element_rules(&space, config.quadrature_points, &breakpoints);

        let mut stationary = DMatrix::zeros(space.dim(), space.dim());
        let mut time_dependent = Vec::new();
        for registered in self.rates {
            if registered.rate.is_time_dependent() {
                debug!("Deferring assembly of time-dependent {}", registered.process);
                time_dependent.push(registered);
            } else {
                let operator = process_operator(
                    &space,
                    &rules,
                    &mass,
                    &config,
                    registered.process,
                    |diameter| registered.rate.rate(diameter, T::zero()),
                );
                stationary += operator;
                debug!("Assembled stationary {} operator", registered.process);
            }
        }

        let unknown = match (self.unknown, parameter_space) {
            (Some(spec), Some(parameter_space)) => Some(UnknownProcess::assemble(
                spec.process,
                parameter_space,
                &space,
                &rules,
                &mass,
                &config,
            )),
            _ => None,
        };

        let coagulation = match self.coagulation {
            Some((kernel, CoagulationSource::Compute)) => Some(CoagulationTensor::assemble(&space, &config, &*kernel)),
            Some((kernel, CoagulationSource::Provided(tensor))) => {
                tensor.validate(&DiscretisationSignature::new(&config, kernel.name()))?;
                debug!("Using provided coagulation tensor for kernel {}", kernel.name());
                Some(tensor)
            }
            None => None,
        };

        info!(
            "Compiled GDE model with N = {} ({} x {}), {} unknown parameters, in {:.2?}",
            space.dim(),
            config.num_elements,
            config.nodes_per_element,
            unknown.as_ref().map(|u| u.dim()).unwrap_or(0),
            timer.elapsed()
        );

        Ok(GdeModel {
            config,
            space,
            rules,
            mass,
            stationary,
            time_dependent,
            unknown,
            coagulation,
        })
    }
}

/// Assembles the mass-scaled operator of a known process whose rate is given per diameter.
fn process_operator<T: Real>(
    space: &LegendreSpace<T>,
    rules: &[QuadraturePair1d<T>],
    mass: &DVector<T>,
    config: &GdeConfig<T>,
    process: Process,
    rate: impl Fn(T) -> T,
) -> DMatrix<T> {
    let scale = config.scale;
    let operator = match process {
        Process::Condensation => {
            let growth = |x: T| {
                let diameter = scale.diameter(x);
                scale.condensation_factor(diameter) * rate(diameter)
            };
            assemble_condensation(space, rules, growth, Upwind::BySign, config.boundary_zero)
        }
        Process::Deposition => assemble_deposition(space, rules, |x: T| rate(scale.diameter(x))),
        Process::Coagulation => unreachable!("coagulation is not a rate process"),
    };
    finalize_operator(operator, mass, config.boundary_zero)
}

/// An unknown rate `Σ_k η_k ψ_k(ln Dp)` and its per-basis-function operators `A_k`.
#[derive(Debug, Clone)]
pub struct UnknownProcess<T> {
    process: Process,
    space: LegendreSpace<T>,
    operators: Vec<DMatrix<T>>,
}

impl<T: Real> UnknownProcess<T> {
    fn assemble(
        process: Process,
        parameter_space: LegendreSpace<T>,
        space: &LegendreSpace<T>,
        rules: &[QuadraturePair1d<T>],
        mass: &DVector<T>,
        config: &GdeConfig<T>,
    ) -> Self {
        let scale = config.scale;
        let operators = (0..parameter_space.dim())
            .into_par_iter()
            .map(|k| {
                let psi = |x: T| Self::basis_at(&parameter_space, scale, k, x);
                let operator = match process {
                    Process::Condensation => {
                        let growth = |x: T| scale.condensation_factor(scale.diameter(x)) * psi(x);
                        // Left upwinding keeps the operator linear in η
                        assemble_condensation(space, rules, growth, Upwind::AlwaysLeft, config.boundary_zero)
                    }
                    Process::Deposition => assemble_deposition(space, rules, psi),
                    Process::Coagulation => unreachable!("coagulation cannot be unknown"),
                };
                finalize_operator(operator, mass, config.boundary_zero)
            })
            .collect::<Vec<_>>();
        debug!(
            "Assembled {} operators for unknown {}",
            operators.len(),
            process
        );
        Self {
            process,
            space: parameter_space,
            operators,
        }
    }

    /// `ψ_k(ln Dp(x))`, with `ln Dp` clamped to the parameter domain so that round-off at the
    /// domain ends does not drop the basis function.
    fn basis_at(parameter_space: &LegendreSpace<T>, scale: ScaleType, k: usize, x: T) -> T {
        let mesh = parameter_space.mesh();
        let y = num::clamp(scale.log_diameter(x), mesh.x_min(), mesh.x_max());
        parameter_space.evaluate_basis_function(k, y)
    }

    pub fn process(&self) -> Process {
        self.process
    }

    /// Legendre space of the parameter field over `ln Dp`.
    pub fn space(&self) -> &LegendreSpace<T> {
        &self.space
    }

    pub fn dim(&self) -> usize {
        self.operators.len()
    }

    /// `A_k`, the mass-scaled operator of the `k`-th parameter basis function.
    pub fn operator(&self, k: usize) -> &DMatrix<T> {
        &self.operators[k]
    }

    /// `Σ_k η_k A_k`.
    pub fn combine(&self, eta: &DVector<T>) -> Result<DMatrix<T>, GdeError> {
        check_dimension("unknown parameters", self.dim(), eta.len())?;
        let n = self.operators.first().map(|a| a.nrows()).unwrap_or(0);
        let mut operator = DMatrix::zeros(n, n);
        for (a, &eta_k) in self.operators.iter().zip(eta.iter()) {
            operator += a * eta_k;
        }
        Ok(operator)
    }
}

/// Reconstructed size distribution on a set of points.
#[derive(Debug, Clone)]
pub struct SizeDistributionPlot<T> {
    /// State coordinates of the points.
    pub x: Vec<T>,
    /// Particle diameters (µm) of the points.
    pub diameters: Vec<T>,
    pub n_x: DVector<T>,
    pub sigma_x: Option<DVector<T>>,
    /// `dN/dlog10 Dp`.
    pub n_log_dp: DVector<T>,
    pub sigma_log_dp: Option<DVector<T>>,
}

/// Reconstructed unknown rate as a function of `ln Dp`.
#[derive(Debug, Clone)]
pub struct ParameterPlot<T> {
    pub log_diameters: Vec<T>,
    pub diameters: Vec<T>,
    pub values: DVector<T>,
    pub sigma: Option<DVector<T>>,
}

/// A compiled, immutable evolution model.
pub struct GdeModel<T> {
    config: GdeConfig<T>,
    space: LegendreSpace<T>,
    rules: Vec<QuadraturePair1d<T>>,
    mass: DVector<T>,
    stationary: DMatrix<T>,
    time_dependent: Vec<RegisteredRate<T>>,
    unknown: Option<UnknownProcess<T>>,
    coagulation: Option<CoagulationTensor<T>>,
}

impl<T: Real> GdeModel<T> {
    pub fn config(&self) -> &GdeConfig<T> {
        &self.config
    }

    pub fn space(&self) -> &LegendreSpace<T> {
        &self.space
    }

    /// Number of size distribution coefficients `N`.
    pub fn dim(&self) -> usize {
        self.space.dim()
    }

    /// Number of unknown parameter coefficients `N_eta`, zero without an unknown.
    pub fn parameter_dim(&self) -> usize {
        self.unknown.as_ref().map(|u| u.dim()).unwrap_or(0)
    }

    /// Length of the state `[α ; η]` accepted by [`eval`](Self::eval).
    pub fn state_dim(&self) -> usize {
        self.dim() + self.parameter_dim()
    }

    pub fn unknown(&self) -> Option<&UnknownProcess<T>> {
        self.unknown.as_ref()
    }

    pub fn coagulation(&self) -> Option<&CoagulationTensor<T>> {
        self.coagulation.as_ref()
    }

    /// Splits a state `[α ; η]` into its blocks.
    pub fn split_state(&self, state: &DVector<T>) -> Result<(DVector<T>, Option<DVector<T>>), GdeError> {
        check_dimension("model state", self.state_dim(), state.len())?;
        let n = self.dim();
        let alpha = state.rows(0, n).into_owned();
        let eta = self
            .unknown
            .as_ref()
            .map(|u| state.rows(n, u.dim()).into_owned());
        Ok((alpha, eta))
    }

    /// Sum of the known condensation and deposition operators at `time`.
    pub fn linear_operator(&self, time: T) -> DMatrix<T> {
        let mut operator = self.stationary.clone();
        for registered in &self.time_dependent {
            operator += process_operator(
                &self.space,
                &self.rules,
                &self.mass,
                &self.config,
                registered.process,
                |diameter| registered.rate.rate(diameter, time),
            );
        }
        operator
    }

    /// Operator `Σ_k η_k A_k` of the unknown process.
    pub fn unknown_operator(&self, eta: &DVector<T>) -> Result<DMatrix<T>, GdeError> {
        match &self.unknown {
            Some(unknown) => unknown.combine(eta),
            None => Err(GdeError::configuration("no unknown process is registered")),
        }
    }

    /// Evaluates `dα/dt` for the state `[α ; η]` at `time`.
    pub fn eval(&self, state: &DVector<T>, time: T) -> Result<DVector<T>, GdeError> {
        let (alpha, eta) = self.split_state(state)?;
        let mut derivative = self.linear_operator(time) * &alpha;
        if let Some(eta) = &eta {
            derivative += self.unknown_operator(eta)? * &alpha;
        }
        if let Some(tensor) = &self.coagulation {
            derivative += tensor.contract(&alpha)?;
        }
        Ok(derivative)
    }

    /// Galerkin projection of `f` onto the basis of `target`.
    ///
    /// For [`Target::Alpha`], `f` is a function of the coordinate `x`. For [`Target::Eta`],
    /// `f` is a function of the particle diameter.
    pub fn compute_coefficients(&self, target: Target, f: impl Fn(T) -> T) -> Result<DVector<T>, GdeError> {
        let points = self.config.quadrature_points;
        match target {
            Target::Alpha => Ok(project(&self.space, points, f)),
            Target::Eta => match &self.unknown {
                Some(unknown) => Ok(project(unknown.space(), points, |y: T| f(y.exp()))),
                None => Err(GdeError::configuration(
                    "parameter coefficients need an unknown process",
                )),
            },
        }
    }

    /// Reconstructs the size distribution from `alpha`, on `points` or on the default
    /// plotting grid, with standard deviations when `covariance` is given.
    pub fn nplot_discretisation(
        &self,
        alpha: &DVector<T>,
        covariance: Option<&DMatrix<T>>,
        points: Option<&[T]>,
    ) -> Result<SizeDistributionPlot<T>, GdeError> {
        let points = match points {
            Some(points) => points.to_vec(),
            None => plotting_points(&self.space),
        };
        let reconstruction = reconstruct(&self.space, alpha, covariance, &points)?;
        let scale = self.config.scale;
        let n_log_dp = change_basis_x_to_log_dp(&reconstruction.values, &points, scale)?;
        let sigma_log_dp = reconstruction
            .sigma
            .as_ref()
            .map(|sigma| change_basis_x_to_log_dp(sigma, &points, scale))
            .transpose()?;
        Ok(SizeDistributionPlot {
            diameters: points.iter().map(|&x| scale.diameter(x)).collect(),
            x: points,
            n_x: reconstruction.values,
            sigma_x: reconstruction.sigma,
            n_log_dp,
            sigma_log_dp,
        })
    }

    /// Reconstructs the unknown rate of `process` from `eta` on a uniform grid over `ln Dp`.
    pub fn parameter_estimation_discretisation(
        &self,
        process: Process,
        eta: &DVector<T>,
        covariance: Option<&DMatrix<T>>,
    ) -> Result<ParameterPlot<T>, GdeError> {
        let unknown = match &self.unknown {
            Some(unknown) if unknown.process() == process => unknown,
            _ => {
                return Err(GdeError::configuration(format!(
                    "{} is not registered as unknown",
                    process
                )))
            }
        };
        let mesh = unknown.space().mesh();
        let points = linspace(mesh.x_min(), mesh.x_max(), 5 * unknown.dim());
        let reconstruction = reconstruct(unknown.space(), eta, covariance, &points)?;
        Ok(ParameterPlot {
            diameters: points.iter().map(|&y| y.exp()).collect(),
            log_diameters: points,
            values: reconstruction.values,
            sigma: reconstruction.sigma,
        })
    }
}
