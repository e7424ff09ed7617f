//! Continuity-constrained parameter fields with vector autoregressive dynamics.
//!
//! An unknown rate is discretised element-wise and is in general discontinuous at element
//! boundaries. The continuous fields form the null space of the interface jump constraints
//! `G η = 0`. With an orthonormal basis `U` of that space, `η = U η_c` and `η_c = Uᵀ η`.
//!
//! Over time the reduced parameters follow a VAR(p) model
//! `η_{k+1} = A_1 η_k + … + A_p η_{k-p+1} + w_k`, written as a first order system on the
//! stacked lags `η̃_k = [η_k ; … ; η_{k-p+1}]` with a block companion matrix.
use crate::basis::{legendre_endpoint, LegendreSpace};
use crate::error::{check_dimension, GdeError, NumericalOperation};
use crate::Real;
use log::debug;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Orthonormal basis `U` of the continuous piecewise polynomials on a Legendre space.
#[derive(Debug, Clone)]
pub struct ContinuityConstraint<T> {
    u: DMatrix<T>,
}

impl<T: Real> ContinuityConstraint<T> {
    pub fn new(space: &LegendreSpace<T>) -> Result<Self, GdeError> {
        let n = space.dim();
        let num_constraints = space.num_elements() - 1;
        if num_constraints == 0 {
            return Ok(Self {
                u: DMatrix::identity(n, n),
            });
        }
        let reduced_dim = n - num_constraints;

        let g = Self::constraint_matrix(space);
        let eigen = SymmetricEigen::new(g.tr_mul(&g));
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| {
            eigen.eigenvalues[i]
                .partial_cmp(&eigen.eigenvalues[j])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // The constraints are independent, so exactly `reduced_dim` eigenvalues vanish
        let largest = eigen.eigenvalues[order[n - 1]].abs();
        let tolerance = T::from_f64(1e-8).expect("Literal must fit in T") * largest.max(T::one());
        let first_nonzero = eigen.eigenvalues[order[reduced_dim]];
        let last_zero = eigen.eigenvalues[order[reduced_dim - 1]];
        if !(first_nonzero > tolerance) || last_zero.abs() > tolerance {
            return Err(GdeError::numerical(NumericalOperation::ContinuityNullSpace));
        }

        let mut u = DMatrix::zeros(n, reduced_dim);
        for (col, &idx) in order.iter().take(reduced_dim).enumerate() {
            let mut v = eigen.eigenvectors.column(idx).into_owned();
            // Fix the sign so that the largest entry is positive
            let pivot = v.iamax();
            if v[pivot] < T::zero() {
                v.neg_mut();
            }
            u.set_column(col, &v);
        }
        debug!(
            "Continuity constraints reduce {} parameter coefficients to {}",
            n, reduced_dim
        );
        Ok(Self { u })
    }

    /// The interface jump constraints `G`, one row per interior element boundary.
    ///
    /// Row `b` evaluates the jump between the right end of element `b` and the left end of
    /// element `b + 1`, using `P_q(1) = 1` and `P_q(-1) = (-1)^q`.
    pub fn constraint_matrix(space: &LegendreSpace<T>) -> DMatrix<T> {
        let np = space.nodes_per_element();
        let num_constraints = space.num_elements().saturating_sub(1);
        let mut g = DMatrix::zeros(num_constraints, space.dim());
        for b in 0..num_constraints {
            for q in 0..np {
                g[(b, b * np + q)] = legendre_endpoint(q, true);
                g[(b, (b + 1) * np + q)] = -legendre_endpoint::<T>(q, false);
            }
        }
        g
    }

    /// `U`, of shape `N_eta × Nc`.
    pub fn u(&self) -> &DMatrix<T> {
        &self.u
    }

    pub fn full_dim(&self) -> usize {
        self.u.nrows()
    }

    pub fn reduced_dim(&self) -> usize {
        self.u.ncols()
    }

    /// `η = U η_c`.
    pub fn expand(&self, reduced: &DVector<T>) -> Result<DVector<T>, GdeError> {
        check_dimension("reduced parameters", self.reduced_dim(), reduced.len())?;
        Ok(&self.u * reduced)
    }

    /// `η_c = Uᵀ η`.
    pub fn reduce(&self, full: &DVector<T>) -> Result<DVector<T>, GdeError> {
        check_dimension("parameters", self.full_dim(), full.len())?;
        Ok(self.u.tr_mul(full))
    }

    /// `U Σ Uᵀ`.
    pub fn expand_covariance(&self, reduced: &DMatrix<T>) -> Result<DMatrix<T>, GdeError> {
        check_dimension("reduced parameter covariance", self.reduced_dim(), reduced.nrows())?;
        Ok(&self.u * reduced * self.u.transpose())
    }

    /// `Uᵀ Σ U`.
    pub fn reduce_covariance(&self, full: &DMatrix<T>) -> Result<DMatrix<T>, GdeError> {
        check_dimension("parameter covariance", self.full_dim(), full.nrows())?;
        Ok(self.u.tr_mul(full) * &self.u)
    }

    /// Orthogonal projection `U Uᵀ w` onto the continuous fields.
    pub fn project(&self, full: &DVector<T>) -> Result<DVector<T>, GdeError> {
        let reduced = self.reduce(full)?;
        self.expand(&reduced)
    }
}

/// Coefficients `A_1, …, A_p` of a VAR(p) model on the (unreduced) parameter coefficients.
#[derive(Debug, Clone)]
pub struct VarModel<T> {
    coefficients: Vec<DMatrix<T>>,
}

impl<T: Real> VarModel<T> {
    /// The random walk `η_{k+1} = η_k + w_k`.
    pub fn random_walk(dim: usize) -> Self {
        Self {
            coefficients: vec![DMatrix::identity(dim, dim)],
        }
    }

    pub fn new(coefficients: Vec<DMatrix<T>>) -> Result<Self, GdeError> {
        let dim = match coefficients.first() {
            Some(first) => first.nrows(),
            None => return Err(GdeError::configuration("a VAR model needs at least one coefficient matrix")),
        };
        for a in &coefficients {
            check_dimension("VAR coefficient rows", dim, a.nrows())?;
            check_dimension("VAR coefficient columns", dim, a.ncols())?;
        }
        Ok(Self { coefficients })
    }

    pub fn order(&self) -> usize {
        self.coefficients.len()
    }

    pub fn dim(&self) -> usize {
        self.coefficients[0].nrows()
    }

    pub fn coefficients(&self) -> &[DMatrix<T>] {
        &self.coefficients
    }

    /// Block companion matrix: `[A_1 … A_p]` on the first block row, identities on the
    /// block sub-diagonal.
    pub fn companion(&self) -> DMatrix<T> {
        let (n, p) = (self.dim(), self.order());
        let mut a = DMatrix::zeros(n * p, n * p);
        for (i, coefficient) in self.coefficients.iter().enumerate() {
            a.view_mut((0, i * n), (n, n)).copy_from(coefficient);
        }
        for i in 1..p {
            a.view_mut((i * n, (i - 1) * n), (n, n)).fill_with_identity();
        }
        a
    }

    /// `B = [A_1 + I, A_2, …, A_p]`, mapping the stacked lags at step `k` to `η_k + η_{k+1}`.
    pub fn alpha_coupling(&self) -> DMatrix<T> {
        let (n, p) = (self.dim(), self.order());
        let mut b = DMatrix::zeros(n, n * p);
        for (i, coefficient) in self.coefficients.iter().enumerate() {
            b.view_mut((0, i * n), (n, n)).copy_from(coefficient);
        }
        for i in 0..n {
            b[(i, i)] += T::one();
        }
        b
    }

    /// `C = [I 0 … 0]`, selecting lag 0 from stacked vectors of block size `block_dim`.
    pub fn selection(&self, block_dim: usize) -> DMatrix<T> {
        let mut c = DMatrix::zeros(block_dim, block_dim * self.order());
        c.view_mut((0, 0), (block_dim, block_dim)).fill_with_identity();
        c
    }
}

/// Continuity reduction combined with VAR(p) dynamics.
///
/// Applies the transforms consistently to means and covariances: lag blocks are reduced
/// and expanded with the block diagonal `U_p = diag(U, …, U)`.
#[derive(Debug, Clone)]
pub struct ParameterModel<T> {
    constraint: ContinuityConstraint<T>,
    var: VarModel<T>,
    stacked_u: DMatrix<T>,
    reduced_transition: DMatrix<T>,
    alpha_coupling: DMatrix<T>,
}

impl<T: Real> ParameterModel<T> {
    pub fn new(constraint: ContinuityConstraint<T>, var: VarModel<T>) -> Result<Self, GdeError> {
        check_dimension("VAR model dimension", constraint.full_dim(), var.dim())?;
        let (n, nc, p) = (constraint.full_dim(), constraint.reduced_dim(), var.order());
        let mut stacked_u = DMatrix::zeros(n * p, nc * p);
        for i in 0..p {
            stacked_u
                .view_mut((i * n, i * nc), (n, nc))
                .copy_from(constraint.u());
        }
        let reduced_transition = stacked_u.tr_mul(&var.companion()) * &stacked_u;
        let alpha_coupling = var.alpha_coupling() * &stacked_u;
        Ok(Self {
            constraint,
            var,
            stacked_u,
            reduced_transition,
            alpha_coupling,
        })
    }

    /// Random walk parameters on the continuous fields of `space`.
    pub fn random_walk(space: &LegendreSpace<T>) -> Result<Self, GdeError> {
        let constraint = ContinuityConstraint::new(space)?;
        let var = VarModel::random_walk(constraint.full_dim());
        Self::new(constraint, var)
    }

    pub fn constraint(&self) -> &ContinuityConstraint<T> {
        &self.constraint
    }

    pub fn var(&self) -> &VarModel<T> {
        &self.var
    }

    pub fn order(&self) -> usize {
        self.var.order()
    }

    pub fn full_dim(&self) -> usize {
        self.constraint.full_dim()
    }

    pub fn reduced_dim(&self) -> usize {
        self.constraint.reduced_dim()
    }

    /// Dimension of the stacked reduced lags `η̃_c`.
    pub fn stacked_dim(&self) -> usize {
        self.reduced_dim() * self.order()
    }

    /// `U_p = diag(U, …, U)`.
    pub fn stacked_u(&self) -> &DMatrix<T> {
        &self.stacked_u
    }

    /// Transition of the stacked reduced lags, `U_pᵀ A U_p`.
    pub fn reduced_transition(&self) -> &DMatrix<T> {
        &self.reduced_transition
    }

    /// `B U_p`, mapping the stacked reduced lags to `η_k + η_{k+1}`.
    pub fn alpha_coupling(&self) -> &DMatrix<T> {
        &self.alpha_coupling
    }

    /// `C`, selecting the current lag from the stacked reduced lags.
    pub fn selection(&self) -> DMatrix<T> {
        self.var.selection(self.reduced_dim())
    }

    /// Current unreduced parameters `U C η̃_c`.
    pub fn current(&self, stacked: &DVector<T>) -> Result<DVector<T>, GdeError> {
        check_dimension("stacked parameters", self.stacked_dim(), stacked.len())?;
        let lag0 = stacked.rows(0, self.reduced_dim()).into_owned();
        self.constraint.expand(&lag0)
    }

    /// Covariance of the current unreduced parameters, `U C P Cᵀ Uᵀ`.
    pub fn current_covariance(&self, stacked_covariance: &DMatrix<T>) -> Result<DMatrix<T>, GdeError> {
        check_dimension("stacked parameter covariance", self.stacked_dim(), stacked_covariance.nrows())?;
        let nc = self.reduced_dim();
        let lag0 = stacked_covariance.view((0, 0), (nc, nc)).into_owned();
        self.constraint.expand_covariance(&lag0)
    }

    /// Prior on the stacked reduced lags from a prior on the unreduced parameters.
    ///
    /// Every lag gets the same mean and covariance, and lags are independent.
    pub fn prior(&self, mean: &DVector<T>, covariance: &DMatrix<T>) -> Result<(DVector<T>, DMatrix<T>), GdeError> {
        check_dimension("parameter prior mean", self.full_dim(), mean.len())?;
        check_dimension("parameter prior covariance", self.full_dim(), covariance.nrows())?;
        let (n, p) = (self.full_dim(), self.order());
        let mut stacked_mean = DVector::zeros(n * p);
        let mut stacked_covariance = DMatrix::zeros(n * p, n * p);
        for i in 0..p {
            stacked_mean.rows_mut(i * n, n).copy_from(mean);
            stacked_covariance
                .view_mut((i * n, i * n), (n, n))
                .copy_from(covariance);
        }
        Ok(self.reduce_stacked(&stacked_mean, &stacked_covariance))
    }

    /// Process noise of the stacked reduced lags when only the newest lag is perturbed.
    pub fn process_noise(&self, covariance: &DMatrix<T>) -> Result<DMatrix<T>, GdeError> {
        check_dimension("parameter process noise", self.full_dim(), covariance.nrows())?;
        let n = self.full_dim();
        let mut stacked = DMatrix::zeros(n * self.order(), n * self.order());
        stacked.view_mut((0, 0), (n, n)).copy_from(covariance);
        Ok(self.stacked_u.tr_mul(&stacked) * &self.stacked_u)
    }

    fn reduce_stacked(&self, mean: &DVector<T>, covariance: &DMatrix<T>) -> (DVector<T>, DMatrix<T>) {
        (
            self.stacked_u.tr_mul(mean),
            self.stacked_u.tr_mul(covariance) * &self.stacked_u,
        )
    }
}
