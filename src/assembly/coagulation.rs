//! Coagulation: the bilinear gain and loss terms, stored as a dense third-order tensor.
use crate::basis::{populate_legendre, LegendreSpace};
use crate::config::{GdeConfig, ScaleType};
use crate::error::{check_dimension, GdeError};
use crate::quadrature::reference_square_gauss;
use crate::rate::CoagulationKernel;
use crate::Real;
use eyre::Context;
use itertools::izip;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

/// Identifies the discretisation a coagulation tensor was assembled for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretisationSignature<T> {
    pub num_elements: usize,
    pub nodes_per_element: usize,
    pub x_min: T,
    pub x_max: T,
    pub scale: ScaleType,
    pub boundary_zero: bool,
    pub kernel: String,
}

impl<T: Real> DiscretisationSignature<T> {
    pub fn new(config: &GdeConfig<T>, kernel: impl Into<String>) -> Self {
        Self {
            num_elements: config.num_elements,
            nodes_per_element: config.nodes_per_element,
            x_min: config.x_min,
            x_max: config.x_max,
            scale: config.scale,
            boundary_zero: config.boundary_zero,
            kernel: kernel.into(),
        }
    }

    /// Whether two signatures describe the same discretisation, up to round-off in the
    /// domain bounds.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn matches(&self, other: &Self) -> bool {
        let close = |a: T, b: T| (a - b).abs() <= 1e-10 * (1.0 + a.abs().max(b.abs()));
        self.num_elements == other.num_elements
            && self.nodes_per_element == other.nodes_per_element
            && self.scale == other.scale
            && self.boundary_zero == other.boundary_zero
            && self.kernel == other.kernel
            && close(self.x_min, other.x_min)
            && close(self.x_max, other.x_max)
    }
}

/// The coagulation tensor `T`, with `dα_i/dt = αᵀ T_i α` for the coagulation part.
///
/// Slice `i` holds, before scaling by the mass matrix,
/// `½ ∬ K(y, z) φ_i(c(y, z)) φ_j(y) φ_k(z) dy dz - ∬ φ_i(x) φ_j(x) K(x, y) φ_k(y) dx dy`,
/// where `c(y, z)` is the coordinate of the merged particle. Pairs that merge beyond `x_max`
/// leave the domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Real + Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct CoagulationTensor<T> {
    signature: DiscretisationSignature<T>,
    slices: Vec<DMatrix<T>>,
}

impl<T: Real> CoagulationTensor<T> {
    /// Assembles the tensor, in parallel over the elements of the test function.
    pub fn assemble(
        space: &LegendreSpace<T>,
        config: &GdeConfig<T>,
        kernel: &dyn CoagulationKernel<T>,
    ) -> Self {
        let timer = Instant::now();
        let np = space.nodes_per_element();
        let ne = space.num_elements();
        let n = space.dim();
        let signature = DiscretisationSignature::new(config, kernel.name());

        let gain_rule = reference_square_gauss::<T>(config.coagulation_quadrature_points, config.coagulation_subdivisions);
        let loss_rule = reference_square_gauss::<T>(config.coagulation_quadrature_points, 1);

        let element_slices: Vec<Vec<DMatrix<T>>> = (0..ne)
            .into_par_iter()
            .map(|e| {
                let mut slices = vec![DMatrix::zeros(n, n); np];
                add_gain(&mut slices, e, space, config.scale, kernel, &gain_rule);
                add_loss(&mut slices, e, space, kernel, &loss_rule);
                slices
            })
            .collect();

        let mass = space.mass_diagonal();
        let mut slices: Vec<DMatrix<T>> = element_slices.into_iter().flatten().collect();
        for (slice, &m) in slices.iter_mut().zip(mass.iter()) {
            *slice /= m;
        }
        if config.boundary_zero {
            slices[0].fill(T::zero());
        }

        info!(
            "Assembled {}x{}x{} coagulation tensor for kernel {} in {:.2?}",
            n,
            n,
            n,
            signature.kernel,
            timer.elapsed()
        );
        Self { signature, slices }
    }

    pub fn signature(&self) -> &DiscretisationSignature<T> {
        &self.signature
    }

    pub fn dim(&self) -> usize {
        self.slices.len()
    }

    /// Slice `T_i`.
    pub fn slice(&self, i: usize) -> &DMatrix<T> {
        &self.slices[i]
    }

    /// Checks that the tensor was assembled for the expected discretisation.
    pub fn validate(&self, expected: &DiscretisationSignature<T>) -> Result<(), GdeError> {
        let n = expected.num_elements * expected.nodes_per_element;
        let consistent_shape = self.slices.len() == n && self.slices.iter().all(|s| s.shape() == (n, n));
        if !self.signature.matches(expected) || !consistent_shape {
            return Err(GdeError::TensorMismatch {
                expected: format!("{:?}", expected),
                found: format!("{:?} with {} slices", self.signature, self.slices.len()),
            });
        }
        Ok(())
    }

    /// Evaluates `Q_i = αᵀ T_i α` for every `i`.
    pub fn contract(&self, alpha: &DVector<T>) -> Result<DVector<T>, GdeError> {
        check_dimension("coagulation contraction", self.dim(), alpha.len())?;
        let values: Vec<T> = self
            .slices
            .par_iter()
            .map(|slice| alpha.dot(&(slice * alpha)))
            .collect();
        Ok(DVector::from_vec(values))
    }

    /// Jacobian of [`contract`](Self::contract), with row `i` equal to `((T_i + T_iᵀ) α)ᵀ`.
    pub fn jacobian(&self, alpha: &DVector<T>) -> Result<DMatrix<T>, GdeError> {
        check_dimension("coagulation Jacobian", self.dim(), alpha.len())?;
        let rows: Vec<DVector<T>> = self
            .slices
            .par_iter()
            .map(|slice| slice * alpha + slice.tr_mul(alpha))
            .collect();
        let n = self.dim();
        let mut jacobian = DMatrix::zeros(n, n);
        for (i, row) in rows.iter().enumerate() {
            jacobian.row_mut(i).tr_copy_from(row);
        }
        Ok(jacobian)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> eyre::Result<()>
    where
        T: Serialize,
    {
        let path = path.as_ref();
        let file = File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self).wrap_err("failed to serialize coagulation tensor")?;
        debug!("Saved coagulation tensor to {}", path.display());
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> eyre::Result<Self>
    where
        T: DeserializeOwned,
    {
        let path = path.as_ref();
        let file = File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
        let tensor = serde_json::from_reader(BufReader::new(file))
            .wrap_err_with(|| format!("failed to parse coagulation tensor in {}", path.display()))?;
        debug!("Loaded coagulation tensor from {}", path.display());
        Ok(tensor)
    }
}

/// Adds the gain contributions whose merged particle lands in element `e`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn add_gain<T: Real>(
    slices: &mut [DMatrix<T>],
    e: usize,
    space: &LegendreSpace<T>,
    scale: ScaleType,
    kernel: &dyn CoagulationKernel<T>,
    (weights, points): &(Vec<T>, Vec<[T; 2]>),
) {
    let np = space.nodes_per_element();
    let ne = space.num_elements();
    let mesh = space.mesh();
    let (a_e, b_e) = mesh.element_interval(e);

    let mut phi_i = vec![T::zero(); np];
    let mut phi_j = vec![T::zero(); np];
    let mut phi_k = vec![T::zero(); np];
    let mut scratch = vec![T::zero(); np];

    for ej in 0..ne {
        for ek in 0..ne {
            let (aj, bj) = mesh.element_interval(ej);
            let (ak, bk) = mesh.element_interval(ek);
            // The merged coordinate is increasing in both arguments
            if scale.combine(bj, bk) <= a_e || scale.combine(aj, ak) >= b_e {
                continue;
            }
            let jacobian = 0.25 * (bj - aj) * (bk - ak);
            for (&w, &[xi, eta]) in izip!(weights, points) {
                let y = mesh.map_from_reference(ej, xi);
                let z = mesh.map_from_reference(ek, eta);
                let c = scale.combine(y, z);
                if mesh.find_element(c) != Some(e) {
                    continue;
                }
                populate_legendre(&mut phi_i, &mut scratch, mesh.map_to_reference(e, c));
                populate_legendre(&mut phi_j, &mut scratch, xi);
                populate_legendre(&mut phi_k, &mut scratch, eta);
                let factor = 0.5 * w * jacobian * kernel.kernel(y, z);
                for p in 0..np {
                    let slice = &mut slices[p];
                    for q in 0..np {
                        for r in 0..np {
                            slice[(ej * np + q, ek * np + r)] += factor * phi_i[p] * phi_j[q] * phi_k[r];
                        }
                    }
                }
            }
        }
    }
}

/// Adds the loss contributions for test functions on element `e`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
fn add_loss<T: Real>(
    slices: &mut [DMatrix<T>],
    e: usize,
    space: &LegendreSpace<T>,
    kernel: &dyn CoagulationKernel<T>,
    (weights, points): &(Vec<T>, Vec<[T; 2]>),
) {
    let np = space.nodes_per_element();
    let mesh = space.mesh();
    let mut phi_x = vec![T::zero(); np];
    let mut phi_y = vec![T::zero(); np];
    let mut scratch = vec![T::zero(); np];

    for f in 0..space.num_elements() {
        let jacobian = 0.25 * mesh.element_length(e) * mesh.element_length(f);
        for (&w, &[xi, eta]) in izip!(weights, points) {
            let x = mesh.map_from_reference(e, xi);
            let y = mesh.map_from_reference(f, eta);
            populate_legendre(&mut phi_x, &mut scratch, xi);
            populate_legendre(&mut phi_y, &mut scratch, eta);
            let factor = w * jacobian * kernel.kernel(x, y);
            for p in 0..np {
                let slice = &mut slices[p];
                for q in 0..np {
                    for r in 0..np {
                        slice[(e * np + q, f * np + r)] -= factor * phi_x[p] * phi_x[q] * phi_y[r];
                    }
                }
            }
        }
    }
}
