//! Discontinuous element-wise Legendre polynomial spaces.
//!
//! On element `e = [a, b]` with `h = b - a`, basis function `p` is `P_p(ξ)` with
//! `ξ = 2 (x - a) / h - 1`. The global index of the pair `(e, p)` is `e * Np + p`.
use crate::error::{check_dimension, GdeError};
use crate::mesh::Mesh1d;
use crate::Real;
use gde_traits::from_usize;
use nalgebra::DVector;
use numeric_literals::replace_float_literals;

/// Fills `values[n] = P_n(ξ)` and `derivatives[n] = P_n'(ξ)` for `n < values.len()`.
///
/// Valid on the whole closed reference interval, including `ξ = ±1`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn populate_legendre<T: Real>(values: &mut [T], derivatives: &mut [T], xi: T) {
    assert_eq!(values.len(), derivatives.len());
    let n = values.len();
    if n == 0 {
        return;
    }
    values[0] = 1.0;
    derivatives[0] = 0.0;
    if n > 1 {
        values[1] = xi;
        derivatives[1] = 1.0;
    }
    for m in 2..n {
        let m_t = from_usize::<T>(m);
        values[m] = ((2.0 * m_t - 1.0) * xi * values[m - 1] - (m_t - 1.0) * values[m - 2]) / m_t;
        derivatives[m] = m_t * values[m - 1] + xi * derivatives[m - 1];
    }
}

/// Value of `P_n` at the reference endpoint `ξ = 1` (`right = true`) or `ξ = -1`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn legendre_endpoint<T: Real>(n: usize, right: bool) -> T {
    if right || n % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// A mesh with `Np` Legendre polynomials on every element.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendreSpace<T> {
    mesh: Mesh1d<T>,
    nodes_per_element: usize,
}

impl<T: Real> LegendreSpace<T> {
    pub fn new(mesh: Mesh1d<T>, nodes_per_element: usize) -> Self {
        assert!(nodes_per_element > 0, "at least one basis function per element");
        Self {
            mesh,
            nodes_per_element,
        }
    }

    pub fn mesh(&self) -> &Mesh1d<T> {
        &self.mesh
    }

    pub fn nodes_per_element(&self) -> usize {
        self.nodes_per_element
    }

    pub fn num_elements(&self) -> usize {
        self.mesh.num_elements()
    }

    /// Total number of basis functions `N = Ne * Np`.
    pub fn dim(&self) -> usize {
        self.num_elements() * self.nodes_per_element
    }

    /// Global index of basis function `p` on `element`.
    pub fn global_index(&self, element: usize, p: usize) -> usize {
        element * self.nodes_per_element + p
    }

    /// Range of global indices owned by `element`.
    pub fn element_dofs(&self, element: usize) -> std::ops::Range<usize> {
        let start = element * self.nodes_per_element;
        start..start + self.nodes_per_element
    }

    /// Diagonal of the mass matrix, `h_e / (2 p + 1)`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn mass_diagonal(&self) -> DVector<T> {
        let np = self.nodes_per_element;
        DVector::from_fn(self.dim(), |i, _| {
            let (e, p) = (i / np, i % np);
            let p = from_usize::<T>(p);
            self.mesh.element_length(e) / (2.0 * p + 1.0)
        })
    }

    /// Values and physical derivatives of the local basis functions of `element` at `x`.
    ///
    /// The derivatives are with respect to `x`, i.e. `P_p'(ξ) 2 / h`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn populate_element_basis(&self, element: usize, x: T, values: &mut [T], derivatives: &mut [T]) {
        let xi = self.mesh.map_to_reference(element, x);
        populate_legendre(values, derivatives, xi);
        let jacobian = 2.0 / self.mesh.element_length(element);
        for d in derivatives.iter_mut() {
            *d *= jacobian;
        }
    }

    /// Values of the local basis functions of `element` at `x`.
    pub fn element_basis_values(&self, element: usize, x: T) -> Vec<T> {
        let np = self.nodes_per_element;
        let mut values = vec![T::zero(); np];
        let mut derivatives = vec![T::zero(); np];
        self.populate_element_basis(element, x, &mut values, &mut derivatives);
        values
    }

    /// Evaluates the function with the given coefficients at `x`. Zero outside the domain.
    pub fn evaluate(&self, coefficients: &DVector<T>, x: T) -> Result<T, GdeError> {
        check_dimension("coefficient vector", self.dim(), coefficients.len())?;
        let value = match self.mesh.find_element(x) {
            Some(element) => self
                .element_basis_values(element, x)
                .into_iter()
                .zip(self.element_dofs(element))
                .fold(T::zero(), |acc, (phi, i)| acc + phi * coefficients[i]),
            None => T::zero(),
        };
        Ok(value)
    }

    /// Value of global basis function `index` at `x`.
    pub fn evaluate_basis_function(&self, index: usize, x: T) -> T {
        let element = index / self.nodes_per_element;
        let p = index % self.nodes_per_element;
        match self.mesh.find_element(x) {
            Some(e) if e == element => self.element_basis_values(element, x)[p],
            _ => T::zero(),
        }
    }

    /// Row vector of all global basis functions evaluated at `x`.
    pub fn basis_row(&self, x: T) -> DVector<T> {
        let mut row = DVector::zeros(self.dim());
        if let Some(element) = self.mesh.find_element(x) {
            let values = self.element_basis_values(element, x);
            row.rows_mut(element * self.nodes_per_element, self.nodes_per_element)
                .copy_from_slice(&values);
        }
        row
    }
}
