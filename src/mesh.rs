//! One-dimensional element partitions.
use crate::error::GdeError;
use crate::Real;
use gde_traits::from_usize;
use numeric_literals::replace_float_literals;

/// An ordered partition of `[x_min, x_max]` into contiguous elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh1d<T> {
    boundaries: Vec<T>,
}

impl<T: Real> Mesh1d<T> {
    /// A mesh of `num_elements` equally sized elements.
    pub fn uniform(x_min: T, x_max: T, num_elements: usize) -> Result<Self, GdeError> {
        if num_elements == 0 {
            return Err(GdeError::configuration("a mesh needs at least one element"));
        }
        let n = from_usize::<T>(num_elements);
        let h = (x_max - x_min) / n;
        let boundaries = (0..=num_elements)
            .map(|i| {
                if i == num_elements {
                    x_max
                } else {
                    x_min + h * from_usize::<T>(i)
                }
            })
            .collect();
        Self::from_boundaries(boundaries)
    }

    /// A mesh with the given element boundaries, which must be finite and strictly increasing.
    pub fn from_boundaries(boundaries: Vec<T>) -> Result<Self, GdeError> {
        if boundaries.len() < 2 {
            return Err(GdeError::configuration("a mesh needs at least two element boundaries"));
        }
        if boundaries.iter().any(|x| !x.is_finite()) {
            return Err(GdeError::configuration("element boundaries must be finite"));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GdeError::configuration("element boundaries must be strictly increasing"));
        }
        Ok(Self { boundaries })
    }

    pub fn num_elements(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn boundaries(&self) -> &[T] {
        &self.boundaries
    }

    pub fn x_min(&self) -> T {
        self.boundaries[0]
    }

    pub fn x_max(&self) -> T {
        self.boundaries[self.boundaries.len() - 1]
    }

    pub fn element_interval(&self, element: usize) -> (T, T) {
        (self.boundaries[element], self.boundaries[element + 1])
    }

    pub fn element_length(&self, element: usize) -> T {
        self.boundaries[element + 1] - self.boundaries[element]
    }

    /// Index of the element containing `x`, or `None` outside the domain.
    ///
    /// Elements are half-open `[a, b)` except the last one, which also contains `x_max`.
    pub fn find_element(&self, x: T) -> Option<usize> {
        if x < self.x_min() || x > self.x_max() {
            return None;
        }
        let upper = self.boundaries.partition_point(|&b| b <= x);
        Some(upper.saturating_sub(1).min(self.num_elements() - 1))
    }

    /// Maps `x` in the given element onto the reference interval `[-1, 1]`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn map_to_reference(&self, element: usize, x: T) -> T {
        let (a, b) = self.element_interval(element);
        2.0 * (x - a) / (b - a) - 1.0
    }

    /// Maps a reference coordinate `xi` in `[-1, 1]` into the given element.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn map_from_reference(&self, element: usize, xi: T) -> T {
        let (a, b) = self.element_interval(element);
        a + 0.5 * (xi + 1.0) * (b - a)
    }
}
