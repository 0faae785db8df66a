//! Core types for density-field processing
//!
//! This module defines the fields that flow between pipeline stages and the
//! error type shared by all of them.
//!
//! ## Memory Layout
//!
//! Every field lives on a periodic N×N×N cube and is stored as a flat,
//! row-major buffer: the x index varies slowest and the z index fastest.
//!
//! ```text
//!   flat = (i * N + j) * N + k        (i → x, j → y, k → z)
//! ```
//!
//! This is the same layout the 3D FFT in [`crate::fft_utils`] expects, so a
//! field can be lifted into a complex buffer without any reordering.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// Result type for field operations
pub type FieldResult<T> = Result<T, FieldError>;

/// Errors that can occur while building, transforming or storing fields
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid power spectrum table: {0}")]
    InvalidTable(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Shape mismatch: expected {expected} cells, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Non-finite value {value} at cell {index}")]
    NonFinite { index: usize, value: f64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Flat row-major index of cell (i, j, k) on an n³ grid.
#[inline]
pub fn flat_index(n: usize, i: usize, j: usize, k: usize) -> usize {
    (i * n + j) * n + k
}

/// A real-valued scalar field on a periodic n³ grid.
///
/// Represents a density contrast δ(x), a quadratic operator such as δ², or a
/// log-normal density ρ(x). Stages never mutate a field they were handed;
/// they return a fresh one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    n: usize,
    data: Vec<f64>,
}

impl ScalarField {
    /// Create a field filled with zeros.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n * n],
        }
    }

    /// Create a field with every cell set to `value`.
    pub fn constant(n: usize, value: f64) -> Self {
        Self {
            n,
            data: vec![value; n * n * n],
        }
    }

    /// Wrap an existing row-major buffer of length n³.
    pub fn from_vec(n: usize, data: Vec<f64>) -> FieldResult<Self> {
        let expected = n * n * n;
        if data.len() != expected {
            return Err(FieldError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { n, data })
    }

    /// Wrap a buffer whose length is already known to be n³.
    pub(crate) fn from_vec_unchecked(n: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), n * n * n);
        Self { n, data }
    }

    /// Build a field by evaluating `f(i, j, k)` at every cell.
    pub fn from_fn<F>(n: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> f64,
    {
        let mut data = Vec::with_capacity(n * n * n);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    data.push(f(i, j, k));
                }
            }
        }
        Self { n, data }
    }

    /// Cells per axis
    pub fn n(&self) -> usize {
        self.n
    }

    /// Total number of cells (n³)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at cell (i, j, k)
    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[flat_index(self.n, i, j, k)]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Arithmetic mean over all cells
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Population variance (ddof = 0) over all cells
    pub fn variance(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.data.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / self.data.len() as f64
    }

    /// Apply `f` to every cell, returning a new field.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            n: self.n,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// True when every cell holds the same value.
    pub fn is_uniform(&self) -> bool {
        match self.data.first() {
            Some(&first) => self.data.iter().all(|&v| v == first),
            None => true,
        }
    }

    /// Reject NaN or infinite cells.
    pub fn check_finite(&self) -> FieldResult<()> {
        match self.data.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(FieldError::NonFinite {
                index,
                value: self.data[index],
            }),
            None => Ok(()),
        }
    }

    /// Summary statistics for logging
    pub fn stats(&self) -> FieldStats {
        FieldStats::compute(self)
    }
}

/// A three-component vector field on the same grid as a [`ScalarField`].
///
/// Components are expressed in units of grid cells, so a displacement of
/// `n` along any axis is a full period.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
    n: usize,
    components: [Vec<f64>; 3],
}

impl DisplacementField {
    /// Zero displacement everywhere.
    pub fn zeros(n: usize) -> Self {
        let cells = n * n * n;
        Self {
            n,
            components: [vec![0.0; cells], vec![0.0; cells], vec![0.0; cells]],
        }
    }

    /// The same displacement vector at every cell.
    pub fn uniform(n: usize, shift: [f64; 3]) -> Self {
        let cells = n * n * n;
        Self {
            n,
            components: [
                vec![shift[0]; cells],
                vec![shift[1]; cells],
                vec![shift[2]; cells],
            ],
        }
    }

    /// Assemble from three row-major component buffers of length n³.
    pub fn from_components(n: usize, components: [Vec<f64>; 3]) -> FieldResult<Self> {
        let expected = n * n * n;
        for c in &components {
            if c.len() != expected {
                return Err(FieldError::ShapeMismatch {
                    expected,
                    actual: c.len(),
                });
            }
        }
        Ok(Self { n, components })
    }

    pub(crate) fn from_components_unchecked(n: usize, components: [Vec<f64>; 3]) -> Self {
        debug_assert!(components.iter().all(|c| c.len() == n * n * n));
        Self { n, components }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Component along `axis` (0 = x, 1 = y, 2 = z)
    pub fn component(&self, axis: usize) -> &[f64] {
        &self.components[axis]
    }

    /// Displacement vector at a flat cell index
    #[inline]
    pub fn at(&self, flat: usize) -> [f64; 3] {
        [
            self.components[0][flat],
            self.components[1][flat],
            self.components[2][flat],
        ]
    }

    /// RMS displacement magnitude, in cells
    pub fn rms(&self) -> f64 {
        let cells = self.n * self.n * self.n;
        if cells == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .components
            .iter()
            .flat_map(|c| c.iter())
            .map(|v| v * v)
            .sum();
        (sum / cells as f64).sqrt()
    }
}

/// Field statistics for analysis and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldStats {
    pub num_cells: usize,
    pub mean: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl FieldStats {
    pub fn compute(field: &ScalarField) -> Self {
        if field.is_empty() {
            return Self {
                num_cells: 0,
                mean: 0.0,
                variance: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let (min, max) = field
            .data()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Self {
            num_cells: field.len(),
            mean: field.mean(),
            variance: field.variance(),
            min,
            max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_index_row_major() {
        assert_eq!(flat_index(4, 0, 0, 1), 1);
        assert_eq!(flat_index(4, 0, 1, 0), 4);
        assert_eq!(flat_index(4, 1, 0, 0), 16);
        assert_eq!(flat_index(4, 3, 3, 3), 63);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let err = ScalarField::from_vec(4, vec![0.0; 10]).unwrap_err();
        assert!(matches!(
            err,
            FieldError::ShapeMismatch {
                expected: 64,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_mean_and_variance() {
        let field = ScalarField::from_fn(2, |i, _, _| if i == 0 { 1.0 } else { -1.0 });
        assert_relative_eq!(field.mean(), 0.0, epsilon = 1e-15);
        assert_relative_eq!(field.variance(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_check_finite_reports_index() {
        let mut field = ScalarField::zeros(2);
        field.data_mut()[5] = f64::NAN;
        match field.check_finite() {
            Err(FieldError::NonFinite { index, .. }) => assert_eq!(index, 5),
            other => panic!("expected NonFinite, got {:?}", other),
        }
    }

    #[test]
    fn test_uniform_detection() {
        assert!(ScalarField::constant(3, 0.25).is_uniform());
        assert!(!ScalarField::from_fn(3, |i, j, k| (i + j + k) as f64).is_uniform());
    }

    #[test]
    fn test_displacement_rms() {
        let psi = DisplacementField::uniform(2, [3.0, 0.0, 4.0]);
        assert_relative_eq!(psi.rms(), 5.0, epsilon = 1e-12);
        assert_eq!(psi.at(7), [3.0, 0.0, 4.0]);
    }

    #[test]
    fn test_field_stats() {
        let field = ScalarField::from_fn(2, |i, j, k| (i * 4 + j * 2 + k) as f64);
        let stats = field.stats();
        assert_eq!(stats.num_cells, 8);
        assert_relative_eq!(stats.mean, 3.5, epsilon = 1e-12);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 7.0);
    }
}
