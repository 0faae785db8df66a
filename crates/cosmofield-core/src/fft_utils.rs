//! 3D FFT Utilities for Periodic Density Fields
//!
//! This module provides the cubic N×N×N discrete Fourier transform used by
//! every Fourier-space stage of the pipeline.
//!
//! ## Separable Transform
//!
//! A 3D DFT is three passes of 1D DFTs, one per axis. The z axis is
//! contiguous in memory, so its lines are transformed in place. The x and y
//! axes are strided: their lines are gathered into a contiguous scratch
//! cube, transformed, and scattered back.
//!
//! ```text
//!   pass z:  [.... n ....][.... n ....] ...       (in place)
//!   pass y:  gather stride n   → transform → scatter
//!   pass x:  gather stride n²  → transform → scatter
//! ```
//!
//! ## Normalization
//!
//! The forward transform is unnormalized and the inverse divides by n³, so
//! `inverse(forward(x)) == x`. Physical units (the L³/N³ cell volume) are
//! applied by the callers; see [`crate::estimator`] for the convention.

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::types::{FieldError, FieldResult, ScalarField};

/// FFT processor for n³ periodic cubes
pub struct Fft3Processor {
    /// Cells per axis
    n: usize,
    /// Forward 1D FFT of length n
    fft_forward: Arc<dyn Fft<f64>>,
    /// Inverse 1D FFT of length n
    fft_inverse: Arc<dyn Fft<f64>>,
    /// Scratch buffer for in-place line transforms
    scratch: Vec<Complex64>,
    /// Gather buffer for strided axes
    lines: Vec<Complex64>,
}

impl fmt::Debug for Fft3Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft3Processor").field("n", &self.n).finish()
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Inverse,
}

impl Fft3Processor {
    /// Create a new processor for an n×n×n cube
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(n);
        let fft_inverse = planner.plan_fft_inverse(n);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());

        Self {
            n,
            fft_forward,
            fft_inverse,
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
            lines: vec![Complex64::new(0.0, 0.0); n * n * n],
        }
    }

    /// Cells per axis
    pub fn n(&self) -> usize {
        self.n
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.n * self.n * self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Unnormalized forward transform, in place
    pub fn forward_inplace(&mut self, buffer: &mut [Complex64]) {
        assert_eq!(buffer.len(), self.len());
        for axis in [2, 1, 0] {
            self.transform_axis(buffer, axis, Direction::Forward);
        }
    }

    /// Inverse transform normalized by 1/n³, in place
    pub fn inverse_inplace(&mut self, buffer: &mut [Complex64]) {
        assert_eq!(buffer.len(), self.len());
        for axis in [2, 1, 0] {
            self.transform_axis(buffer, axis, Direction::Inverse);
        }

        let scale = 1.0 / self.len() as f64;
        for c in buffer.iter_mut() {
            *c *= scale;
        }
    }

    /// Forward transform of a real field, returning its Fourier coefficients
    pub fn forward_real(&mut self, field: &ScalarField) -> FieldResult<Vec<Complex64>> {
        if field.n() != self.n {
            return Err(FieldError::ShapeMismatch {
                expected: self.len(),
                actual: field.len(),
            });
        }
        let mut buffer: Vec<Complex64> = field
            .data()
            .iter()
            .map(|&v| Complex64::new(v, 0.0))
            .collect();
        self.forward_inplace(&mut buffer);
        Ok(buffer)
    }

    /// Inverse transform keeping only the real part
    pub fn inverse_real(&mut self, mut spectrum: Vec<Complex64>) -> ScalarField {
        self.inverse_inplace(&mut spectrum);
        let data = spectrum.into_iter().map(|c| c.re).collect();
        ScalarField::from_vec_unchecked(self.n, data)
    }

    fn transform_axis(&mut self, buffer: &mut [Complex64], axis: usize, direction: Direction) {
        let n = self.n;
        let fft = match direction {
            Direction::Forward => Arc::clone(&self.fft_forward),
            Direction::Inverse => Arc::clone(&self.fft_inverse),
        };

        if axis == 2 {
            run_lines(fft.as_ref(), buffer, n, &mut self.scratch);
            return;
        }

        let stride = if axis == 1 { n } else { n * n };
        let mut lines = std::mem::take(&mut self.lines);
        for l in 0..n * n {
            let base = line_base(n, axis, l);
            for t in 0..n {
                lines[l * n + t] = buffer[base + t * stride];
            }
        }

        run_lines(fft.as_ref(), &mut lines, n, &mut self.scratch);

        for l in 0..n * n {
            let base = line_base(n, axis, l);
            for t in 0..n {
                buffer[base + t * stride] = lines[l * n + t];
            }
        }
        self.lines = lines;
    }
}

/// Offset of the first element of line `l` running along `axis`.
#[inline]
fn line_base(n: usize, axis: usize, l: usize) -> usize {
    match axis {
        // lines along y: l enumerates (i, k)
        1 => (l / n) * n * n + (l % n),
        // lines along x: l enumerates (j, k)
        _ => l,
    }
}

#[cfg(not(feature = "parallel"))]
fn run_lines(fft: &dyn Fft<f64>, lines: &mut [Complex64], _n: usize, scratch: &mut [Complex64]) {
    fft.process_with_scratch(lines, scratch);
}

#[cfg(feature = "parallel")]
fn run_lines(fft: &dyn Fft<f64>, lines: &mut [Complex64], n: usize, _scratch: &mut [Complex64]) {
    lines.par_chunks_mut(n).for_each(|line| fft.process(line));
}

/// Fourier-space power |c|² of each coefficient
pub fn power_spectrum(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum.iter().map(|c| c.norm_sqr()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::flat_index;
    use std::f64::consts::PI;

    #[test]
    fn test_fft3_inverse_identity() {
        let n = 8;
        let field = ScalarField::from_fn(n, |i, j, k| (i as f64) - 2.0 * (j as f64) + 0.5 * (k * k) as f64);

        let mut processor = Fft3Processor::new(n);
        let spectrum = processor.forward_real(&field).unwrap();
        let recovered = processor.inverse_real(spectrum);

        for (a, b) in field.data().iter().zip(recovered.data()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_fft3_dc_is_sum() {
        let n = 4;
        let field = ScalarField::constant(n, 1.5);
        let mut processor = Fft3Processor::new(n);
        let spectrum = processor.forward_real(&field).unwrap();

        assert!((spectrum[0].re - 1.5 * 64.0).abs() < 1e-10);
        for c in &spectrum[1..] {
            assert!(c.norm() < 1e-10);
        }
    }

    #[test]
    fn test_fft3_single_mode_per_axis() {
        // cos(2π m y / n) lands on (0, ±m, 0)
        let n = 16;
        let m = 3;
        let field = ScalarField::from_fn(n, |_, j, _| (2.0 * PI * (m * j) as f64 / n as f64).cos());

        let mut processor = Fft3Processor::new(n);
        let spectrum = processor.forward_real(&field).unwrap();
        let expected = (n * n * n) as f64 / 2.0;

        let peak_pos = flat_index(n, 0, m, 0);
        let peak_neg = flat_index(n, 0, n - m, 0);
        assert!((spectrum[peak_pos].re - expected).abs() < 1e-8);
        assert!((spectrum[peak_neg].re - expected).abs() < 1e-8);

        let residual: f64 = spectrum
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != peak_pos && *idx != peak_neg)
            .map(|(_, c)| c.norm())
            .fold(0.0, f64::max);
        assert!(residual < 1e-8);
    }

    #[test]
    fn test_fft3_rejects_wrong_size() {
        let mut processor = Fft3Processor::new(4);
        assert!(processor.forward_real(&ScalarField::zeros(5)).is_err());
    }
}
