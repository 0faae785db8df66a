//! Spectral Grid — wavevectors of a periodic cube
//!
//! For an N×N×N periodic box of side L the allowed wavevectors are integer
//! multiples of the fundamental mode kf = 2π/L. Along each axis they follow
//! the standard DFT frequency ordering:
//!
//! ```text
//!   index:  0   1   2  ...  ⌈N/2⌉-1   ⌈N/2⌉ ... N-1
//!   k/kf:   0   1   2  ...  ⌈N/2⌉-1  -⌊N/2⌋ ...  -1
//! ```
//!
//! The 3D magnitude |k| at cell (i, j, l) is the outer combination of the
//! three axis sequences. It is computed on demand and never cached.
//!
//! ## Example
//!
//! ```rust
//! use cosmofield_core::spectral_grid::SpectralGrid;
//!
//! let grid = SpectralGrid::new(8, 100.0).unwrap();
//! assert_eq!(grid.k_mag()[0], 0.0);
//! assert_eq!(grid.wavenumbers()[5], -3.0 * grid.fundamental());
//! ```

use std::f64::consts::PI;

use crate::types::{flat_index, FieldError, FieldResult};

/// Wavevector bookkeeping for an n³ periodic cube of side `box_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralGrid {
    n: usize,
    box_size: f64,
    kf: f64,
    /// Signed wavenumbers in FFT order
    k1d: Vec<f64>,
}

impl SpectralGrid {
    /// Build the grid for `n` cells per axis and box side `box_size`.
    pub fn new(n: usize, box_size: f64) -> FieldResult<Self> {
        if n == 0 {
            return Err(FieldError::InvalidGrid("grid size must be > 0".to_string()));
        }
        if !(box_size.is_finite() && box_size > 0.0) {
            return Err(FieldError::InvalidGrid(format!(
                "box size must be positive and finite, got {}",
                box_size
            )));
        }

        let kf = 2.0 * PI / box_size;
        let k1d = (0..n).map(|i| fft_freq(i, n) as f64 * kf).collect();

        Ok(Self {
            n,
            box_size,
            kf,
            k1d,
        })
    }

    /// Cells per axis
    pub fn n(&self) -> usize {
        self.n
    }

    /// Box side length
    pub fn box_size(&self) -> f64 {
        self.box_size
    }

    /// Fundamental mode kf = 2π/L
    pub fn fundamental(&self) -> f64 {
        self.kf
    }

    /// Nyquist frequency πN/L
    pub fn nyquist(&self) -> f64 {
        PI * self.n as f64 / self.box_size
    }

    /// Box volume L³
    pub fn volume(&self) -> f64 {
        self.box_size.powi(3)
    }

    /// Cell side L/N
    pub fn cell_size(&self) -> f64 {
        self.box_size / self.n as f64
    }

    /// Cell volume (L/N)³
    pub fn cell_volume(&self) -> f64 {
        self.cell_size().powi(3)
    }

    /// Total number of cells
    pub fn num_cells(&self) -> usize {
        self.n * self.n * self.n
    }

    /// Per-axis signed wavenumbers in FFT order
    pub fn wavenumbers(&self) -> &[f64] {
        &self.k1d
    }

    /// Wavevector (kx, ky, kz) at cell (i, j, l)
    #[inline]
    pub fn wavevector(&self, i: usize, j: usize, l: usize) -> [f64; 3] {
        [self.k1d[i], self.k1d[j], self.k1d[l]]
    }

    /// Squared magnitude |k|² at cell (i, j, l)
    #[inline]
    pub fn k_squared(&self, i: usize, j: usize, l: usize) -> f64 {
        let [kx, ky, kz] = self.wavevector(i, j, l);
        kx * kx + ky * ky + kz * kz
    }

    /// Full row-major |k| array. Entry 0 is exactly zero.
    pub fn k_mag(&self) -> Vec<f64> {
        let n = self.n;
        let mut out = Vec::with_capacity(self.num_cells());
        for i in 0..n {
            for j in 0..n {
                for l in 0..n {
                    out.push(self.k_squared(i, j, l).sqrt());
                }
            }
        }
        out
    }

    /// Index of -i modulo n (the conjugate partner along one axis)
    #[inline]
    pub fn mirror(&self, i: usize) -> usize {
        (self.n - i) % self.n
    }

    /// Flat index of the cell holding -k for the cell at (i, j, l)
    #[inline]
    pub fn mirror_flat(&self, i: usize, j: usize, l: usize) -> usize {
        flat_index(self.n, self.mirror(i), self.mirror(j), self.mirror(l))
    }
}

/// Signed integer frequency of DFT index `i` for length `n`.
#[inline]
fn fft_freq(i: usize, n: usize) -> i64 {
    if i < (n + 1) / 2 {
        i as i64
    } else {
        i as i64 - n as i64
    }
}
