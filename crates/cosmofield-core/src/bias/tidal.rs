//! Tidal tensor and the G2 operator
//!
//! The tidal tensor is built from the potential φ of the linear field,
//! ∇²φ = δ:
//!
//! ```text
//!   φ(k)    = −δ(k)/k²
//!   T_ij(k) = −(i k_i)(i k_j) φ(k) = −k_i k_j δ(k)/k²
//!   G2(q)   = Σ_ij T_ij(q)² − (∇²φ(q))²,   ∇²φ = −tr T
//! ```
//!
//! T is symmetric, so only six components are ever computed. They are
//! addressed by small integer indices through [`component_index`] rather
//! than stored as a full 3×3 matrix.

use crate::fft_utils::Fft3Processor;
use crate::spectral_grid::SpectralGrid;
use crate::types::{Complex, ScalarField};

/// The six independent (i, j) pairs, diagonal first.
pub const TENSOR_PAIRS: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (0, 2), (1, 2)];

/// Storage slot of component (i, j) of a symmetric 3×3 tensor.
#[inline]
pub fn component_index(i: usize, j: usize) -> usize {
    let (a, b) = if i <= j { (i, j) } else { (j, i) };
    match (a, b) {
        (0, 0) => 0,
        (1, 1) => 1,
        (2, 2) => 2,
        (0, 1) => 3,
        (0, 2) => 4,
        (1, 2) => 5,
        _ => panic!("tensor index ({}, {}) out of range", i, j),
    }
}

/// Symmetric 3×3 tensor held as its six independent components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SymmetricTensor3 {
    c: [f64; 6],
}

impl SymmetricTensor3 {
    /// Components in [`TENSOR_PAIRS`] order.
    pub fn new(c: [f64; 6]) -> Self {
        Self { c }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.c[component_index(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.c[component_index(i, j)] = value;
    }

    #[inline]
    pub fn trace(&self) -> f64 {
        self.c[0] + self.c[1] + self.c[2]
    }

    /// Σ_ij T_ij², off-diagonal terms counted twice
    #[inline]
    pub fn frobenius_sq(&self) -> f64 {
        let diag = self.c[0] * self.c[0] + self.c[1] * self.c[1] + self.c[2] * self.c[2];
        let off = self.c[3] * self.c[3] + self.c[4] * self.c[4] + self.c[5] * self.c[5];
        diag + 2.0 * off
    }

    /// Σ_ij T_ij² − (tr T)²
    #[inline]
    pub fn g2(&self) -> f64 {
        let tr = self.trace();
        self.frobenius_sq() - tr * tr
    }
}

/// Real-space tidal components T_ij(q) in [`TENSOR_PAIRS`] order.
pub fn tidal_components(
    delta_k: &[Complex],
    grid: &SpectralGrid,
    fft: &mut Fft3Processor,
) -> [ScalarField; 6] {
    let n = grid.n();
    TENSOR_PAIRS.map(|(a, b)| {
        let mut t_k = Vec::with_capacity(delta_k.len());
        let mut idx = 0;
        for i in 0..n {
            for j in 0..n {
                for l in 0..n {
                    let k2 = grid.k_squared(i, j, l);
                    let value = if k2 > 0.0 {
                        let kv = grid.wavevector(i, j, l);
                        delta_k[idx] * (-kv[a] * kv[b] / k2)
                    } else {
                        Complex::new(0.0, 0.0)
                    };
                    t_k.push(value);
                    idx += 1;
                }
            }
        }
        fft.inverse_real(t_k)
    })
}

/// Mean-subtracted G2(q) from the Fourier coefficients of δ.
pub fn g2_operator(delta_k: &[Complex], grid: &SpectralGrid, fft: &mut Fft3Processor) -> ScalarField {
    let components = tidal_components(delta_k, grid, fft);
    let cells = grid.num_cells();

    let mut g2 = Vec::with_capacity(cells);
    for idx in 0..cells {
        let t = SymmetricTensor3::new([
            components[0].data()[idx],
            components[1].data()[idx],
            components[2].data()[idx],
            components[3].data()[idx],
            components[4].data()[idx],
            components[5].data()[idx],
        ]);
        g2.push(t.g2());
    }

    let mean = g2.iter().sum::<f64>() / cells as f64;
    for v in g2.iter_mut() {
        *v -= mean;
    }
    ScalarField::from_vec_unchecked(grid.n(), g2)
}
