//! Zel'dovich displacement and Lagrangian → Eulerian shifting
//!
//! First-order LPT moves a fluid element from its Lagrangian position q to
//! x = q + ψ1(q), with
//!
//! ```text
//!   ψ1(k) = i k/k² δ(k)       (so that ∇·ψ1 = −δ)
//! ```
//!
//! A Lagrangian operator O(q) is carried to Eulerian space by depositing each
//! cell's value at its displaced position. Positions wrap modulo N, so the
//! box stays periodic. How a value is shared between the nodes around x is
//! the [`MassAssignment`] scheme:
//!
//! | Scheme | Nodes | Weight along one axis (d = offset in cells)          |
//! |--------|-------|------------------------------------------------------|
//! | NGP    | 1     | 1 at the nearest node                                |
//! | CIC    | 8     | 1 − d, d                                             |
//! | TSC    | 27    | ½(½ − d)², ¾ − d², ½(½ + d)²                          |
//!
//! Every scheme's weights sum to one, so the deposit conserves Σ O. NGP is
//! cheapest and aliases most; TSC smooths even an undisplaced field.

use serde::{Deserialize, Serialize};

use crate::fft_utils::Fft3Processor;
use crate::spectral_grid::SpectralGrid;
use crate::types::{flat_index, Complex, DisplacementField, FieldError, FieldResult, ScalarField};

/// Mass-assignment scheme used when shifting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassAssignment {
    /// Nearest grid point
    #[serde(rename = "ngp")]
    NearestGridPoint,
    /// Cloud in cell (trilinear)
    #[serde(rename = "cic")]
    CloudInCell,
    /// Triangular shaped cloud (quadratic)
    #[serde(rename = "tsc")]
    TriangularShapedCloud,
}

impl Default for MassAssignment {
    fn default() -> Self {
        MassAssignment::NearestGridPoint
    }
}

impl MassAssignment {
    /// Number of nodes touched along one axis
    pub fn support(&self) -> usize {
        match self {
            MassAssignment::NearestGridPoint => 1,
            MassAssignment::CloudInCell => 2,
            MassAssignment::TriangularShapedCloud => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MassAssignment::NearestGridPoint => "ngp",
            MassAssignment::CloudInCell => "cic",
            MassAssignment::TriangularShapedCloud => "tsc",
        }
    }

    /// Node indices (wrapped to 0..n) and weights for coordinate `x`.
    #[inline]
    fn axis_weights(&self, x: f64, n: usize) -> ([usize; 3], [f64; 3]) {
        let wrap = |i: f64| (i as i64).rem_euclid(n as i64) as usize;
        match self {
            MassAssignment::NearestGridPoint => ([wrap(x.round()), 0, 0], [1.0, 0.0, 0.0]),
            MassAssignment::CloudInCell => {
                let base = x.floor();
                let d = x - base;
                ([wrap(base), wrap(base + 1.0), 0], [1.0 - d, d, 0.0])
            }
            MassAssignment::TriangularShapedCloud => {
                let center = x.round();
                let d = x - center;
                (
                    [wrap(center - 1.0), wrap(center), wrap(center + 1.0)],
                    [0.5 * (0.5 - d) * (0.5 - d), 0.75 - d * d, 0.5 * (0.5 + d) * (0.5 + d)],
                )
            }
        }
    }
}

/// Zel'dovich displacement ψ1(q) in units of grid cells.
///
/// `delta_k` holds the unnormalized forward FFT of δ. The k = 0 term is
/// dropped.
pub fn zeldovich_displacement(
    delta_k: &[Complex],
    grid: &SpectralGrid,
    fft: &mut Fft3Processor,
) -> DisplacementField {
    let n = grid.n();
    let to_cells = 1.0 / grid.cell_size();

    let components = [0usize, 1, 2].map(|axis| {
        let mut psi_k = Vec::with_capacity(delta_k.len());
        let mut idx = 0;
        for i in 0..n {
            for j in 0..n {
                for l in 0..n {
                    let k2 = grid.k_squared(i, j, l);
                    let value = if k2 > 0.0 {
                        let ka = grid.wavevector(i, j, l)[axis];
                        delta_k[idx] * Complex::new(0.0, ka / k2)
                    } else {
                        Complex::new(0.0, 0.0)
                    };
                    psi_k.push(value);
                    idx += 1;
                }
            }
        }
        fft.inverse_real(psi_k)
            .into_data()
            .into_iter()
            .map(|v| v * to_cells)
            .collect::<Vec<f64>>()
    });

    DisplacementField::from_components_unchecked(n, components)
}

/// Shift `field` from Lagrangian q to Eulerian x = q + ψ(q), wrapping mod n.
pub fn displace(
    field: &ScalarField,
    psi: &DisplacementField,
    scheme: MassAssignment,
) -> FieldResult<ScalarField> {
    let n = field.n();
    if psi.n() != n {
        return Err(FieldError::ShapeMismatch {
            expected: field.len(),
            actual: psi.n().pow(3),
        });
    }

    let support = scheme.support();
    let mut out = vec![0.0; field.len()];
    let values = field.data();

    let mut idx = 0;
    for i in 0..n {
        for j in 0..n {
            for l in 0..n {
                let value = values[idx];
                let [sx, sy, sz] = psi.at(idx);
                let (ix, wx) = scheme.axis_weights(i as f64 + sx, n);
                let (iy, wy) = scheme.axis_weights(j as f64 + sy, n);
                let (iz, wz) = scheme.axis_weights(l as f64 + sz, n);

                for a in 0..support {
                    for b in 0..support {
                        let wab = wx[a] * wy[b];
                        for c in 0..support {
                            out[flat_index(n, ix[a], iy[b], iz[c])] += value * wab * wz[c];
                        }
                    }
                }
                idx += 1;
            }
        }
    }

    ScalarField::from_vec(n, out)
}
