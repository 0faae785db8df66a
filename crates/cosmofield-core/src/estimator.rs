//! Power Spectrum Estimator — spherically averaged P(k) of a field
//!
//! Measures the power spectrum of a periodic field in logarithmic |k| bins.
//!
//! ```text
//! δ(x) ──► FFT ──► P = V/N⁶·|FFT|² ──┐
//!                                     ├──► drop k = 0 ──► bin on log edges ──► mean per bin
//! SpectralGrid ──► |k| ───────────────┘
//! ```
//!
//! Edges run from the fundamental kf = 2π/L to the Nyquist frequency πN/L,
//! with both ends pinned exactly. Bins are half-open `[e_i, e_{i+1})` except
//! the last, which also includes its upper edge. Empty bins and bins whose
//! mean is not strictly positive are dropped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fft_utils::{power_spectrum, Fft3Processor};
use crate::power_table::{format_columns, TABLE_HEADER};
use crate::spectral_grid::SpectralGrid;
use crate::types::{FieldError, FieldResult, ScalarField};

/// Binning configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Number of logarithmic bin edges (bins = edges − 1)
    pub num_edges: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self { num_edges: 6 }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> FieldResult<()> {
        if self.num_edges < 2 {
            return Err(FieldError::InvalidParameter(format!(
                "num_edges must be at least 2, got {}",
                self.num_edges
            )));
        }
        Ok(())
    }
}

/// One populated k bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumBin {
    /// Midpoint of the bin edges
    pub k_center: f64,
    /// Mean power of the modes in the bin
    pub power: f64,
    /// Number of Fourier modes averaged
    pub modes: usize,
}

/// Measured spectrum, ascending in k.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinnedSpectrum {
    bins: Vec<SpectrumBin>,
}

impl BinnedSpectrum {
    pub fn bins(&self) -> &[SpectrumBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn k_centers(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.k_center).collect()
    }

    pub fn powers(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.power).collect()
    }

    /// Two-column text in the same format as a P(k) input table.
    pub fn to_text(&self) -> String {
        let rows: Vec<(f64, f64)> = self.bins.iter().map(|b| (b.k_center, b.power)).collect();
        format_columns(&rows, TABLE_HEADER)
    }

    pub fn write_to(&self, path: &Path) -> FieldResult<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

/// Log-spaced edges from `k_min` to `k_max`, ends pinned exactly.
pub fn log_edges(k_min: f64, k_max: f64, num_edges: usize) -> Vec<f64> {
    if num_edges < 2 {
        return vec![k_min; num_edges];
    }
    let (lo, hi) = (k_min.ln(), k_max.ln());
    let steps = (num_edges - 1) as f64;
    let mut edges: Vec<f64> = (0..num_edges)
        .map(|i| (lo + (hi - lo) * i as f64 / steps).exp())
        .collect();
    edges[0] = k_min;
    edges[num_edges - 1] = k_max;
    edges
}

/// Reusable estimator for one grid.
#[derive(Debug)]
pub struct PowerSpectrumEstimator {
    grid: SpectralGrid,
    config: EstimatorConfig,
    fft: Fft3Processor,
    k_mag: Vec<f64>,
}

impl PowerSpectrumEstimator {
    pub fn new(n: usize, box_size: f64, config: EstimatorConfig) -> FieldResult<Self> {
        config.validate()?;
        let grid = SpectralGrid::new(n, box_size)?;
        Ok(Self {
            fft: Fft3Processor::new(n),
            k_mag: grid.k_mag(),
            grid,
            config,
        })
    }

    pub fn grid(&self) -> &SpectralGrid {
        &self.grid
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Bin edges this estimator uses
    pub fn edges(&self) -> Vec<f64> {
        log_edges(self.grid.fundamental(), self.grid.nyquist(), self.config.num_edges)
    }

    /// Measure the binned power spectrum of `field`.
    pub fn estimate(&mut self, field: &ScalarField) -> FieldResult<BinnedSpectrum> {
        let spectrum = self.fft.forward_real(field)?;
        let scale = self.grid.volume() / (self.grid.num_cells() as f64).powi(2);
        let power = power_spectrum(&spectrum);

        let edges = self.edges();
        let (e_first, e_last) = (edges[0], edges[edges.len() - 1]);
        if !(e_last > e_first) {
            warn!(n = self.grid.n(), "grid too small for any k bin");
            return Ok(BinnedSpectrum::default());
        }

        let num_bins = edges.len() - 1;
        let mut sums = vec![0.0; num_bins];
        let mut counts = vec![0usize; num_bins];

        // index 0 is the k = 0 mode
        for (&k, &p) in self.k_mag.iter().zip(&power).skip(1) {
            if !(k >= e_first && k <= e_last) {
                continue;
            }
            let bin = (edges.partition_point(|&e| e <= k) - 1).min(num_bins - 1);
            sums[bin] += p * scale;
            counts[bin] += 1;
        }

        let bins: Vec<SpectrumBin> = (0..num_bins)
            .filter_map(|b| {
                if counts[b] == 0 {
                    return None;
                }
                let mean = sums[b] / counts[b] as f64;
                // NaN fails the comparison too
                if !(mean > 0.0) {
                    return None;
                }
                Some(SpectrumBin {
                    k_center: 0.5 * (edges[b] + edges[b + 1]),
                    power: mean,
                    modes: counts[b],
                })
            })
            .collect();

        if bins.is_empty() {
            warn!("no populated k bins, spectrum is empty");
        } else {
            debug!(bins = bins.len(), num_edges = edges.len(), "power spectrum measured");
        }
        Ok(BinnedSpectrum { bins })
    }
}

/// Measure the binned power spectrum of `field` in a box of side `box_size`.
pub fn estimate_power_spectrum(
    field: &ScalarField,
    box_size: f64,
    config: &EstimatorConfig,
) -> FieldResult<BinnedSpectrum> {
    PowerSpectrumEstimator::new(field.n(), box_size, *config)?.estimate(field)
}
