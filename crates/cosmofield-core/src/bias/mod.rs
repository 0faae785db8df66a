//! # Lagrangian Bias Expansion
//!
//! Turns a linear matter field δ into a biased tracer ("galaxy") field using
//! shifted operators:
//!
//! ```text
//!   δh(x) = b1·δ̃(x) + b2·δ̃²(x) + bG2·G̃2(x)  [+ shot noise]
//! ```
//!
//! where each Õ is the Lagrangian operator O(q) carried to x = q + ψ1(q) by
//! the Zel'dovich displacement.
//!
//! ## Pipeline
//!
//! ```text
//!                   ┌─► ψ1(q) ───────────────────────────────┐
//!   δ ─► FFT ─► δ(k)┤                                        │
//!                   ├─► δ² − ⟨δ²⟩ ──┐                        ▼
//!                   └─► T_ij ─► G2 ─┴──► {δ, δ², G2} ─► displace ─► Σ b·Õ ─► + noise ─► δh
//! ```
//!
//! ## Modules
//!
//! - [`displacement`]: ψ1 and the mass-assignment shift
//! - [`tidal`]: symmetric tidal tensor and the G2 operator

pub mod displacement;
pub mod tidal;

pub use displacement::{displace, zeldovich_displacement, MassAssignment};
pub use tidal::{component_index, g2_operator, tidal_components, SymmetricTensor3, TENSOR_PAIRS};

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fft_utils::Fft3Processor;
use crate::spectral_grid::SpectralGrid;
use crate::types::{DisplacementField, FieldError, FieldResult, ScalarField};

/// Bias coefficients of the tracer expansion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasParameters {
    /// Linear bias
    pub b1: f64,
    /// Quadratic bias
    pub b2: f64,
    /// Tidal bias
    pub bg2: f64,
    /// Mean tracer number density n̄ in (h/Mpc)³; adds shot noise when set
    pub nbar: Option<f64>,
}

impl Default for BiasParameters {
    fn default() -> Self {
        Self {
            b1: 1.5,
            b2: 0.5,
            bg2: 0.0,
            nbar: None,
        }
    }
}

impl BiasParameters {
    /// Pure linear bias, no shot noise
    pub fn linear(b1: f64) -> Self {
        Self {
            b1,
            b2: 0.0,
            bg2: 0.0,
            nbar: None,
        }
    }

    pub fn with_nbar(mut self, nbar: f64) -> Self {
        self.nbar = Some(nbar);
        self
    }

    pub fn validate(&self) -> FieldResult<()> {
        for (name, value) in [("b1", self.b1), ("b2", self.b2), ("bG2", self.bg2)] {
            if !value.is_finite() {
                return Err(FieldError::InvalidParameter(format!("{} must be finite", name)));
            }
        }
        if let Some(nbar) = self.nbar {
            if !(nbar.is_finite() && nbar > 0.0) {
                return Err(FieldError::InvalidParameter(format!(
                    "nbar must be positive, got {}",
                    nbar
                )));
            }
        }
        Ok(())
    }
}

/// Lagrangian-space products of one linear field.
#[derive(Debug, Clone)]
pub struct LagrangianOperators {
    /// Zel'dovich displacement, in cells
    pub psi: DisplacementField,
    /// δ(q)
    pub delta: ScalarField,
    /// δ²(q) − ⟨δ²⟩
    pub delta_squared: ScalarField,
    /// G2(q) − ⟨G2⟩
    pub g2: ScalarField,
}

/// Bias expansion engine for a fixed grid.
#[derive(Debug)]
pub struct BiasExpansionEngine {
    grid: SpectralGrid,
    scheme: MassAssignment,
    fft: Fft3Processor,
}

impl BiasExpansionEngine {
    /// Create an engine for `n`³ cells in a box of side `box_size`.
    pub fn new(n: usize, box_size: f64) -> FieldResult<Self> {
        let grid = SpectralGrid::new(n, box_size)?;
        Ok(Self {
            fft: Fft3Processor::new(n),
            grid,
            scheme: MassAssignment::default(),
        })
    }

    /// Select the mass-assignment scheme for the shift.
    pub fn with_scheme(mut self, scheme: MassAssignment) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn grid(&self) -> &SpectralGrid {
        &self.grid
    }

    pub fn scheme(&self) -> MassAssignment {
        self.scheme
    }

    /// Compute ψ1, δ² and G2 for `delta` without shifting them.
    pub fn lagrangian_operators(&mut self, delta: &ScalarField) -> FieldResult<LagrangianOperators> {
        self.check_input(delta)?;
        let delta_k = self.fft.forward_real(delta)?;

        Ok(LagrangianOperators {
            psi: zeldovich_displacement(&delta_k, &self.grid, &mut self.fft),
            delta: delta.clone(),
            delta_squared: squared_operator(delta),
            g2: g2_operator(&delta_k, &self.grid, &mut self.fft),
        })
    }

    /// Build the tracer field δh for `delta`.
    ///
    /// `rng` is drawn from only when `params.nbar` is set. Operators whose
    /// coefficient is zero are not computed.
    pub fn tracer_field<R: Rng + ?Sized>(
        &mut self,
        delta: &ScalarField,
        params: &BiasParameters,
        rng: &mut R,
    ) -> FieldResult<ScalarField> {
        params.validate()?;
        self.check_input(delta)?;

        let delta_k = self.fft.forward_real(delta)?;
        let psi = zeldovich_displacement(&delta_k, &self.grid, &mut self.fft);
        debug!(rms_cells = psi.rms(), "zel'dovich displacement");

        let shifted_delta = displace(delta, &psi, self.scheme)?;

        let shifted_delta2 = if params.b2 != 0.0 {
            Some(displace(&squared_operator(delta), &psi, self.scheme)?)
        } else {
            None
        };

        let shifted_g2 = if params.bg2 != 0.0 {
            let g2 = g2_operator(&delta_k, &self.grid, &mut self.fft);
            Some(displace(&g2, &psi, self.scheme)?)
        } else {
            None
        };

        let tracer = combine(params, &shifted_delta, shifted_delta2.as_ref(), shifted_g2.as_ref())?;

        info!(
            b1 = params.b1,
            b2 = params.b2,
            bg2 = params.bg2,
            scheme = self.scheme.name(),
            "tracer field assembled"
        );

        match params.nbar {
            Some(nbar) => add_shot_noise(&tracer, &self.grid, nbar, rng),
            None => Ok(tracer),
        }
    }

    fn check_input(&self, delta: &ScalarField) -> FieldResult<()> {
        if delta.n() != self.grid.n() {
            return Err(FieldError::ShapeMismatch {
                expected: self.grid.num_cells(),
                actual: delta.len(),
            });
        }
        delta.check_finite()
    }
}

/// δ² − ⟨δ²⟩
pub fn squared_operator(delta: &ScalarField) -> ScalarField {
    let squared = delta.map(|d| d * d);
    let mean = squared.mean();
    squared.map(|v| v - mean)
}

/// δh = b1·Õ1 + b2·Õ2 + bG2·ÕG2, skipping absent operators.
pub fn combine(
    params: &BiasParameters,
    delta1: &ScalarField,
    delta2: Option<&ScalarField>,
    g2: Option<&ScalarField>,
) -> FieldResult<ScalarField> {
    let mut out = delta1.map(|v| params.b1 * v);

    for (coeff, op) in [(params.b2, delta2), (params.bg2, g2)] {
        if let Some(op) = op {
            if op.n() != out.n() {
                return Err(FieldError::ShapeMismatch {
                    expected: out.len(),
                    actual: op.len(),
                });
            }
            for (o, &v) in out.data_mut().iter_mut().zip(op.data()) {
                *o += coeff * v;
            }
        }
    }
    Ok(out)
}

/// Add white shot noise of amplitude 1/n̄.
///
/// Each voxel receives an independent N(0, σ²) draw with
/// σ² = 1/(n̄·V_cell), V_cell = (L/N)³.
pub fn add_shot_noise<R: Rng + ?Sized>(
    field: &ScalarField,
    grid: &SpectralGrid,
    nbar: f64,
    rng: &mut R,
) -> FieldResult<ScalarField> {
    if !(nbar.is_finite() && nbar > 0.0) {
        return Err(FieldError::InvalidParameter(format!("nbar must be positive, got {}", nbar)));
    }
    if field.n() != grid.n() {
        return Err(FieldError::ShapeMismatch {
            expected: grid.num_cells(),
            actual: field.len(),
        });
    }

    let sigma = (1.0 / (nbar * grid.cell_volume())).sqrt();
    debug!(nbar, sigma, "adding shot noise");

    let mut out = field.clone();
    for v in out.data_mut() {
        let z: f64 = rng.sample(StandardNormal);
        *v += sigma * z;
    }
    Ok(out)
}
