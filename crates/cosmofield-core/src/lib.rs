//! # Cosmological Density Field Library
//!
//! This crate forward-models large-scale-structure density fields on a
//! periodic N×N×N grid of side L:
//!
//! - **Synthesis**: draw a Gaussian random field with a tabulated P(k)
//! - **Log-normal mapping**: turn it into a strictly positive density
//! - **Bias expansion**: shift δ, δ² and G2 by the Zel'dovich displacement
//!   and combine them into a tracer ("galaxy") field
//! - **Estimation**: measure the spherically averaged P(k) of any field
//!
//! ## Signal Flow
//!
//! ```text
//! P(k) table ─► Synthesizer ─► δ ─┬─► Log-normal ─► ρ
//!                                 └─► Bias engine ─► δh
//!                       δ, ρ − 1, δh ─► Estimator ─► P̂(k)
//! ```
//!
//! ## Normalization
//!
//! One convention is used throughout: δ(k) = (V/N³)·FFT[δ] and
//! P(k) = |δ(k)|²/V with V = L³. The synthesizer places coefficients with
//! E|FFT|² = N⁶P/V and the estimator divides the same factor back out, so a
//! synthesize → estimate round trip recovers the input table.
//!
//! ## Example
//!
//! ```rust
//! use cosmofield_core::prelude::*;
//! use rand::SeedableRng;
//!
//! let table = PowerSpectrumTable::from_pairs(&[(0.0, 2.0e4), (10.0, 2.0e4)]).unwrap();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//!
//! let mut synth = GaussianFieldSynthesizer::new(16, 100.0).unwrap();
//! let delta = synth.generate(&table, &mut rng);
//!
//! let rho = apply_log_normal(&delta);
//! assert!(rho.data().iter().all(|&r| r > 0.0));
//!
//! let mut engine = BiasExpansionEngine::new(16, 100.0).unwrap();
//! let tracer = engine.tracer_field(&delta, &BiasParameters::default(), &mut rng).unwrap();
//!
//! let pk = estimate_power_spectrum(&tracer, 100.0, &EstimatorConfig::default()).unwrap();
//! assert!(pk.len() <= 5);
//! ```

pub mod bias;
pub mod config;
pub mod estimator;
pub mod fft_utils;
pub mod gaussian_field;
pub mod io;
pub mod lognormal;
pub mod observe;
pub mod power_table;
pub mod spectral_grid;
pub mod types;

pub use bias::{BiasExpansionEngine, BiasParameters, MassAssignment};
pub use config::{ConfigError, CosmofieldConfig};
pub use estimator::{estimate_power_spectrum, BinnedSpectrum, EstimatorConfig, PowerSpectrumEstimator};
pub use fft_utils::Fft3Processor;
pub use gaussian_field::{generate_gaussian_field, FourierSymmetry, GaussianFieldSynthesizer};
pub use lognormal::apply_log_normal;
pub use power_table::PowerSpectrumTable;
pub use spectral_grid::SpectralGrid;
pub use types::{Complex, DisplacementField, FieldError, FieldResult, ScalarField};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bias::{BiasExpansionEngine, BiasParameters, MassAssignment};
    pub use crate::estimator::{estimate_power_spectrum, BinnedSpectrum, EstimatorConfig};
    pub use crate::gaussian_field::{FourierSymmetry, GaussianFieldSynthesizer};
    pub use crate::lognormal::apply_log_normal;
    pub use crate::power_table::PowerSpectrumTable;
    pub use crate::spectral_grid::SpectralGrid;
    pub use crate::types::{FieldError, FieldResult, ScalarField};
}
