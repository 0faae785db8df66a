//! Field storage and file naming.
//!
//! Fields move between pipeline stages as NumPy `.npy` files and spectra as
//! two-column text. This module owns both formats and the naming scheme that
//! ties every product back to the P(k) table it came from.
//!
//! # Example
//!
//! ```rust
//! use cosmofield_core::io::{read_npy, write_npy};
//! use cosmofield_core::types::ScalarField;
//!
//! let field = ScalarField::constant(4, 0.5);
//! let mut buffer = Vec::new();
//! write_npy(&mut buffer, &field).unwrap();
//! assert_eq!(read_npy(&mut buffer.as_slice()).unwrap(), field);
//! ```

pub mod naming;
mod npy;

pub use naming::{
    extract_redshift, galaxy_name, gaussian_name, lognormal_name, spectrum_name, stem_of, GALAXY_DIR,
    GAUSSIAN_DIR, LOGNORMAL_DIR, SPECTRUM_DIR,
};
pub use npy::{parse_header, read_field, read_header, read_npy, write_field, write_npy, NpyDtype, NpyHeader};
