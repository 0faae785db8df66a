//! Output naming and redshift extraction.
//!
//! Every product of a P(k) table keeps the table's file stem and gains a
//! suffix per stage:
//!
//! ```text
//! pk_lcdm_z0.5.txt
//!   ├── gaussian_field/pk_lcdm_z0.5.npy
//!   ├── lognormal_field/pk_lcdm_z0.5_lognormal.npy
//!   ├── galaxy_field/pk_lcdm_z0.5_galaxy.npy
//!   └── power_spectrum/pk_lcdm_z0.5_pk.txt
//! ```

use std::path::Path;

pub const GAUSSIAN_DIR: &str = "gaussian_field";
pub const LOGNORMAL_DIR: &str = "lognormal_field";
pub const GALAXY_DIR: &str = "galaxy_field";
pub const SPECTRUM_DIR: &str = "power_spectrum";

pub const LOGNORMAL_SUFFIX: &str = "_lognormal";
pub const GALAXY_SUFFIX: &str = "_galaxy";
pub const SPECTRUM_SUFFIX: &str = "_pk";

/// Redshift encoded in a file name.
///
/// The value is the text after the last `_z` of the stem, up to the next
/// `_`. Returns `None` if there is no `_z` or the text is not a number.
///
/// ```rust
/// use cosmofield_core::io::extract_redshift;
/// use std::path::Path;
///
/// assert_eq!(extract_redshift(Path::new("pk_lcdm_z0.5_lognormal.npy")), Some(0.5));
/// assert_eq!(extract_redshift(Path::new("field.npy")), None);
/// ```
pub fn extract_redshift(path: &Path) -> Option<f64> {
    let stem = path.file_stem()?.to_str()?;
    let (_, tail) = stem.rsplit_once("_z")?;
    let z_text = tail.split('_').next()?;
    z_text.parse::<f64>().ok().filter(|z| z.is_finite())
}

/// File stem as UTF-8, lossy.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn gaussian_name(stem: &str) -> String {
    format!("{}.npy", stem)
}

pub fn lognormal_name(stem: &str) -> String {
    format!("{}{}.npy", stem, LOGNORMAL_SUFFIX)
}

pub fn galaxy_name(stem: &str) -> String {
    format!("{}{}.npy", stem, GALAXY_SUFFIX)
}

pub fn spectrum_name(stem: &str) -> String {
    format!("{}{}.txt", stem, SPECTRUM_SUFFIX)
}
