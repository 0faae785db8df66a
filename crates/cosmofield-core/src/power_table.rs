//! Power Spectrum Table — tabulated P(k) with linear interpolation
//!
//! Linear-theory spectra come from an external Boltzmann solver as a
//! two-column text table:
//!
//! ```text
//! # k [h/Mpc]    P(k) [(Mpc/h)^3]
//! 1.000000000000000021e-03 2.412345678901234567e+03
//! 1.027401155650893542e-03 2.468601234567890123e+03
//! ...
//! ```
//!
//! Queries interpolate linearly in k. Outside the tabulated range the
//! spectrum is zero: modes beyond the simulated band carry no power.
//!
//! ## Example
//!
//! ```rust
//! use cosmofield_core::power_table::PowerSpectrumTable;
//!
//! let table = PowerSpectrumTable::parse("# k P\n0.1 10.0\n0.2 20.0\n").unwrap();
//! assert!((table.interpolate(0.15) - 15.0).abs() < 1e-12);
//! assert_eq!(table.interpolate(0.5), 0.0);
//! ```

use std::fmt::Write as _;
use std::path::Path;

use crate::types::{FieldError, FieldResult};

/// Column header written above every table this crate produces.
pub const TABLE_HEADER: &str = "k [h/Mpc]    P(k) [(Mpc/h)^3]";

/// Immutable (k, P(k)) table with strictly increasing k.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrumTable {
    k: Vec<f64>,
    pk: Vec<f64>,
}

impl PowerSpectrumTable {
    /// Build a table, validating ordering and signs.
    pub fn new(k: Vec<f64>, pk: Vec<f64>) -> FieldResult<Self> {
        if k.len() != pk.len() {
            return Err(FieldError::InvalidTable(format!(
                "{} k values but {} P(k) values",
                k.len(),
                pk.len()
            )));
        }
        if k.len() < 2 {
            return Err(FieldError::InvalidTable(
                "at least two rows are required for interpolation".to_string(),
            ));
        }
        for (row, (&kv, &pv)) in k.iter().zip(&pk).enumerate() {
            if !kv.is_finite() || kv < 0.0 {
                return Err(FieldError::InvalidTable(format!("row {}: bad k = {}", row, kv)));
            }
            if !pv.is_finite() || pv < 0.0 {
                return Err(FieldError::InvalidTable(format!("row {}: bad P(k) = {}", row, pv)));
            }
        }
        if let Some(row) = k.windows(2).position(|w| w[1] <= w[0]) {
            return Err(FieldError::InvalidTable(format!(
                "k must be strictly increasing (rows {} and {})",
                row,
                row + 1
            )));
        }
        Ok(Self { k, pk })
    }

    /// Build from (k, P) pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> FieldResult<Self> {
        let (k, pk) = pairs.iter().copied().unzip();
        Self::new(k, pk)
    }

    /// Parse whitespace-delimited two-column text.
    ///
    /// Blank lines and `#` comments are skipped, as is a leading non-numeric
    /// header line. Any later unparseable row is an error.
    pub fn parse(text: &str) -> FieldResult<Self> {
        let mut k = Vec::new();
        let mut pk = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut cols = line.split_whitespace();
            let first = cols.next().map(str::parse::<f64>);
            let second = cols.next().map(str::parse::<f64>);

            match (first, second) {
                (Some(Ok(kv)), Some(Ok(pv))) => {
                    k.push(kv);
                    pk.push(pv);
                }
                (Some(Err(_)), _) if k.is_empty() => continue, // header
                _ => {
                    return Err(FieldError::InvalidTable(format!(
                        "line {}: expected two numeric columns, got '{}'",
                        lineno + 1,
                        line
                    )))
                }
            }
        }

        Self::new(k, pk)
    }

    /// Load a table file.
    pub fn from_file(path: &Path) -> FieldResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| match e {
            FieldError::InvalidTable(msg) => {
                FieldError::InvalidTable(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Write the table in the same format it is read.
    pub fn write_to(&self, path: &Path) -> FieldResult<()> {
        let rows: Vec<(f64, f64)> = self.k.iter().copied().zip(self.pk.iter().copied()).collect();
        std::fs::write(path, format_columns(&rows, TABLE_HEADER))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.k.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }

    pub fn k(&self) -> &[f64] {
        &self.k
    }

    pub fn pk(&self) -> &[f64] {
        &self.pk
    }

    /// Tabulated k range (min, max)
    pub fn k_range(&self) -> (f64, f64) {
        (self.k[0], self.k[self.k.len() - 1])
    }

    /// Linear interpolation of P at `k`; zero outside the tabulated range.
    pub fn interpolate(&self, k: f64) -> f64 {
        let (k_min, k_max) = self.k_range();
        if !(k >= k_min && k <= k_max) {
            return 0.0;
        }

        // first index with self.k[idx] >= k
        let idx = self.k.partition_point(|&kv| kv < k);
        if idx == 0 {
            return self.pk[0];
        }
        let (k0, k1) = (self.k[idx - 1], self.k[idx]);
        let (p0, p1) = (self.pk[idx - 1], self.pk[idx]);
        p0 + (p1 - p0) * (k - k0) / (k1 - k0)
    }
}

/// Render (x, y) rows as `%.18e` columns under a `# ` header line.
pub fn format_columns(rows: &[(f64, f64)], header: &str) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    let _ = writeln!(out, "# {}", header);
    for &(x, y) in rows {
        let _ = writeln!(out, "{} {}", scientific(x), scientific(y));
    }
    out
}

/// `%.18e`: signed exponent of at least two digits.
fn scientific(v: f64) -> String {
    let raw = format!("{:.18e}", v);
    match raw.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(e) => format!("{}e{}{:02}", mantissa, if e < 0 { '-' } else { '+' }, e.abs()),
            Err(_) => raw,
        },
        None => raw,
    }
}
