//! NumPy `.npy` field storage.
//!
//! Fields are stored as version 1.0 `.npy` arrays of shape (N, N, N) in C
//! order, so they load directly with `numpy.load`.
//!
//! # Layout
//!
//! ```text
//! ┌────────────┬─────┬─────┬──────────┬──────────────────────────┬──────────────┐
//! │ \x93NUMPY  │ maj │ min │ hdr_len  │ dict literal, space pad, │ little-endian│
//! │ (6 bytes)  │ (1) │ (1) │ u16 / u32│ '\n' to a 64-byte bound  │ data         │
//! └────────────┴─────┴─────┴──────────┴──────────────────────────┴──────────────┘
//! ```
//!
//! # Supported Dtypes
//!
//! | descr | Read | Write |
//! |-------|------|-------|
//! | `<f8` | yes  | yes   |
//! | `<f4` | yes  | no    |
//!
//! Anything else, Fortran order, or a non-cubic shape is a
//! [`FieldError::Format`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::types::{FieldError, FieldResult, ScalarField};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGN: usize = 64;
/// Upper bound on the header dict of a v2/v3 file.
const MAX_HEADER_LEN: usize = 1 << 20;

/// Element type of a stored array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpyDtype {
    /// Little-endian float64
    F8,
    /// Little-endian float32
    F4,
}

impl NpyDtype {
    pub fn descr(&self) -> &'static str {
        match self {
            NpyDtype::F8 => "<f8",
            NpyDtype::F4 => "<f4",
        }
    }

    /// Bytes per element.
    pub fn width(&self) -> usize {
        match self {
            NpyDtype::F8 => 8,
            NpyDtype::F4 => 4,
        }
    }

    fn from_descr(s: &str) -> Option<Self> {
        match s {
            "<f8" => Some(NpyDtype::F8),
            "<f4" => Some(NpyDtype::F4),
            _ => None,
        }
    }
}

/// Parsed array header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub dtype: NpyDtype,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

/// Serialize `field` as a float64 `.npy` stream.
pub fn write_npy<W: Write>(writer: &mut W, field: &ScalarField) -> FieldResult<()> {
    let n = field.n();
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({}, {}, {}), }}",
        NpyDtype::F8.descr(),
        n,
        n,
        n
    );

    // magic + version + u16 length, then the dict padded so data starts aligned
    let prefix = MAGIC.len() + 2 + 2;
    let unpadded = prefix + dict.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    let header_len = dict.len() + padding + 1;
    let header_len = u16::try_from(header_len)
        .map_err(|_| FieldError::Format(format!("header too long ({} bytes)", header_len)))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_u16::<LittleEndian>(header_len)?;
    writer.write_all(dict.as_bytes())?;
    writer.write_all(&vec![b' '; padding])?;
    writer.write_all(b"\n")?;

    for &v in field.data() {
        writer.write_f64::<LittleEndian>(v)?;
    }
    Ok(())
}

/// Read a cubic float field from a `.npy` stream.
pub fn read_npy<R: Read>(reader: &mut R) -> FieldResult<ScalarField> {
    let header = read_header(reader)?;

    if header.fortran_order {
        return Err(FieldError::Format("Fortran-ordered arrays are not supported".to_string()));
    }
    let n = match header.shape.as_slice() {
        [a, b, c] if a == b && b == c && *a > 0 => *a,
        other => {
            return Err(FieldError::Format(format!(
                "expected a cubic (N, N, N) array, got shape {:?}",
                other
            )))
        }
    };

    let width = header.dtype.width();
    let bytes = n
        .checked_mul(n)
        .and_then(|c| c.checked_mul(n))
        .and_then(|c| c.checked_mul(width))
        .and_then(|b| u64::try_from(b).ok())
        .ok_or_else(|| FieldError::Format(format!("shape ({0}, {0}, {0}) is too large", n)))?;

    // the buffer grows with the bytes actually present, not the declared shape
    let mut raw = Vec::new();
    reader.by_ref().take(bytes).read_to_end(&mut raw)?;
    if (raw.len() as u64) < bytes {
        return Err(FieldError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {} data bytes, found {}", bytes, raw.len()),
        )));
    }

    let cells = raw.len() / width;
    let data = match header.dtype {
        NpyDtype::F8 => {
            let mut buf = vec![0.0f64; cells];
            LittleEndian::read_f64_into(&raw, &mut buf);
            buf
        }
        NpyDtype::F4 => {
            let mut buf = vec![0.0f32; cells];
            LittleEndian::read_f32_into(&raw, &mut buf);
            buf.into_iter().map(f64::from).collect()
        }
    };

    ScalarField::from_vec(n, data)
}

/// Read and parse the header, leaving `reader` at the first data byte.
pub fn read_header<R: Read>(reader: &mut R) -> FieldResult<NpyHeader> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(FieldError::Format("missing .npy magic string".to_string()));
    }

    let major = reader.read_u8()?;
    let _minor = reader.read_u8()?;
    let header_len = match major {
        1 => reader.read_u16::<LittleEndian>()? as usize,
        2 | 3 => reader.read_u32::<LittleEndian>()? as usize,
        v => return Err(FieldError::Format(format!("unsupported .npy version {}", v))),
    };
    if header_len > MAX_HEADER_LEN {
        return Err(FieldError::Format(format!("header length {} is too large", header_len)));
    }

    let mut raw = vec![0u8; header_len];
    reader.read_exact(&mut raw)?;
    let text = String::from_utf8(raw)
        .map_err(|_| FieldError::Format("header is not valid text".to_string()))?;

    parse_header(&text)
}

/// Parse the Python dict literal of an `.npy` header.
pub fn parse_header(text: &str) -> FieldResult<NpyHeader> {
    let descr = dict_value(text, "descr")
        .ok_or_else(|| FieldError::Format("header has no 'descr'".to_string()))?;
    let descr = descr.trim_matches(|c: char| c == '\'' || c == '"');
    let dtype = NpyDtype::from_descr(descr)
        .ok_or_else(|| FieldError::Format(format!("unsupported dtype '{}'", descr)))?;

    let fortran_order = match dict_value(text, "fortran_order") {
        Some("False") => false,
        Some("True") => true,
        other => {
            return Err(FieldError::Format(format!(
                "bad 'fortran_order' value {:?}",
                other
            )))
        }
    };

    let shape_text = dict_value(text, "shape")
        .ok_or_else(|| FieldError::Format("header has no 'shape'".to_string()))?;
    let shape = shape_text
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| FieldError::Format(format!("bad shape entry '{}'", s)))
        })
        .collect::<FieldResult<Vec<usize>>>()?;

    Ok(NpyHeader {
        dtype,
        fortran_order,
        shape,
    })
}

/// Raw text of the value stored under `key`.
fn dict_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let quoted = [format!("'{}'", key), format!("\"{}\"", key)];
    let start = quoted.iter().find_map(|q| text.find(q.as_str()).map(|p| p + q.len()))?;
    let rest = text[start..].trim_start().strip_prefix(':')?.trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else if let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
        rest[1..].find(quote)? + 2
    } else {
        rest.find(|c: char| c == ',' || c == '}').unwrap_or(rest.len())
    };
    Some(rest[..end].trim())
}

/// Write `field` to `path` as float64 `.npy`.
pub fn write_field(path: &Path, field: &ScalarField) -> FieldResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_npy(&mut writer, field)?;
    writer.flush()?;
    Ok(())
}

/// Load a cubic field from an `.npy` file.
pub fn read_field(path: &Path) -> FieldResult<ScalarField> {
    let mut reader = BufReader::new(File::open(path)?);
    read_npy(&mut reader).map_err(|e| match e {
        FieldError::Format(msg) => FieldError::Format(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> ScalarField {
        ScalarField::from_fn(n, |i, j, k| i as f64 - 0.5 * j as f64 + 1e-3 * k as f64)
    }

    fn header_bytes(dict: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(dict.len() as u16 + 1).to_le_bytes());
        out.extend_from_slice(dict.as_bytes());
        out.push(b'\n');
        out
    }

    #[test]
    fn test_header_is_aligned() {
        let mut buf = Vec::new();
        write_npy(&mut buf, &sample(3)).unwrap();
        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(buf.len(), 10 + header_len + 27 * 8);
        assert_eq!(buf[10 + header_len - 1], b'\n');
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pk_test_z0.npy");
        let field = sample(5);
        write_field(&path, &field).unwrap();
        assert_eq!(read_field(&path).unwrap(), field);
    }

    #[test]
    fn test_reads_float32() {
        let mut bytes = header_bytes("{'descr': '<f4', 'fortran_order': False, 'shape': (2, 2, 2), }");
        for v in 0..8 {
            bytes.extend_from_slice(&(v as f32 * 0.5).to_le_bytes());
        }
        let field = read_npy(&mut bytes.as_slice()).unwrap();
        assert_eq!(field.n(), 2);
        assert_eq!(field.get(1, 1, 1), 3.5);
    }

    #[test]
    fn test_rejects_non_cubic() {
        let mut bytes = header_bytes("{'descr': '<f8', 'fortran_order': False, 'shape': (2, 3, 2), }");
        bytes.extend(std::iter::repeat(0u8).take(12 * 8));
        assert!(matches!(read_npy(&mut bytes.as_slice()), Err(FieldError::Format(_))));
    }

    #[test]
    fn test_rejects_fortran_and_big_endian() {
        let bytes = header_bytes("{'descr': '<f8', 'fortran_order': True, 'shape': (1, 1, 1), }");
        assert!(matches!(read_npy(&mut bytes.as_slice()), Err(FieldError::Format(_))));

        let bytes = header_bytes("{'descr': '>f8', 'fortran_order': False, 'shape': (1, 1, 1), }");
        assert!(matches!(read_npy(&mut bytes.as_slice()), Err(FieldError::Format(_))));
    }

    #[test]
    fn test_rejects_bad_magic_and_truncation() {
        let junk = b"NOTNUMPY..".to_vec();
        assert!(matches!(read_npy(&mut junk.as_slice()), Err(FieldError::Format(_))));

        let mut buf = Vec::new();
        write_npy(&mut buf, &sample(3)).unwrap();
        buf.truncate(buf.len() - 8);
        assert!(matches!(read_npy(&mut buf.as_slice()), Err(FieldError::Io(_))));
    }

    #[test]
    fn test_rejects_oversized_shape() {
        let bytes = header_bytes("{'descr': '<f8', 'fortran_order': False, 'shape': (3000000, 3000000, 3000000), }");
        assert!(matches!(read_npy(&mut bytes.as_slice()), Err(FieldError::Format(_))));
    }

    #[test]
    fn test_large_shape_without_data_is_truncated() {
        let mut bytes = header_bytes("{'descr': '<f8', 'fortran_order': False, 'shape': (2000, 2000, 2000), }");
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        assert!(matches!(read_npy(&mut bytes.as_slice()), Err(FieldError::Io(_))));
    }

    #[test]
    fn test_rejects_oversized_v2_header_length() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[2, 0]);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(read_npy(&mut bytes.as_slice()), Err(FieldError::Format(_))));
    }

    #[test]
    fn test_parse_header_spacing() {
        let header = parse_header("{\"descr\":\"<f8\",\"fortran_order\":False,\"shape\":(4,4,4)}").unwrap();
        assert_eq!(header.dtype, NpyDtype::F8);
        assert!(!header.fortran_order);
        assert_eq!(header.shape, vec![4, 4, 4]);
    }
}
