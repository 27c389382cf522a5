//! Saving and loading matrices.
//!
//! # `.lpm` Format
//!
//! A small binary container for a list of `f64` matrices, used for network
//! weights.
//!
//! ```text
//! ┌────────────┬──────────────┬───────────────────────────┐
//! │ "LPM1" [4] │ u32: count   │ matrix 0, matrix 1, ...   │
//! └────────────┴──────────────┴───────────────────────────┘
//!
//! matrix: u64 rows │ u64 cols │ [f64; rows * cols] row-major
//! ```
//!
//! All integers and floats are little-endian. Strided matrices are written
//! in logical row-major order, so a transposed view saves as its transpose.
//!
//! Every matrix read back is validated (positive dimensions, matching element
//! count) before it is handed out.
//!
//! # Example
//!
//! ```rust,no_run
//! use lpmath::{modelio, Matrix};
//!
//! let m = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?;
//! modelio::save_matrices("weights.lpm", [&m])?;
//! let back = modelio::load_matrices("weights.lpm")?;
//! assert_eq!(back[0], m);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use briny::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::error::MatrixError;
use crate::matrix::{Matrix, MatrixInit, MatrixOptions};

/// File signature.
pub const MAGIC: &[u8; 4] = b"LPM1";

/// Errors raised while reading or writing `.lpm` files.
#[derive(Error, Debug)]
pub enum ModelIoError {
    /// The underlying file operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with [`MAGIC`].
    #[error("not an .lpm file")]
    BadMagic,

    /// A stored matrix is internally inconsistent.
    #[error("corrupt matrix {index}: {reason}")]
    Corrupt {
        /// Position of the matrix in the file.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The file holds matrices of different shapes than expected.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Shapes the caller required.
        expected: Vec<(usize, usize)>,
        /// Shapes the file holds.
        found: Vec<(usize, usize)>,
    },

    /// Too many matrices to count in the header.
    #[error("cannot store {0} matrices in one file")]
    TooMany(usize),

    /// A matrix could not be rebuilt.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// A matrix as read from disk, before it is trusted.
struct PackedMatrix {
    rows: u64,
    cols: u64,
    data: Vec<f64>,
}

impl Validate for PackedMatrix {
    fn validate(&self) -> Result<(), ValidationError> {
        let expected = self.rows.checked_mul(self.cols);
        if self.rows == 0 || self.cols == 0 || expected != u64::try_from(self.data.len()).ok() {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Writes `matrices` to `path`, replacing any existing file.
///
/// # Errors
/// [`ModelIoError::Io`] on write failure, [`ModelIoError::TooMany`] past
/// `u32::MAX` matrices.
pub fn save_matrices<'a>(
    path: impl AsRef<Path>,
    matrices: impl IntoIterator<Item = &'a Matrix>,
) -> Result<(), ModelIoError> {
    let matrices: Vec<&Matrix> = matrices.into_iter().collect();
    let count = u32::try_from(matrices.len()).map_err(|_| ModelIoError::TooMany(matrices.len()))?;

    let mut file = BufWriter::new(File::create(path.as_ref())?);
    file.write_all(MAGIC)?;
    file.write_all(&count.to_le_bytes())?;

    for m in &matrices {
        file.write_all(&(m.rows() as u64).to_le_bytes())?;
        file.write_all(&(m.cols() as u64).to_le_bytes())?;
        for value in m.iter() {
            file.write_all(&value.to_le_bytes())?;
        }
    }
    file.flush()?;

    debug!(path = %path.as_ref().display(), count, "saved matrices");
    Ok(())
}

/// Reads every matrix in `path` using the default matrix options.
///
/// # Errors
/// See [`load_matrices_with`].
pub fn load_matrices(path: impl AsRef<Path>) -> Result<Vec<Matrix>, ModelIoError> {
    load_matrices_with(path, &MatrixOptions::default())
}

/// Reads every matrix in `path`, building them with `options`.
///
/// # Errors
/// - [`ModelIoError::BadMagic`] for a foreign file
/// - [`ModelIoError::Corrupt`] for inconsistent dimensions
/// - [`ModelIoError::Io`] for truncated or unreadable files
pub fn load_matrices_with(
    path: impl AsRef<Path>,
    options: &MatrixOptions,
) -> Result<Vec<Matrix>, ModelIoError> {
    let mut file = BufReader::new(File::open(path.as_ref())?);

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(ModelIoError::BadMagic);
    }

    let mut buf4 = [0u8; 4];
    file.read_exact(&mut buf4)?;
    let count = u32::from_le_bytes(buf4) as usize;

    let mut matrices = Vec::new();
    for index in 0..count {
        let rows = read_u64(&mut file)?;
        let cols = read_u64(&mut file)?;
        let len = rows
            .checked_mul(cols)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ModelIoError::Corrupt {
                index,
                reason: format!("{rows}x{cols} is too large"),
            })?;

        // grow as data arrives so a lying header cannot force a huge allocation
        let mut data = Vec::new();
        let mut buf8 = [0u8; 8];
        for _ in 0..len {
            file.read_exact(&mut buf8)?;
            data.push(f64::from_le_bytes(buf8));
        }

        let packed = TrustedData::new(PackedMatrix { rows, cols, data })
            .map_err(|_| ModelIoError::Corrupt {
                index,
                reason: format!("invalid dimensions {rows}x{cols}"),
            })?
            .into_inner();

        let (rows, cols) = (dimension(packed.rows, index)?, dimension(packed.cols, index)?);
        matrices.push(Matrix::build(
            MatrixInit::Data {
                data: packed.data.into(),
                rows: Some(rows),
                cols: Some(cols),
            },
            options,
        )?);
    }

    debug!(path = %path.as_ref().display(), count, "loaded matrices");
    Ok(matrices)
}

fn read_u64(reader: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn dimension(value: u64, index: usize) -> Result<usize, ModelIoError> {
    usize::try_from(value).map_err(|_| ModelIoError::Corrupt {
        index,
        reason: format!("dimension {value} does not fit in memory"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn opts() -> MatrixOptions {
        MatrixOptions::with_threads(1)
    }

    #[test]
    fn saves_logical_order_of_strided_matrices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.lpm");

        let m = Matrix::build(
            MatrixInit::Data {
                data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0].into(),
                rows: Some(2),
                cols: Some(3),
            },
            &opts(),
        )
        .unwrap();
        let t = m.t();

        save_matrices(&path, [&m, &t]).unwrap();
        let back = load_matrices_with(&path, &opts()).unwrap();
        assert_eq!(back, vec![m, t.clone()]);
        assert!(back[1].is_contiguous());
        assert_eq!(back[1].to_vec(), t.to_vec());
    }

    #[test]
    fn rejects_foreign_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();

        let foreign = dir.path().join("foreign.lpm");
        fs::write(&foreign, b"bpat\x01").unwrap();
        assert!(matches!(load_matrices_with(&foreign, &opts()), Err(ModelIoError::BadMagic)));

        let zero = dir.path().join("zero.lpm");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&3u64.to_le_bytes());
        fs::write(&zero, &bytes).unwrap();
        assert!(matches!(
            load_matrices_with(&zero, &opts()),
            Err(ModelIoError::Corrupt { index: 0, .. })
        ));

        let truncated = dir.path().join("short.lpm");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        fs::write(&truncated, &bytes).unwrap();
        assert!(matches!(load_matrices_with(&truncated, &opts()), Err(ModelIoError::Io(_))));
    }
}
