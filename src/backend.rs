//! Element type and process-wide thread selection.
//!
//! This module defines the element types a [`Matrix`](crate::Matrix) may be
//! declared with and the default degree of parallelism handed to every matrix
//! that is built without an explicit thread count.
//!
//! # Thread Count Resolution
//!
//! 1. An override installed with [`set_default_threads`] wins.
//! 2. Otherwise the calibrated value from [`crate::calibrate::thread_config`]
//!    is used. Calibration runs at most once per process and is usually loaded
//!    from the persisted record of a previous run.
//!
//! The override is stored in an `AtomicUsize`, where `0` means "unset". It is
//! expected to change rarely, never in the middle of a compute-heavy section.

use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::MatrixError;

/// Element types a matrix may be declared with.
///
/// Only `Float64` has a construction path; the integer and single precision
/// variants are reserved and rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Dtype {
    /// 64-bit IEEE float (default and only implemented type).
    #[default]
    Float64 = 0,
    /// 32-bit IEEE float.
    Float32 = 1,
    /// 64-bit signed integer.
    Int64 = 2,
    /// 32-bit signed integer.
    Int32 = 3,
    /// 16-bit signed integer.
    Int16 = 4,
}

impl Dtype {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float64 => "float64",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Int32 => "int32",
            Self::Int16 => "int16",
        }
    }

    /// Whether matrices of this type can actually be built.
    #[must_use]
    pub const fn is_implemented(self) -> bool {
        matches!(self, Self::Float64)
    }
}

impl TryFrom<u8> for Dtype {
    type Error = MatrixError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Float64),
            1 => Ok(Self::Float32),
            2 => Ok(Self::Int64),
            3 => Ok(Self::Int32),
            4 => Ok(Self::Int16),
            other => Err(MatrixError::type_error(format!("no dtype with tag {other}"))),
        }
    }
}

impl FromStr for Dtype {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float64" => Ok(Self::Float64),
            "float32" => Ok(Self::Float32),
            "int64" => Ok(Self::Int64),
            "int32" => Ok(Self::Int32),
            "int16" => Ok(Self::Int16),
            other => Err(MatrixError::type_error(format!(
                "matrix datatype '{other}' is not valid"
            ))),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Process-wide thread override; `0` means "use the calibrated value".
static DEFAULT_THREADS_OVERRIDE: AtomicUsize = AtomicUsize::new(0);

/// Overrides the default thread count for every matrix created afterwards.
///
/// Matrices that already exist keep their own count.
///
/// # Errors
/// Returns [`MatrixError::Type`] when `threads` is zero.
///
/// # Example
///
/// ```
/// use lpmath::backend::{default_threads, set_default_threads};
/// set_default_threads(2).unwrap();
/// assert_eq!(default_threads(), 2);
/// ```
pub fn set_default_threads(threads: usize) -> Result<(), MatrixError> {
    if threads == 0 {
        return Err(MatrixError::type_error(
            "invalid number of threads, must be >= 1",
        ));
    }
    DEFAULT_THREADS_OVERRIDE.store(threads, Ordering::Release);
    Ok(())
}

/// Removes an override installed by [`set_default_threads`].
pub fn clear_default_threads() {
    DEFAULT_THREADS_OVERRIDE.store(0, Ordering::Release);
}

/// Returns the thread count new matrices receive when none is given.
///
/// Falls back to the calibrated value, running calibration on first use.
#[must_use]
pub fn default_threads() -> usize {
    match DEFAULT_THREADS_OVERRIDE.load(Ordering::Acquire) {
        0 => crate::calibrate::thread_config().optimal_threads,
        n => n,
    }
}
