//! Error types shared by matrices and networks.
//!
//! Every failure is raised synchronously by the call that detects it, before
//! any kernel runs, so a failed operation never leaves a partial result behind.

use thiserror::Error;

/// Errors raised while constructing or operating on matrices and networks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    /// Operand or construction dimensions are incompatible.
    #[error("shape error: {0}")]
    Shape(String),

    /// A parameter has the wrong kind of value.
    #[error("type error: {0}")]
    Type(String),

    /// The request is recognised but not supported.
    #[error("not implemented: {0}")]
    Unimplemented(String),

    /// A named metric does not exist or is not being logged.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// An element index lies outside the matrix.
    #[error("index ({row}, {col}) is out of range for a {rows}x{cols} matrix")]
    IndexOutOfRange {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Rows in the matrix.
        rows: usize,
        /// Columns in the matrix.
        cols: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MatrixError>;

impl MatrixError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub(crate) fn unimplemented(msg: impl Into<String>) -> Self {
        Self::Unimplemented(msg.into())
    }

    pub(crate) fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_violated_precondition() {
        let err = MatrixError::shape("expected 2x3, got 3x2");
        assert_eq!(err.to_string(), "shape error: expected 2x3, got 3x2");

        let err = MatrixError::IndexOutOfRange { row: 4, col: 0, rows: 2, cols: 2 };
        assert_eq!(err.to_string(), "index (4, 0) is out of range for a 2x2 matrix");
    }
}
