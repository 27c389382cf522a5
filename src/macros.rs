//! Matrix literals.

/// Builds a [`Matrix`](crate::Matrix) from literal rows.
///
/// Nested brackets give one row each; a bare list gives a single row. Each
/// element goes through `f64::from`, so integer and `f32` literals work too.
/// The result is a [`Result`](crate::Result) because rows may be ragged.
///
/// # Example
///
/// ```rust
/// use lpmath::{backend, matrix};
/// backend::set_default_threads(1)?;
///
/// let m = matrix![[1, 2, 3], [4, 5, 6]]?;
/// assert_eq!(m.shape(), (2, 3));
///
/// let v = matrix![0.5, 1.5]?;
/// assert_eq!(v.shape(), (1, 2));
///
/// assert!(matrix![[1, 2], [3]].is_err());
/// # Ok::<(), lpmath::MatrixError>(())
/// ```
#[macro_export]
macro_rules! matrix {
    ($([$($x:expr),+ $(,)?]),+ $(,)?) => {
        $crate::Matrix::from_rows(::std::vec![$(::std::vec![$(f64::from($x)),+]),+])
    };
    ($($x:expr),+ $(,)?) => {
        $crate::Matrix::from_vec(::std::vec![$(f64::from($x)),+])
    };
}
