//! Dense two-dimensional matrices.
//!
//! # Matrix
//!
//! [`Matrix`] is the numeric primitive the rest of the crate is built on. It
//! validates every construction argument up front, infers shapes from
//! supplied data, and routes arithmetic to the [kernel backend](crate::ops)
//! with its own thread count.
//!
//! ## Construction
//! - [`Matrix::new`]: explicit shape, zero-filled
//! - [`Matrix::from_vec`] / [`Matrix::column`]: a single row or column
//! - [`Matrix::from_rows`]: nested rows, which must all have the same length
//! - [`Matrix::build`]: the general form, taking a [`MatrixInit`] and
//!   [`MatrixOptions`]; this is where partial shapes are inferred
//! - the [`matrix!`](crate::matrix!) macro and [`str::parse`]
//!
//! ## Layout
//! Storage is a single `Vec<f64>` addressed through a row stride and a column
//! stride. [`Matrix::transpose_in_place`] only swaps those strides, so it is
//! O(1); every kernel reads through the strides, and every operation result is
//! contiguous again.
//!
//! ## Example
//!
//! ```rust
//! use lpmath::{backend, Matrix};
//! # backend::set_default_threads(1)?;
//!
//! let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?.with_threads(1)?;
//! let b = a.t();
//! let c = a.dot(&b)?;
//! assert_eq!(c.shape(), (2, 2));
//! assert_eq!(c.get(0, 1)?, 11.0);
//! # Ok::<(), lpmath::MatrixError>(())
//! ```

use core::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub, SubAssign};

use rand::Rng;

use crate::activation::Activation;
use crate::backend::{self, Dtype};
use crate::error::{MatrixError, Result};
use crate::ops::cpu::View;
use crate::ops::dispatch;

/// Default range of [`Matrix::fill_random_default`].
pub const DEFAULT_RANDOM_RANGE: (f64, f64) = (-1.0, 1.0);

/// Literal data a matrix can be built from.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixData {
    /// One-dimensional values, laid out row-major once a shape is known.
    Flat(Vec<f64>),
    /// Nested rows; every row must have the same length.
    Nested(Vec<Vec<f64>>),
}

impl From<Vec<f64>> for MatrixData {
    fn from(values: Vec<f64>) -> Self {
        Self::Flat(values)
    }
}

impl From<&[f64]> for MatrixData {
    fn from(values: &[f64]) -> Self {
        Self::Flat(values.to_vec())
    }
}

impl From<Vec<Vec<f64>>> for MatrixData {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Self::Nested(rows)
    }
}

/// What a matrix is built from.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixInit {
    /// An explicit shape, zero-filled.
    Shape {
        /// Number of rows, at least 1.
        rows: usize,
        /// Number of columns, at least 1.
        cols: usize,
    },
    /// Literal data with an optional, possibly partial, shape.
    ///
    /// - both dimensions: their product must equal the element count
    /// - one dimension: the other is derived and must divide exactly
    /// - neither: flat data becomes one row, nested data keeps its shape
    Data {
        /// The values.
        data: MatrixData,
        /// Requested rows.
        rows: Option<usize>,
        /// Requested columns.
        cols: Option<usize>,
    },
}

/// Options shared by every constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatrixOptions {
    /// Element type. Only [`Dtype::Float64`] is implemented.
    pub dtype: Dtype,
    /// Worker threads for this matrix's operations. `None` takes the process
    /// default from [`backend::default_threads`].
    pub threads: Option<usize>,
}

impl MatrixOptions {
    /// Options with an explicit thread count.
    #[must_use]
    pub const fn with_threads(threads: usize) -> Self {
        Self {
            dtype: Dtype::Float64,
            threads: Some(threads),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(MatrixError::type_error(
                "invalid number of threads, must be >= 1",
            ));
        }
        if !self.dtype.is_implemented() {
            return Err(MatrixError::unimplemented(format!(
                "matrices of type {} are not supported yet",
                self.dtype
            )));
        }
        Ok(())
    }

    fn resolve_threads(&self) -> usize {
        self.threads.unwrap_or_else(backend::default_threads)
    }
}

/// Right-hand side of an elementwise operation.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    /// A matrix of exactly the same shape.
    Matrix(&'a Matrix),
    /// A value applied to every element.
    Scalar(f64),
}

impl<'a> From<&'a Matrix> for Operand<'a> {
    fn from(m: &'a Matrix) -> Self {
        Self::Matrix(m)
    }
}

impl From<f64> for Operand<'_> {
    fn from(s: f64) -> Self {
        Self::Scalar(s)
    }
}

#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    const fn verb(self) -> &'static str {
        match self {
            Self::Add => "addition",
            Self::Sub => "subtraction",
            Self::Mul => "multiplication",
            Self::Div => "division",
        }
    }
}

/// A dense matrix of `f64` values.
#[derive(Debug, Clone)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    row_stride: usize,
    col_stride: usize,
    data: Vec<f64>,
    dtype: Dtype,
    threads: usize,
}

impl Matrix {
    /// A zero-filled `rows x cols` matrix using the default thread count.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if either dimension is zero.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        Self::build(MatrixInit::Shape { rows, cols }, &MatrixOptions::default())
    }

    /// A single-row matrix holding `values`.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if `values` is empty.
    pub fn from_vec(values: Vec<f64>) -> Result<Self> {
        Self::build(
            MatrixInit::Data {
                data: MatrixData::Flat(values),
                rows: None,
                cols: None,
            },
            &MatrixOptions::default(),
        )
    }

    /// A single-column matrix holding `values`.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if `values` is empty.
    pub fn column(values: Vec<f64>) -> Result<Self> {
        let rows = values.len();
        Self::build(
            MatrixInit::Data {
                data: MatrixData::Flat(values),
                rows: Some(rows),
                cols: Some(1),
            },
            &MatrixOptions::default(),
        )
    }

    /// A matrix with one row per inner vector.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if there are no rows or the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::build(
            MatrixInit::Data {
                data: MatrixData::Nested(rows),
                rows: None,
                cols: None,
            },
            &MatrixOptions::default(),
        )
    }

    /// A `rows x cols` matrix from row-major `values`.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if `rows * cols != values.len()`.
    pub fn from_shape_vec(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        Self::build(
            MatrixInit::Data {
                data: MatrixData::Flat(values),
                rows: Some(rows),
                cols: Some(cols),
            },
            &MatrixOptions::default(),
        )
    }

    /// Builds a matrix from any [`MatrixInit`].
    ///
    /// Validation order: options, then shape. The default thread count is
    /// only resolved once everything else has been accepted.
    ///
    /// # Errors
    /// - [`MatrixError::Type`] for `threads == Some(0)`
    /// - [`MatrixError::Unimplemented`] for any dtype but `Float64`
    /// - [`MatrixError::Shape`] for zero dimensions, empty or ragged data, or
    ///   a shape that does not match the element count
    pub fn build(init: MatrixInit, options: &MatrixOptions) -> Result<Self> {
        options.validate()?;

        let (rows, cols, data) = match init {
            MatrixInit::Shape { rows, cols } => {
                if rows == 0 || cols == 0 {
                    return Err(MatrixError::shape(format!(
                        "matrix dimensions must be positive, got {rows}x{cols}"
                    )));
                }
                let len = rows.checked_mul(cols).ok_or_else(|| {
                    MatrixError::shape(format!("a {rows}x{cols} matrix is too large"))
                })?;
                (rows, cols, vec![0.0; len])
            }
            MatrixInit::Data { data, rows, cols } => {
                let (natural, values) = flatten(data)?;
                let (rows, cols) = infer_shape(values.len(), natural, rows, cols)?;
                (rows, cols, values)
            }
        };

        Ok(Self::from_raw(rows, cols, data, options.dtype, options.resolve_threads()))
    }

    /// Wraps an already computed row-major buffer without validating it.
    pub(crate) fn from_raw(
        rows: usize,
        cols: usize,
        data: Vec<f64>,
        dtype: Dtype,
        threads: usize,
    ) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self {
            rows,
            cols,
            row_stride: cols,
            col_stride: 1,
            data,
            dtype,
            threads,
        }
    }

    /// A new contiguous matrix carrying this matrix's dtype and threads.
    fn derive(&self, rows: usize, cols: usize, data: Vec<f64>) -> Self {
        Self::from_raw(rows, cols, data, self.dtype, self.threads)
    }

    /// Replaces the thread count, consuming and returning `self`.
    ///
    /// # Errors
    /// [`MatrixError::Type`] if `threads` is zero.
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        self.set_threads(threads)?;
        Ok(self)
    }

    /// Replaces the thread count used by this matrix's operations.
    ///
    /// # Errors
    /// [`MatrixError::Type`] if `threads` is zero.
    pub fn set_threads(&mut self, threads: usize) -> Result<()> {
        if threads == 0 {
            return Err(MatrixError::type_error(
                "invalid number of threads, must be >= 1",
            ));
        }
        self.threads = threads;
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Always `false`; a matrix has at least one element.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Declared element type.
    #[must_use]
    pub const fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Worker threads used by this matrix's operations.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Buffer distance between vertically adjacent elements.
    #[must_use]
    pub const fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Buffer distance between horizontally adjacent elements.
    #[must_use]
    pub const fn col_stride(&self) -> usize {
        self.col_stride
    }

    /// Whether the buffer is plain row-major.
    #[must_use]
    pub const fn is_contiguous(&self) -> bool {
        self.col_stride == 1 && self.row_stride == self.cols
    }

    /// Borrowed strided view for the kernel backend.
    #[must_use]
    pub fn view(&self) -> View<'_> {
        View {
            data: &self.data,
            rows: self.rows,
            cols: self.cols,
            row_stride: self.row_stride,
            col_stride: self.col_stride,
        }
    }

    #[inline]
    const fn offset(&self, row: usize, col: usize) -> usize {
        row * self.row_stride + col * self.col_stride
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row < self.rows && col < self.cols {
            Ok(())
        } else {
            Err(MatrixError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    fn check_same_shape(&self, other: &Self, what: &str) -> Result<()> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(MatrixError::shape(format!(
                "invalid matrix size for {what}: {}x{} and {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )))
        }
    }

    // ---- element access ----

    /// Element at `(row, col)`.
    ///
    /// # Errors
    /// [`MatrixError::IndexOutOfRange`] outside the matrix.
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.data[self.offset(row, col)])
    }

    /// Overwrites the element at `(row, col)`.
    ///
    /// # Errors
    /// [`MatrixError::IndexOutOfRange`] outside the matrix.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        let idx = self.offset(row, col);
        self.data[idx] = value;
        Ok(())
    }

    /// Element addressed by a multi-part index.
    ///
    /// Only `[row, col]` is supported; row slicing by a single index is not.
    ///
    /// # Errors
    /// - [`MatrixError::Unimplemented`] unless exactly two parts are given
    /// - [`MatrixError::IndexOutOfRange`] outside the matrix
    pub fn at(&self, index: &[usize]) -> Result<f64> {
        match *index {
            [row, col] => self.get(row, col),
            _ => Err(MatrixError::unimplemented(format!(
                "indexing must take two values, got {}",
                index.len()
            ))),
        }
    }

    /// Elements in logical row-major order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.rows).flat_map(move |i| (0..self.cols).map(move |j| self.data[self.offset(i, j)]))
    }

    /// Row-major copy of the elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        if self.is_contiguous() {
            self.data.clone()
        } else {
            dispatch::to_contiguous(self.view(), self.threads)
        }
    }

    /// Elements as nested rows.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.to_vec()
            .chunks(self.cols)
            .map(<[f64]>::to_vec)
            .collect()
    }

    /// Deep copy sharing nothing with `self`.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    // ---- elementwise arithmetic ----

    fn elementwise(&self, rhs: Operand<'_>, op: BinaryOp) -> Result<Self> {
        let other = match rhs {
            Operand::Matrix(other) => other,
            Operand::Scalar(s) => return Ok(self.scalar_op(s, op)),
        };
        self.check_same_shape(other, op.verb())?;

        let (a, b) = (self.view(), other.view());
        let data = match op {
            BinaryOp::Add => dispatch::add_matrix(a, b, self.threads),
            BinaryOp::Sub => dispatch::sub_matrix(a, b, self.threads),
            BinaryOp::Mul => dispatch::mul_matrix(a, b, self.threads),
            BinaryOp::Div => dispatch::div_matrix(a, b, self.threads),
        };
        Ok(self.derive(self.rows, self.cols, data))
    }

    /// `self + rhs`, elementwise or by scalar.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if a matrix operand has a different shape.
    pub fn try_add<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<Self> {
        self.elementwise(rhs.into(), BinaryOp::Add)
    }

    /// `self - rhs`, elementwise or by scalar.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if a matrix operand has a different shape.
    pub fn try_sub<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<Self> {
        self.elementwise(rhs.into(), BinaryOp::Sub)
    }

    /// `self * rhs`, the Hadamard product or scaling by a scalar.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if a matrix operand has a different shape.
    pub fn try_mul<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<Self> {
        self.elementwise(rhs.into(), BinaryOp::Mul)
    }

    /// `self / rhs`, elementwise or by scalar.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if a matrix operand has a different shape.
    pub fn try_div<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<Self> {
        self.elementwise(rhs.into(), BinaryOp::Div)
    }

    /// In-place form of [`Matrix::try_add`].
    ///
    /// # Errors
    /// As [`Matrix::try_add`]; `self` is untouched on failure.
    pub fn try_add_assign<'a>(&mut self, rhs: impl Into<Operand<'a>>) -> Result<()> {
        *self = self.try_add(rhs)?;
        Ok(())
    }

    /// In-place form of [`Matrix::try_sub`].
    ///
    /// # Errors
    /// As [`Matrix::try_sub`]; `self` is untouched on failure.
    pub fn try_sub_assign<'a>(&mut self, rhs: impl Into<Operand<'a>>) -> Result<()> {
        *self = self.try_sub(rhs)?;
        Ok(())
    }

    /// In-place form of [`Matrix::try_mul`].
    ///
    /// # Errors
    /// As [`Matrix::try_mul`]; `self` is untouched on failure.
    pub fn try_mul_assign<'a>(&mut self, rhs: impl Into<Operand<'a>>) -> Result<()> {
        *self = self.try_mul(rhs)?;
        Ok(())
    }

    /// In-place form of [`Matrix::try_div`].
    ///
    /// # Errors
    /// As [`Matrix::try_div`]; `self` is untouched on failure.
    pub fn try_div_assign<'a>(&mut self, rhs: impl Into<Operand<'a>>) -> Result<()> {
        *self = self.try_div(rhs)?;
        Ok(())
    }

    /// Matrix product `self @ rhs`, run with `self`'s thread count.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] unless `self.cols() == rhs.rows()`.
    pub fn dot(&self, rhs: &Self) -> Result<Self> {
        if self.cols != rhs.rows {
            return Err(MatrixError::shape(format!(
                "invalid matrix size for matrix product: {}x{} @ {}x{}",
                self.rows, self.cols, rhs.rows, rhs.cols
            )));
        }
        let data = dispatch::matrix_product(self.view(), rhs.view(), self.threads);
        Ok(self.derive(self.rows, rhs.cols, data))
    }

    // ---- transposition ----

    /// Transposes by swapping extents and strides; no data moves.
    pub fn transpose_in_place(&mut self) {
        core::mem::swap(&mut self.rows, &mut self.cols);
        core::mem::swap(&mut self.row_stride, &mut self.col_stride);
        // vectors are row-major in either orientation
        if self.rows == 1 || self.cols == 1 {
            self.row_stride = self.cols;
            self.col_stride = 1;
        }
    }

    /// A physically reordered transpose.
    #[must_use]
    pub fn transposed(&self) -> Self {
        let data = dispatch::transpose(self.view(), self.threads);
        self.derive(self.cols, self.rows, data)
    }

    /// The transpose as a new matrix, via a copy and a stride swap.
    ///
    /// Never mutates `self`.
    #[must_use]
    pub fn t(&self) -> Self {
        let mut out = self.clone();
        out.transpose_in_place();
        out
    }

    /// Rewrites the buffer row-major if it is currently strided.
    pub fn make_contiguous(&mut self) {
        if !self.is_contiguous() {
            self.data = dispatch::to_contiguous(self.view(), self.threads);
            self.row_stride = self.cols;
            self.col_stride = 1;
        }
    }

    /// Changes the shape, keeping the row-major element order.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if the element count would change.
    pub fn reshape(&mut self, rows: usize, cols: usize) -> Result<()> {
        if rows.checked_mul(cols) != Some(self.len()) {
            return Err(MatrixError::shape(format!(
                "original dimensions {}x{} cannot scale to {rows}x{cols}",
                self.rows, self.cols
            )));
        }
        self.make_contiguous();
        self.rows = rows;
        self.cols = cols;
        self.row_stride = cols;
        self.col_stride = 1;
        Ok(())
    }

    // ---- mapping ----

    /// Applies `activation` to every element in place.
    pub fn map(&mut self, activation: Activation) {
        dispatch::map_activation(&mut self.data, activation, self.threads);
    }

    /// Applies the derivative of `activation` to every element in place.
    ///
    /// The elements are taken to be outputs of that activation.
    pub fn map_derivative(&mut self, activation: Activation) {
        dispatch::map_derivative(&mut self.data, activation, self.threads);
    }

    /// [`Matrix::map`] into a new matrix.
    #[must_use]
    pub fn mapped(&self, activation: Activation) -> Self {
        let mut out = self.clone();
        out.map(activation);
        out
    }

    /// [`Matrix::map_derivative`] into a new matrix.
    #[must_use]
    pub fn mapped_derivative(&self, activation: Activation) -> Self {
        let mut out = self.clone();
        out.map_derivative(activation);
        out
    }

    // ---- fills ----

    fn reset_layout(&mut self) {
        self.row_stride = self.cols;
        self.col_stride = 1;
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: f64) {
        dispatch::fill_scalar(&mut self.data, value, self.threads);
    }

    /// Fills with `0, 1, 2, ...` in row-major order.
    pub fn fill_ascending(&mut self) {
        self.reset_layout();
        dispatch::fill_ascending(&mut self.data, self.threads);
    }

    /// Fills with `n - 1, ..., 1, 0` in row-major order.
    pub fn fill_descending(&mut self) {
        self.reset_layout();
        dispatch::fill_descending(&mut self.data, self.threads);
    }

    /// Fills uniformly from `[min, max)`.
    ///
    /// # Errors
    /// [`MatrixError::Type`] unless both bounds are finite and `min < max`.
    pub fn fill_random(&mut self, min: f64, max: f64) -> Result<()> {
        check_range(min, max)?;
        dispatch::fill_random(&mut self.data, min, max, self.threads);
        Ok(())
    }

    /// Fills uniformly from `[-1, 1)`.
    pub fn fill_random_default(&mut self) {
        let (min, max) = DEFAULT_RANDOM_RANGE;
        dispatch::fill_random(&mut self.data, min, max, self.threads);
    }

    /// Fills uniformly from `[min, max)` drawing from `rng`.
    ///
    /// # Errors
    /// [`MatrixError::Type`] unless both bounds are finite and `min < max`.
    pub fn fill_random_with<R: Rng>(&mut self, rng: &mut R, min: f64, max: f64) -> Result<()> {
        check_range(min, max)?;
        self.reset_layout();
        dispatch::fill_random_with(&mut self.data, rng, min, max);
        Ok(())
    }

    // ---- reductions ----

    /// Sum of all elements.
    #[must_use]
    pub fn sum(&self) -> f64 {
        dispatch::sum(&self.data, self.threads)
    }

    /// Mean of all elements.
    #[must_use]
    pub fn mean(&self) -> f64 {
        dispatch::mean(&self.data, self.threads)
    }
}

fn check_range(min: f64, max: f64) -> Result<()> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(MatrixError::type_error(format!(
            "random fill range [{min}, {max}) is empty or not finite"
        )))
    }
}

/// Flattens literal data, returning its natural shape and row-major values.
fn flatten(data: MatrixData) -> Result<((usize, usize), Vec<f64>)> {
    match data {
        MatrixData::Flat(values) => {
            if values.is_empty() {
                return Err(MatrixError::shape(
                    "matrix initialization data cannot have length of zero",
                ));
            }
            Ok(((1, values.len()), values))
        }
        MatrixData::Nested(rows) => {
            let width = rows.first().map_or(0, Vec::len);
            if width == 0 {
                return Err(MatrixError::shape(
                    "matrix initialization data cannot have length of zero",
                ));
            }
            if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
                return Err(MatrixError::shape(format!(
                    "invalid matrix shape: row {i} has {} values, expected {width}",
                    row.len()
                )));
            }
            let height = rows.len();
            Ok(((height, width), rows.into_iter().flatten().collect()))
        }
    }
}

/// Resolves a possibly partial shape against `len` elements.
fn infer_shape(
    len: usize,
    natural: (usize, usize),
    rows: Option<usize>,
    cols: Option<usize>,
) -> Result<(usize, usize)> {
    match (rows, cols) {
        (Some(0), _) | (_, Some(0)) => Err(MatrixError::shape(
            "matrix dimensions must be positive",
        )),
        (Some(r), Some(c)) => {
            if r.checked_mul(c) == Some(len) {
                Ok((r, c))
            } else {
                Err(MatrixError::shape(format!(
                    "invalid size for matrix: {r}x{c} does not hold {len} values"
                )))
            }
        }
        (Some(r), None) => derive_extent(len, r, "rows").map(|c| (r, c)),
        (None, Some(c)) => derive_extent(len, c, "columns").map(|r| (r, c)),
        (None, None) => Ok(natural),
    }
}

/// The extent that, paired with `given`, holds exactly `len` elements.
fn derive_extent(len: usize, given: usize, what: &str) -> Result<usize> {
    let other = len / given;
    if other * given == len {
        return Ok(other);
    }
    let fit = if other == 0 {
        format!("at least {given} values are needed")
    } else if what == "rows" {
        format!("closest valid fit is {given}x{other} ({} values)", given * other)
    } else {
        format!("closest valid fit is {other}x{given} ({} values)", given * other)
    };
    Err(MatrixError::shape(format!(
        "cannot arrange {len} values into {given} {what}; {fit}"
    )))
}

impl PartialEq for Matrix {
    /// Logical equality: same shape and elements, whatever the layout.
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.iter().eq(other.iter())
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    /// # Panics
    /// Panics when the index is out of range.
    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        if let Err(err) = self.check_index(row, col) {
            panic!("{err}");
        }
        &self.data[self.offset(row, col)]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    /// # Panics
    /// Panics when the index is out of range.
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        if let Err(err) = self.check_index(row, col) {
            panic!("{err}");
        }
        let idx = self.offset(row, col);
        &mut self.data[idx]
    }
}

impl Matrix {
    fn scalar_op(&self, s: f64, op: BinaryOp) -> Self {
        let a = self.view();
        let data = match op {
            BinaryOp::Add => dispatch::add_scalar(a, s, self.threads),
            BinaryOp::Sub => dispatch::sub_scalar(a, s, self.threads),
            BinaryOp::Mul => dispatch::mul_scalar(a, s, self.threads),
            BinaryOp::Div => dispatch::div_scalar(a, s, self.threads),
        };
        self.derive(self.rows, self.cols, data)
    }
}

// Operator sugar over the `try_*` methods. Matrix operands panic where the
// fallible forms return an error; scalar operands cannot fail.
macro_rules! impl_operator {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $try:ident) => {
        impl $trait<&Matrix> for &Matrix {
            type Output = Matrix;

            fn $method(self, rhs: &Matrix) -> Matrix {
                self.$try(rhs).unwrap_or_else(|err| panic!("{err}"))
            }
        }

        impl $trait<f64> for &Matrix {
            type Output = Matrix;

            fn $method(self, rhs: f64) -> Matrix {
                self.scalar_op(rhs, BinaryOp::$trait)
            }
        }

        impl $trait<f64> for Matrix {
            type Output = Matrix;

            fn $method(self, rhs: f64) -> Matrix {
                self.scalar_op(rhs, BinaryOp::$trait)
            }
        }

        impl $assign_trait<&Matrix> for Matrix {
            fn $assign_method(&mut self, rhs: &Matrix) {
                *self = self.$try(rhs).unwrap_or_else(|err| panic!("{err}"));
            }
        }

        impl $assign_trait<f64> for Matrix {
            fn $assign_method(&mut self, rhs: f64) {
                *self = self.scalar_op(rhs, BinaryOp::$trait);
            }
        }
    };
}

impl_operator!(Add, add, AddAssign, add_assign, try_add);
impl_operator!(Sub, sub, SubAssign, sub_assign, try_sub);
impl_operator!(Mul, mul, MulAssign, mul_assign, try_mul);
impl_operator!(Div, div, DivAssign, div_assign, try_div);
