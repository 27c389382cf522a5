//! # `lpmath`
//!
//! Dense matrices whose kernels run in parallel with a thread count picked by
//! a one-time calibration, and a small fully connected network trained by
//! backpropagation on top of them.
//!
//! ## Features
//!
//! - **Matrices**: validated construction with shape inference, elementwise
//!   and scalar arithmetic, matrix products, O(1) stride transposes,
//!   activation maps, fills and reductions
//! - **Calibration**: the default thread count is benchmarked once per machine
//!   and persisted; it can be overridden per process or per matrix
//! - **Networks**: feed-forward inference, per-sample gradient descent, loss
//!   logging and weight persistence
//!
//! ## Modules
//!
//! - [`matrix`]: the [`Matrix`] type
//! - [`ops`]: the row-parallel kernel backend
//! - [`calibrate`]: thread-count calibration
//! - [`backend`]: element types and the process-wide thread default
//! - [`network`]: the [`Network`] type
//! - [`modelio`]: the `.lpm` file format
//!
//! ## Example
//!
//! ```rust
//! use lpmath::{backend, matrix, Activation};
//!
//! backend::set_default_threads(2)?;
//!
//! let a = matrix![[1, 2], [3, 4]]?;
//! let b = a.mapped(Activation::Sigmoid);
//! let c = (&a + &b).dot(&a.t())?;
//! assert_eq!(c.shape(), (2, 2));
//! # Ok::<(), lpmath::MatrixError>(())
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::many_single_char_names,
    clippy::cast_possible_truncation,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions
)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs)]

pub mod activation;
pub mod approx;
pub mod backend;
pub mod calibrate;
mod display;
pub mod error;
mod macros;
pub mod matrix;
pub mod metrics;
pub mod modelio;
pub mod network;
pub mod ops;
mod parse;

pub use activation::Activation;
pub use backend::Dtype;
pub use error::{MatrixError, Result};
pub use matrix::{Matrix, MatrixData, MatrixInit, MatrixOptions, Operand};
pub use metrics::Metric;
pub use network::{FitConfig, Network, NetworkConfig, Sample};
