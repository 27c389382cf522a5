//! # Kernel Backend
//!
//! Raw dense-matrix numeric operations over row-major, stride-aware buffers.
//!
//! ## Submodules
//!
//! - [`cpu`]: the kernels themselves, each able to run serially or split
//!   across rows with rayon
//! - [`dispatch`]: the named operation surface used by
//!   [`Matrix`](crate::Matrix), which picks serial or pooled execution from
//!   the caller's thread count
//!
//! ## Contract
//!
//! - Shape checks happen above this layer; kernels assume valid operands.
//! - Results are identical for every thread count, except for the summation
//!   order of reductions.
//! - Outputs are freshly allocated and contiguous; in-place kernels touch
//!   every element exactly once.
//!
//! ## Extending the Backend
//!
//! 1. Implement the kernel in `cpu` with a `parallel` flag
//! 2. Expose it from `dispatch`, routing through `dispatch::execute`
//! 3. Validate shapes in `Matrix` before calling it

pub mod cpu;
pub mod dispatch;
