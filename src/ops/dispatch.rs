//! Operation Dispatch Layer
//!
//! This module decides *how* each kernel from [`super::cpu`] runs: serially on
//! the calling thread, or fanned out across a rayon pool sized by the
//! matrix's thread count.
//!
//! # Execution Rules
//! - `threads <= 1`, or fewer than [`PARALLEL_THRESHOLD`] elements of work,
//!   runs serially on the caller's thread.
//! - Otherwise the kernel is installed into a pool with exactly `threads`
//!   workers. Pools are built lazily, once per distinct size, and shared for
//!   the life of the process.
//! - If a pool cannot be built the kernel falls back to serial execution.
//!
//! Every call blocks until all workers have finished, so callers never
//! observe a partially written result.
//!
//! # Example
//! ```rust
//! use lpmath::ops::{cpu::View, dispatch};
//!
//! let a = [1.0, 2.0, 3.0, 4.0];
//! let b = [5.0, 6.0, 7.0, 8.0];
//! let c = dispatch::add_matrix(View::contiguous(&a, 2, 2), View::contiguous(&b, 2, 2), 4);
//! assert_eq!(c, vec![6.0, 8.0, 10.0, 12.0]);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use rand::Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use super::cpu::{self, View};
use crate::activation::Activation;

/// Element count below which kernels always run serially.
pub const PARALLEL_THRESHOLD: usize = 90_000;

static POOLS: Lazy<Mutex<HashMap<usize, Arc<ThreadPool>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns the shared pool with `threads` workers, building it on first use.
fn pool(threads: usize) -> Option<Arc<ThreadPool>> {
    let mut pools = POOLS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(pool) = pools.get(&threads) {
        return Some(Arc::clone(pool));
    }

    match ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("lpmath-{threads}-{i}"))
        .build()
    {
        Ok(pool) => {
            debug!(threads, "built kernel thread pool");
            let pool = Arc::new(pool);
            pools.insert(threads, Arc::clone(&pool));
            Some(pool)
        }
        Err(err) => {
            warn!(threads, %err, "failed to build kernel thread pool, running serially");
            None
        }
    }
}

/// Runs `kernel` serially or inside a `threads`-wide pool.
///
/// The flag handed to `kernel` tells it whether to split its work.
pub fn execute<R, K>(threads: usize, work: usize, kernel: K) -> R
where
    R: Send,
    K: FnOnce(bool) -> R + Send,
{
    if threads <= 1 || work < PARALLEL_THRESHOLD {
        return kernel(false);
    }
    match pool(threads) {
        Some(pool) => pool.install(|| kernel(true)),
        None => kernel(false),
    }
}

/// `a + b` elementwise.
#[must_use]
pub fn add_matrix(a: View<'_>, b: View<'_>, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::zip_with(a, b, par, |x, y| x + y))
}

/// `a - b` elementwise.
#[must_use]
pub fn sub_matrix(a: View<'_>, b: View<'_>, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::zip_with(a, b, par, |x, y| x - y))
}

/// `a * b` elementwise (Hadamard product).
#[must_use]
pub fn mul_matrix(a: View<'_>, b: View<'_>, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::zip_with(a, b, par, |x, y| x * y))
}

/// `a / b` elementwise.
#[must_use]
pub fn div_matrix(a: View<'_>, b: View<'_>, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::zip_with(a, b, par, |x, y| x / y))
}

/// `a + s` for every element.
#[must_use]
pub fn add_scalar(a: View<'_>, s: f64, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::map(a, par, |x| x + s))
}

/// `a - s` for every element.
#[must_use]
pub fn sub_scalar(a: View<'_>, s: f64, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::map(a, par, |x| x - s))
}

/// `a * s` for every element.
#[must_use]
pub fn mul_scalar(a: View<'_>, s: f64, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::map(a, par, |x| x * s))
}

/// `a / s` for every element.
#[must_use]
pub fn div_scalar(a: View<'_>, s: f64, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::map(a, par, |x| x / s))
}

/// Matrix product of `a (m x k)` and `b (k x n)`.
///
/// The work estimate is the number of multiply-adds, so even modest shapes
/// with a long inner dimension are parallelized.
#[must_use]
pub fn matrix_product(a: View<'_>, b: View<'_>, threads: usize) -> Vec<f64> {
    let work = a.rows.saturating_mul(a.cols).saturating_mul(b.cols);
    execute(threads, work, |par| cpu::matmul(a, b, par))
}

/// Physically reordered transpose.
#[must_use]
pub fn transpose(a: View<'_>, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::transpose(a, par))
}

/// Contiguous row-major copy of any layout.
#[must_use]
pub fn to_contiguous(a: View<'_>, threads: usize) -> Vec<f64> {
    execute(threads, a.len(), |par| cpu::to_contiguous(a, par))
}

/// Applies the activation function in place.
pub fn map_activation(data: &mut [f64], activation: Activation, threads: usize) {
    let f = activation.functions().forward;
    let work = data.len();
    execute(threads, work, |par| cpu::map_in_place(data, par, f));
}

/// Applies the activation's derivative in place.
pub fn map_derivative(data: &mut [f64], activation: Activation, threads: usize) {
    let f = activation.functions().derivative;
    let work = data.len();
    execute(threads, work, |par| cpu::map_in_place(data, par, f));
}

/// Sets every element to `value`.
pub fn fill_scalar(data: &mut [f64], value: f64, threads: usize) {
    let work = data.len();
    execute(threads, work, |par| cpu::fill(data, value, par));
}

/// Writes `0..n` in row-major order.
pub fn fill_ascending(data: &mut [f64], threads: usize) {
    let work = data.len();
    execute(threads, work, |par| cpu::fill_ascending(data, par));
}

/// Writes `n-1..=0` in row-major order.
pub fn fill_descending(data: &mut [f64], threads: usize) {
    let work = data.len();
    execute(threads, work, |par| cpu::fill_descending(data, par));
}

/// Uniform fill from `[min, max)`.
pub fn fill_random(data: &mut [f64], min: f64, max: f64, threads: usize) {
    let work = data.len();
    execute(threads, work, |par| cpu::fill_random(data, min, max, par));
}

/// Uniform fill from `[min, max)` driven by `rng`; always serial.
pub fn fill_random_with<R: Rng>(data: &mut [f64], rng: &mut R, min: f64, max: f64) {
    cpu::fill_random_with(data, rng, min, max);
}

/// Sum of every element.
#[must_use]
pub fn sum(data: &[f64], threads: usize) -> f64 {
    execute(threads, data.len(), |par| cpu::sum(data, par))
}

/// Arithmetic mean of every element.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(data: &[f64], threads: usize) -> f64 {
    sum(data, threads) / data.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_operations_agree_across_thread_counts() {
        let n = 400;
        let a: Vec<f64> = (0..n * n).map(|i| f64::from(i % 97)).collect();
        let b: Vec<f64> = (0..n * n).map(|i| f64::from(i % 13)).collect();
        let va = View::contiguous(&a, n as usize, n as usize);
        let vb = View::contiguous(&b, n as usize, n as usize);

        let serial = add_matrix(va, vb, 1);
        for threads in [2, 3, 4] {
            assert_eq!(add_matrix(va, vb, threads), serial);
        }
    }

    #[test]
    fn pools_are_reused_per_size() {
        let first = pool(2).unwrap();
        let second = pool(2).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.current_num_threads(), 2);
    }

    #[test]
    fn activation_maps_run_in_place() {
        let mut data = vec![-1.0, 0.0, 2.0];
        map_activation(&mut data, Activation::Relu, 1);
        assert_eq!(data, vec![0.0, 0.0, 2.0]);
        map_derivative(&mut data, Activation::Relu, 1);
        assert_eq!(data, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn mean_of_ascending_fill() {
        let mut data = vec![0.0; 9];
        fill_ascending(&mut data, 1);
        assert_eq!(mean(&data, 1), 4.0);
    }
}
