//! Row-parallel CPU kernels
//!
//! # CPU Kernels
//!
//! These are the numeric building blocks every [`Matrix`](crate::Matrix)
//! operation bottoms out in. Each kernel takes a `parallel` flag; when it is
//! set the work is split across rows with [`rayon`](https://docs.rs/rayon) and
//! runs on whichever pool the caller installed (see [`super::dispatch`]).
//!
//! ## Layout
//!
//! Inputs are read through a [`View`], which carries explicit row and column
//! strides so a matrix transposed by swapping strides can be consumed without
//! first being copied. Outputs are always freshly allocated, contiguous and
//! row-major.
//!
//! ## Determinism
//!
//! Every output cell is produced by exactly one worker, so results do not
//! depend on the thread count. The only exception is [`sum`], whose
//! floating-point accumulation order follows rayon's reduction tree.

use rand::Rng;
use rayon::prelude::*;

/// Borrowed, strided, read-only matrix data.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    /// Backing buffer, `rows * cols` elements long.
    pub data: &'a [f64],
    /// Logical rows.
    pub rows: usize,
    /// Logical columns.
    pub cols: usize,
    /// Distance in elements between `(i, j)` and `(i + 1, j)`.
    pub row_stride: usize,
    /// Distance in elements between `(i, j)` and `(i, j + 1)`.
    pub col_stride: usize,
}

impl<'a> View<'a> {
    /// A contiguous row-major view.
    #[must_use]
    pub const fn contiguous(data: &'a [f64], rows: usize, cols: usize) -> Self {
        Self {
            data,
            rows,
            cols,
            row_stride: cols,
            col_stride: 1,
        }
    }

    /// Element `(i, j)`.
    #[inline]
    #[must_use]
    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.row_stride + j * self.col_stride]
    }

    /// Whether the buffer is laid out row-major without gaps.
    #[inline]
    #[must_use]
    pub const fn is_contiguous(&self) -> bool {
        self.col_stride == 1 && self.row_stride == self.cols
    }

    /// Number of logical elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the view holds no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs `f(row_index, row)` over every `cols`-wide row of `out`.
fn for_each_row<F>(out: &mut [f64], cols: usize, parallel: bool, f: F)
where
    F: Fn(usize, &mut [f64]) + Sync + Send,
{
    if parallel {
        out.par_chunks_mut(cols)
            .enumerate()
            .for_each(|(i, row)| f(i, row));
    } else {
        out.chunks_mut(cols)
            .enumerate()
            .for_each(|(i, row)| f(i, row));
    }
}

/// Combines two equally shaped views elementwise.
#[must_use]
pub fn zip_with<F>(a: View<'_>, b: View<'_>, parallel: bool, f: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    debug_assert_eq!((a.rows, a.cols), (b.rows, b.cols));

    if a.is_contiguous() && b.is_contiguous() {
        return if parallel {
            a.data
                .par_iter()
                .zip(b.data.par_iter())
                .map(|(&x, &y)| f(x, y))
                .collect()
        } else {
            a.data.iter().zip(b.data).map(|(&x, &y)| f(x, y)).collect()
        };
    }

    let mut out = vec![0.0; a.len()];
    for_each_row(&mut out, a.cols, parallel, |i, row| {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = f(a.at(i, j), b.at(i, j));
        }
    });
    out
}

/// Applies `f` to every element of `a`, producing a contiguous copy.
#[must_use]
pub fn map<F>(a: View<'_>, parallel: bool, f: F) -> Vec<f64>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    if a.is_contiguous() {
        return if parallel {
            a.data.par_iter().map(|&x| f(x)).collect()
        } else {
            a.data.iter().map(|&x| f(x)).collect()
        };
    }

    let mut out = vec![0.0; a.len()];
    for_each_row(&mut out, a.cols, parallel, |i, row| {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = f(a.at(i, j));
        }
    });
    out
}

/// Applies `f` to every element of a buffer in place.
///
/// Position-independent, so it is valid for any stride layout.
pub fn map_in_place<F>(data: &mut [f64], parallel: bool, f: F)
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    if parallel {
        data.par_iter_mut().for_each(|x| *x = f(*x));
    } else {
        data.iter_mut().for_each(|x| *x = f(*x));
    }
}

/// Matrix product `A (m x k) · B (k x n)`, returned row-major `m x n`.
///
/// # Panics
/// Panics if the inner dimensions differ; callers validate beforehand.
#[must_use]
pub fn matmul(a: View<'_>, b: View<'_>, parallel: bool) -> Vec<f64> {
    assert_eq!(a.cols, b.rows, "matmul inner dimensions must match");

    let (k, n) = (a.cols, b.cols);
    let mut out = vec![0.0; a.rows * n];

    // i-k-j order keeps the inner loop streaming along a row of B
    for_each_row(&mut out, n, parallel, |i, row| {
        for l in 0..k {
            let av = a.at(i, l);
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = av.mul_add(b.at(l, j), *cell);
            }
        }
    });
    out
}

/// Physically transposes `a`, returning a contiguous `cols x rows` buffer.
#[must_use]
pub fn transpose(a: View<'_>, parallel: bool) -> Vec<f64> {
    let mut out = vec![0.0; a.len()];
    for_each_row(&mut out, a.rows, parallel, |j, row| {
        for (i, cell) in row.iter_mut().enumerate() {
            *cell = a.at(i, j);
        }
    });
    out
}

/// Copies `a` into a contiguous row-major buffer.
#[must_use]
pub fn to_contiguous(a: View<'_>, parallel: bool) -> Vec<f64> {
    map(a, parallel, |x| x)
}

/// Sets every element to `value`.
pub fn fill(data: &mut [f64], value: f64, parallel: bool) {
    if parallel {
        data.par_iter_mut().for_each(|x| *x = value);
    } else {
        data.fill(value);
    }
}

/// Writes `0, 1, 2, ...` in buffer order.
#[allow(clippy::cast_precision_loss)]
pub fn fill_ascending(data: &mut [f64], parallel: bool) {
    if parallel {
        data.par_iter_mut()
            .enumerate()
            .for_each(|(idx, x)| *x = idx as f64);
    } else {
        data.iter_mut()
            .enumerate()
            .for_each(|(idx, x)| *x = idx as f64);
    }
}

/// Writes `n - 1, n - 2, ..., 0` in buffer order.
#[allow(clippy::cast_precision_loss)]
pub fn fill_descending(data: &mut [f64], parallel: bool) {
    let last = data.len().saturating_sub(1);
    if parallel {
        data.par_iter_mut()
            .enumerate()
            .for_each(|(idx, x)| *x = (last - idx) as f64);
    } else {
        data.iter_mut()
            .enumerate()
            .for_each(|(idx, x)| *x = (last - idx) as f64);
    }
}

/// Fills uniformly from `[min, max)` using per-worker thread-local generators.
///
/// # Panics
/// Panics if `min >= max`; callers validate the range.
pub fn fill_random(data: &mut [f64], min: f64, max: f64, parallel: bool) {
    if parallel {
        data.par_iter_mut()
            .for_each_init(rand::rng, |rng, x| *x = rng.random_range(min..max));
    } else {
        let mut rng = rand::rng();
        data.iter_mut()
            .for_each(|x| *x = rng.random_range(min..max));
    }
}

/// Fills uniformly from `[min, max)` with a caller-supplied generator.
///
/// Always serial so a seeded generator yields a reproducible sequence.
pub fn fill_random_with<R: Rng>(data: &mut [f64], rng: &mut R, min: f64, max: f64) {
    data.iter_mut()
        .for_each(|x| *x = rng.random_range(min..max));
}

/// Sum of every element.
#[must_use]
pub fn sum(data: &[f64], parallel: bool) -> f64 {
    if parallel {
        data.par_iter().sum()
    } else {
        data.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn transposed_view(data: &[f64], rows: usize, cols: usize) -> View<'_> {
        // the stored buffer is rows x cols; present it as cols x rows
        View {
            data,
            rows: cols,
            cols: rows,
            row_stride: 1,
            col_stride: cols,
        }
    }

    #[test]
    fn matmul_matches_hand_computed_values() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 2x3
        let b = [7.0, 8.0, 9.0, 10.0, 11.0, 12.0]; // 3x2

        for parallel in [false, true] {
            let out = matmul(View::contiguous(&a, 2, 3), View::contiguous(&b, 3, 2), parallel);
            assert_eq!(out, vec![58.0, 64.0, 139.0, 154.0]);
        }
    }

    #[test]
    #[should_panic(expected = "matmul inner dimensions must match")]
    fn matmul_panics_on_invalid_shape() {
        let a = [1.0; 6];
        let b = [1.0; 8];
        let _ = matmul(View::contiguous(&a, 2, 3), View::contiguous(&b, 4, 2), false);
    }

    #[test]
    fn strided_reads_match_materialized_transpose() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 2x3
        let materialized = transpose(View::contiguous(&a, 2, 3), false);
        assert_eq!(materialized, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let strided = to_contiguous(transposed_view(&a, 2, 3), true);
        assert_eq!(strided, materialized);
    }

    #[test]
    fn zip_with_mixes_layouts() {
        let a = [1.0, 2.0, 3.0, 4.0]; // 2x2, read transposed
        let b = [10.0, 20.0, 30.0, 40.0];
        let out = zip_with(
            transposed_view(&a, 2, 2),
            View::contiguous(&b, 2, 2),
            false,
            |x, y| x + y,
        );
        assert_eq!(out, vec![11.0, 23.0, 32.0, 44.0]);
    }

    #[test]
    fn fills_cover_the_whole_buffer() {
        let mut data = vec![0.0; 5];
        fill_ascending(&mut data, true);
        assert_eq!(data, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        fill_descending(&mut data, false);
        assert_eq!(data, vec![4.0, 3.0, 2.0, 1.0, 0.0]);
        fill(&mut data, 7.5, true);
        assert!(data.iter().all(|&x| x == 7.5));
    }

    #[test]
    fn random_fill_stays_in_range_and_is_reproducible_when_seeded() {
        let mut data = vec![0.0; 1000];
        fill_random(&mut data, -1.0, 1.0, true);
        assert!(data.iter().all(|&x| (-1.0..1.0).contains(&x)));

        let mut a = vec![0.0; 16];
        let mut b = vec![0.0; 16];
        fill_random_with(&mut a, &mut StdRng::seed_from_u64(7), 0.0, 2.0);
        fill_random_with(&mut b, &mut StdRng::seed_from_u64(7), 0.0, 2.0);
        assert_eq!(a, b);
    }

    #[test]
    fn sum_agrees_between_serial_and_parallel() {
        let data: Vec<f64> = (0..10_000).map(f64::from).collect();
        let serial = sum(&data, false);
        let parallel = sum(&data, true);
        assert!((serial - parallel).abs() < 1e-6);
        assert_eq!(serial, 49_995_000.0);
    }
}
