//! Graded approximate equality for floating point values and matrices.
//!
//! Results of the parallel kernels may differ from a serial reference in the
//! last bits (reductions sum in a different order), so comparisons are graded
//! rather than exact.

use crate::matrix::Matrix;

/// Largest difference still rated [`ApproxEquality::Relative`].
pub const F64_MAX_ERROR: f64 = 1e-3;

/// Largest difference still rated [`ApproxEquality::Partial`].
pub const F64_AVG_ERROR: f64 = 1e-6;

/// Largest difference still rated [`ApproxEquality::Precise`].
pub const F64_MIN_ERROR: f64 = 1e-12;

/// How close two values are, best first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Within [`F64_MIN_ERROR`].
    Precise = 0,
    /// Within [`F64_AVG_ERROR`].
    Partial = 1,
    /// Within [`F64_MAX_ERROR`].
    Relative = 2,
    /// Not equal in any useful sense.
    Scarce = 3,
}

impl ApproxEquality {
    /// Grades an absolute difference.
    #[must_use]
    pub fn of_difference(diff: f64) -> Self {
        if diff <= F64_MIN_ERROR {
            Self::Precise
        } else if diff <= F64_AVG_ERROR {
            Self::Partial
        } else if diff <= F64_MAX_ERROR {
            Self::Relative
        } else {
            // NaN differences land here too
            Self::Scarce
        }
    }
}

/// Graded comparison against `Rhs`.
pub trait RelativeEq<Rhs: ?Sized = Self> {
    /// The grade of the worst compared pair.
    fn relative_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

impl RelativeEq for f64 {
    fn relative_eq(&self, rhs: &Self) -> ApproxEquality {
        ApproxEquality::of_difference((self - rhs).abs())
    }
}

impl RelativeEq for [f64] {
    fn relative_eq(&self, rhs: &Self) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        let mut worst = ApproxEquality::Precise;
        for (a, b) in self.iter().zip(rhs) {
            worst = worst.max(a.relative_eq(b));
            if worst == ApproxEquality::Scarce {
                break;
            }
        }
        worst
    }
}

impl RelativeEq for Matrix {
    fn relative_eq(&self, rhs: &Self) -> ApproxEquality {
        if self.shape() != rhs.shape() {
            return ApproxEquality::Scarce;
        }
        self.to_vec().relative_eq(rhs.to_vec().as_slice())
    }
}

/// `true` when `a` and `b` are at least [`ApproxEquality::Partial`] equal.
pub fn approx_eq<T: RelativeEq + ?Sized>(a: &T, b: &T) -> bool {
    a.relative_eq(b) <= ApproxEquality::Partial
}

impl Matrix {
    /// Same shape and every element within `tolerance` of its counterpart.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.shape() == other.shape()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend;

    #[test]
    fn grades_follow_the_difference() {
        assert_eq!(1.0_f64.relative_eq(&1.0), ApproxEquality::Precise);
        assert_eq!(1.0_f64.relative_eq(&1.000_000_1), ApproxEquality::Partial);
        assert_eq!(1.0_f64.relative_eq(&1.0001), ApproxEquality::Relative);
        assert_eq!(1.0_f64.relative_eq(&1.1), ApproxEquality::Scarce);
        assert_eq!(f64::NAN.relative_eq(&f64::NAN), ApproxEquality::Scarce);
    }

    #[test]
    fn slices_take_the_worst_grade() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 2.0001, 3.0];
        assert_eq!(a[..].relative_eq(&b[..]), ApproxEquality::Relative);
        assert!(!approx_eq(&a[..], &b[..]));
        assert_eq!(a[..].relative_eq(&a[..2]), ApproxEquality::Scarce);
    }

    #[test]
    fn matrices_compare_logically() {
        backend::set_default_threads(1).unwrap();
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let mut b = a.transposed();
        b.transpose_in_place();
        assert!(approx_eq(&a, &b));
        assert!(a.approx_eq(&(&b + 1e-9), 1e-6));
        assert!(!a.approx_eq(&a.t(), 1e-6));
    }
}
