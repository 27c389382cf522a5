use lpmath::{Matrix, MatrixData, MatrixError, MatrixInit, MatrixOptions};
use proptest::prelude::*;

fn build(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
    Matrix::build(
        MatrixInit::Data {
            data: MatrixData::Flat(data),
            rows: Some(rows),
            cols: Some(cols),
        },
        &MatrixOptions::with_threads(1),
    )
    .unwrap()
}

fn matrix(rows: usize, cols: usize) -> impl Strategy<Value = Matrix> {
    prop::collection::vec(-100.0..100.0f64, rows * cols).prop_map(move |d| build(rows, cols, d))
}

fn any_matrix() -> impl Strategy<Value = Matrix> {
    (1usize..8, 1usize..8).prop_flat_map(|(r, c)| matrix(r, c))
}

fn same_shape_pair() -> impl Strategy<Value = (Matrix, Matrix)> {
    (1usize..8, 1usize..8).prop_flat_map(|(r, c)| (matrix(r, c), matrix(r, c)))
}

proptest! {
    #[test]
    fn shape_of_new_matrix(rows in 1usize..50, cols in 1usize..50) {
        let m = Matrix::build(MatrixInit::Shape { rows, cols }, &MatrixOptions::with_threads(1))
            .unwrap();
        prop_assert_eq!(m.shape(), (rows, cols));
    }

    #[test]
    fn columns_determine_rows(len in 1usize..200, cols in 1usize..20) {
        let result = Matrix::build(
            MatrixInit::Data {
                data: MatrixData::Flat(vec![0.0; len]),
                rows: None,
                cols: Some(cols),
            },
            &MatrixOptions::with_threads(1),
        );
        if len % cols == 0 {
            prop_assert_eq!(result.unwrap().shape(), (len / cols, cols));
        } else {
            prop_assert!(matches!(result, Err(MatrixError::Shape(_))));
        }
    }

    #[test]
    fn add_then_sub_round_trips((a, b) in same_shape_pair()) {
        let back = &(&a + &b) - &b;
        prop_assert!(back.approx_eq(&a, 1e-9));
    }

    #[test]
    fn transposes_are_involutive_and_agree(a in any_matrix()) {
        prop_assert_eq!(a.t().t(), a.clone());
        prop_assert_eq!(a.transposed().transposed(), a.clone());
        prop_assert_eq!(a.t(), a.transposed());
    }

    #[test]
    fn product_is_associative(
        (a, b, c) in (1usize..6, 1usize..6, 1usize..6, 1usize..6)
            .prop_flat_map(|(m, k, n, p)| (matrix(m, k), matrix(k, n), matrix(n, p)))
    ) {
        let left = a.dot(&b).unwrap().dot(&c).unwrap();
        let right = a.dot(&b.dot(&c).unwrap()).unwrap();
        let scale = 1.0 + left.iter().map(f64::abs).fold(0.0, f64::max);
        prop_assert!(left.approx_eq(&right, 1e-6 * scale));
    }

    #[test]
    fn clones_are_independent(a in any_matrix(), v in -10.0..10.0f64) {
        let before = a.to_vec();
        let mut b = a.clone();
        b.fill(v);
        prop_assert!(b.iter().all(|x| x == v));
        prop_assert_eq!(a.to_vec(), before);
    }
}
