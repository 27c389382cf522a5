use lpmath::{
    backend, matrix, Activation, Dtype, Matrix, MatrixData, MatrixError, MatrixInit, MatrixOptions,
};

fn init() {
    backend::set_default_threads(1).unwrap();
}

fn with(init: MatrixInit, threads: usize) -> Result<Matrix, MatrixError> {
    Matrix::build(init, &MatrixOptions::with_threads(threads))
}

#[test]
fn test_matrix_new_is_zeroed() {
    init();
    let m = Matrix::new(3, 4).unwrap();
    assert_eq!(m.shape(), (3, 4));
    assert_eq!(m.sum(), 0.0);
    assert_eq!(m.dtype(), Dtype::Float64);
    assert!(m.is_contiguous());
}

#[test]
fn test_zero_dimensions_are_shape_errors() {
    init();
    assert!(matches!(Matrix::new(0, 3), Err(MatrixError::Shape(_))));
    assert!(matches!(Matrix::from_vec(vec![]), Err(MatrixError::Shape(_))));
    assert!(matches!(Matrix::from_rows(vec![]), Err(MatrixError::Shape(_))));
    assert!(matches!(Matrix::from_rows(vec![vec![]]), Err(MatrixError::Shape(_))));
}

#[test]
fn test_ragged_rows_are_rejected() {
    init();
    let err = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
    assert!(matches!(err, MatrixError::Shape(_)));
}

#[test]
fn test_flat_data_with_one_dimension() {
    init();
    let m = with(
        MatrixInit::Data {
            data: MatrixData::Flat((0..12).map(f64::from).collect()),
            rows: None,
            cols: Some(4),
        },
        1,
    )
    .unwrap();
    assert_eq!(m.shape(), (3, 4));
    assert_eq!(m.get(2, 3).unwrap(), 11.0);

    let err = with(
        MatrixInit::Data {
            data: MatrixData::Flat(vec![1.0; 10]),
            rows: Some(4),
            cols: None,
        },
        1,
    )
    .unwrap_err();
    assert!(matches!(err, MatrixError::Shape(_)));
}

#[test]
fn test_nested_data_with_explicit_shape_is_reinterpreted() {
    init();
    let m = with(
        MatrixInit::Data {
            data: vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]].into(),
            rows: Some(3),
            cols: Some(2),
        },
        1,
    )
    .unwrap();
    assert_eq!(m.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
}

#[test]
fn test_unsupported_dtypes_and_threads() {
    init();
    for dtype in [Dtype::Float32, Dtype::Int64, Dtype::Int32, Dtype::Int16] {
        let err = Matrix::build(
            MatrixInit::Shape { rows: 2, cols: 2 },
            &MatrixOptions { dtype, threads: None },
        )
        .unwrap_err();
        assert!(matches!(err, MatrixError::Unimplemented(_)));
    }

    let err = with(MatrixInit::Shape { rows: 2, cols: 2 }, 0).unwrap_err();
    assert!(matches!(err, MatrixError::Type(_)));

    let mut m = Matrix::new(2, 2).unwrap();
    assert!(matches!(m.set_threads(0), Err(MatrixError::Type(_))));
    m.set_threads(3).unwrap();
    assert_eq!(m.threads(), 3);
}

#[test]
fn test_default_threads_come_from_the_override() {
    init();
    assert_eq!(Matrix::new(1, 1).unwrap().threads(), 1);
    assert_eq!(with(MatrixInit::Shape { rows: 1, cols: 1 }, 6).unwrap().threads(), 6);
}

#[test]
fn test_elementwise_arithmetic() {
    init();
    let a = matrix![[1, 2], [3, 4]].unwrap();
    let b = matrix![[5, 6], [7, 8]].unwrap();

    assert_eq!((&a + &b).to_vec(), vec![6.0, 8.0, 10.0, 12.0]);
    assert_eq!((&b - &a).to_vec(), vec![4.0, 4.0, 4.0, 4.0]);
    assert_eq!((&a * &b).to_vec(), vec![5.0, 12.0, 21.0, 32.0]);
    assert_eq!((&b / &a).to_vec(), vec![5.0, 3.0, 7.0 / 3.0, 2.0]);

    assert_eq!((&a + 1.0).to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
    assert_eq!((&a - 1.0).to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!((&a * 2.0).to_vec(), vec![2.0, 4.0, 6.0, 8.0]);
    assert_eq!((&a / 2.0).to_vec(), vec![0.5, 1.0, 1.5, 2.0]);
}

#[test]
fn test_mismatched_operands_fail_before_computing() {
    init();
    let a = Matrix::new(2, 3).unwrap();
    let b = Matrix::new(3, 2).unwrap();
    for result in [a.try_add(&b), a.try_sub(&b), a.try_mul(&b), a.try_div(&b)] {
        assert!(matches!(result, Err(MatrixError::Shape(_))));
    }
    assert!(matches!(a.dot(&a), Err(MatrixError::Shape(_))));
}

#[test]
fn test_matrix_product() {
    init();
    let a = matrix![[1, 2, 3], [4, 5, 6]].unwrap();
    let b = matrix![[7, 8], [9, 10], [11, 12]].unwrap();
    let c = a.dot(&b).unwrap();
    assert_eq!(c.shape(), (2, 2));
    assert_eq!(c.to_vec(), vec![58.0, 64.0, 139.0, 154.0]);

    let outer = a.t().dot(&a).unwrap();
    assert_eq!(outer.shape(), (3, 3));
    assert_eq!(outer.get(0, 0).unwrap(), 17.0);
}

#[test]
fn test_large_product_is_thread_independent() {
    init();
    let build = |threads| {
        let mut a = with(MatrixInit::Shape { rows: 120, cols: 90 }, threads).unwrap();
        a.fill_ascending();
        let mut b = with(MatrixInit::Shape { rows: 90, cols: 80 }, threads).unwrap();
        b.fill_descending();
        a.dot(&b).unwrap()
    };
    let serial = build(1);
    for threads in [2, 4] {
        assert_eq!(build(threads), serial);
    }
}

#[test]
fn test_transposes_agree() {
    init();
    let a = matrix![[1, 2, 3], [4, 5, 6]].unwrap();

    let fast = a.t();
    let slow = a.transposed();
    assert_eq!(fast, slow);
    assert_eq!(fast.shape(), (3, 2));
    assert!(slow.is_contiguous());
    assert_eq!(a.shape(), (2, 3));

    let mut b = a.clone();
    b.transpose_in_place();
    b.transpose_in_place();
    assert_eq!(b, a);
    assert_eq!(a.t().t(), a);
}

#[test]
fn test_operations_on_strided_operands() {
    init();
    let a = matrix![[1, 2], [3, 4]].unwrap();
    let t = a.t();
    assert_eq!((&t + &a).to_vec(), vec![2.0, 5.0, 5.0, 8.0]);
    assert_eq!((&t * 10.0).to_vec(), vec![10.0, 30.0, 20.0, 40.0]);
    assert_eq!(t.dot(&a).unwrap().to_vec(), vec![10.0, 14.0, 14.0, 20.0]);
}

#[test]
fn test_clone_is_deep() {
    init();
    let a = matrix![[1, 2], [3, 4]].unwrap();
    let mut b = a.copy();
    b.set(0, 0, 100.0).unwrap();
    b[(1, 1)] = -1.0;
    assert_eq!(a.get(0, 0).unwrap(), 1.0);
    assert_eq!(a[(1, 1)], 4.0);
}

#[test]
fn test_indexing_errors() {
    init();
    let mut a = Matrix::new(2, 2).unwrap();
    assert_eq!(
        a.get(2, 0),
        Err(MatrixError::IndexOutOfRange { row: 2, col: 0, rows: 2, cols: 2 })
    );
    assert!(a.set(0, 5, 1.0).is_err());
    assert!(matches!(a.at(&[0, 0, 0]), Err(MatrixError::Unimplemented(_))));
}

#[test]
#[should_panic(expected = "out of range")]
fn test_index_operator_panics_out_of_range() {
    init();
    let a = Matrix::new(2, 2).unwrap();
    let _value: f64 = a[(0, 2)];
}

#[test]
fn test_maps() {
    init();
    let mut a = matrix![[-1, 0, 2]].unwrap();
    let relu = a.mapped(Activation::Relu);
    assert_eq!(relu.to_vec(), vec![0.0, 0.0, 2.0]);
    assert_eq!(a.to_vec(), vec![-1.0, 0.0, 2.0]);

    a.map(Activation::LeakyRelu);
    assert_eq!(a.to_vec(), vec![-0.2, 0.0, 2.0]);

    let s = matrix![[0.5]].unwrap().mapped_derivative(Activation::Sigmoid);
    assert_eq!(s.get(0, 0).unwrap(), 0.25);
}

#[test]
fn test_fills_and_reductions() {
    init();
    let mut m = Matrix::new(2, 3).unwrap();
    m.fill(2.5);
    assert_eq!(m.sum(), 15.0);
    m.fill_ascending();
    assert_eq!(m.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(m.mean(), 2.5);
    m.fill_descending();
    assert_eq!(m.to_vec(), vec![5.0, 4.0, 3.0, 2.0, 1.0, 0.0]);
    m.fill_random_default();
    assert!(m.iter().all(|x| (-1.0..1.0).contains(&x)));
}

#[test]
fn test_reshape() {
    init();
    let mut m = matrix![1, 2, 3, 4, 5, 6].unwrap();
    m.reshape(3, 2).unwrap();
    assert_eq!(m.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
    assert!(matches!(m.reshape(4, 4), Err(MatrixError::Shape(_))));
}

#[test]
fn test_parse_and_display() {
    init();
    let m: Matrix = "[[1.5, -2], [3, 4]]".parse().unwrap();
    assert_eq!(m, matrix![[1.5, -2.0], [3.0, 4.0]].unwrap());
    assert_eq!(m.to_string(), "[[1.5, -2.0],\n [3.0,  4.0]]");
}
