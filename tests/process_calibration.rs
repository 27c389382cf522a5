use lpmath::calibrate::{self, CalibrationConfig, CalibrationSource};
use lpmath::{backend, Matrix};

// Own test binary: the process-wide calibration can only be set once.
#[test]
fn test_init_with_fixes_the_process_calibration() {
    let first = calibrate::init_with(CalibrationConfig {
        override_threads: Some(1),
        persist: false,
        ..CalibrationConfig::default()
    });
    assert_eq!(first.source, CalibrationSource::Override);
    assert_eq!(first.config.optimal_threads, 1);

    let again = calibrate::calibration();
    assert!(std::ptr::eq(first, again));
    assert_eq!(again.source, CalibrationSource::Override);

    let ignored = calibrate::init_with(CalibrationConfig {
        override_threads: Some(2),
        persist: false,
        ..CalibrationConfig::default()
    });
    assert!(std::ptr::eq(first, ignored));
    assert_eq!(calibrate::thread_config(), first.config);

    // without an override, new matrices take the calibrated count
    backend::clear_default_threads();
    assert_eq!(backend::default_threads(), 1);
    assert_eq!(Matrix::new(2, 2).unwrap().threads(), 1);

    backend::set_default_threads(3).unwrap();
    assert_eq!(Matrix::new(2, 2).unwrap().threads(), 3);
    backend::clear_default_threads();
    assert_eq!(Matrix::new(2, 2).unwrap().threads(), 1);
}
