use std::fs;

use lpmath::calibrate::{
    CalibrationConfig, CalibrationSource, Calibrator, ThreadConfig, RECORD_FILE,
};

fn quick(dir: &std::path::Path) -> CalibrationConfig {
    CalibrationConfig {
        benchmark_size: 64,
        iterations: 3,
        persist: true,
        cache_dir: Some(dir.to_path_buf()),
        override_threads: None,
    }
}

#[test]
fn test_benchmark_stays_within_core_count() {
    let dir = tempfile::tempdir().unwrap();
    let calibration = Calibrator::new(quick(dir.path())).run();

    assert_eq!(calibration.source, CalibrationSource::Benchmarked);
    let ThreadConfig { core_count, optimal_threads } = calibration.config;
    assert_eq!(core_count, Calibrator::core_count());
    assert!((1..=core_count).contains(&optimal_threads));
}

#[test]
fn test_second_run_reuses_persisted_record() {
    let dir = tempfile::tempdir().unwrap();
    let first = Calibrator::new(quick(dir.path())).run();
    assert!(dir.path().join(RECORD_FILE).exists());

    let second = Calibrator::new(quick(dir.path())).run();
    assert_eq!(second.source, CalibrationSource::Persisted);
    assert_eq!(second.config, first.config);
}

#[test]
fn test_persisted_record_wins_over_benchmark() {
    let dir = tempfile::tempdir().unwrap();
    let cores = Calibrator::core_count();
    let record = ThreadConfig { core_count: cores, optimal_threads: 1 };
    fs::write(dir.path().join(RECORD_FILE), serde_json::to_string(&record).unwrap()).unwrap();

    let calibration = Calibrator::new(quick(dir.path())).run();
    assert_eq!(calibration.source, CalibrationSource::Persisted);
    assert_eq!(calibration.config, record);
}

#[test]
fn test_invalid_records_are_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    let cores = Calibrator::core_count();
    let path = dir.path().join(RECORD_FILE);

    for contents in [
        "not json".to_owned(),
        serde_json::to_string(&ThreadConfig { core_count: cores, optimal_threads: cores + 1 })
            .unwrap(),
        serde_json::to_string(&ThreadConfig { core_count: cores + 1, optimal_threads: 1 })
            .unwrap(),
    ] {
        fs::write(&path, contents).unwrap();
        let calibration = Calibrator::new(quick(dir.path())).run();
        assert_eq!(calibration.source, CalibrationSource::Benchmarked);

        let stored: ThreadConfig =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, calibration.config);
    }
}

#[test]
fn test_unwritable_cache_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    fs::write(&blocker, b"").unwrap();

    // a regular file where the cache directory should be
    let calibration = Calibrator::new(quick(&blocker.join("nested"))).run();
    assert_eq!(calibration.source, CalibrationSource::Benchmarked);
}

#[test]
fn test_persistence_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config = CalibrationConfig { persist: false, ..quick(dir.path()) };
    let _ = Calibrator::new(config).run();
    assert!(!dir.path().join(RECORD_FILE).exists());
}
