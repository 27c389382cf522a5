//! Thread-count calibration.
//!
//! # Procedure
//!
//! The first matrix built without an explicit thread count triggers a one-time
//! calibration:
//!
//! 1. Detect the logical core count (4 when detection fails).
//! 2. Look for a persisted record for this core count and use it when valid.
//! 3. Otherwise fill a `benchmark_size x benchmark_size` matrix with ascending
//!    values and time `iterations` self-additions for every thread count in
//!    `1..=cores`. The fastest total wins; ties keep the smaller count.
//! 4. Persist the winner for the next process.
//!
//! Failures never surface as errors: unreadable or invalid records are
//! recomputed, and a record that cannot be written is only logged.
//!
//! # Configuration
//!
//! [`CalibrationConfig::from_env`] reads:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `LPMATH_THREADS` | use this count, skip benchmarking and persistence |
//! | `LPMATH_CACHE_DIR` | directory holding `threads.json` |
//! | `LPMATH_CALIBRATION_ITERATIONS` | additions timed per candidate |
//!
//! The default directory is `<user cache dir>/lpmath`.
//!
//! # Example
//!
//! ```rust,no_run
//! use lpmath::calibrate::{CalibrationConfig, Calibrator};
//!
//! let calibration = Calibrator::new(CalibrationConfig {
//!     benchmark_size: 200,
//!     iterations: 20,
//!     ..CalibrationConfig::default()
//! })
//! .run();
//! println!("{} threads ({:?})", calibration.config.optimal_threads, calibration.source);
//! ```

use std::fs;
use std::hint::black_box;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use briny::prelude::*;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::matrix::{Matrix, MatrixInit, MatrixOptions};

/// Overrides calibration with a fixed thread count.
pub const THREADS_ENV: &str = "LPMATH_THREADS";

/// Directory holding the persisted record.
pub const CACHE_DIR_ENV: &str = "LPMATH_CACHE_DIR";

/// Iterations timed per candidate thread count.
pub const ITERATIONS_ENV: &str = "LPMATH_CALIBRATION_ITERATIONS";

/// File name of the persisted record.
pub const RECORD_FILE: &str = "threads.json";

/// Core count assumed when detection fails.
pub const FALLBACK_CORES: usize = 4;

/// Parameters of a calibration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationConfig {
    /// Side length of the square benchmark matrix.
    pub benchmark_size: usize,
    /// Self-additions timed per candidate.
    pub iterations: usize,
    /// Whether to read and write the persisted record.
    pub persist: bool,
    /// Where the record lives; `None` uses the user cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Fixed thread count that bypasses calibration entirely.
    pub override_threads: Option<usize>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            benchmark_size: 1000,
            iterations: 500,
            persist: true,
            cache_dir: None,
            override_threads: None,
        }
    }
}

impl CalibrationConfig {
    /// Defaults adjusted by the `LPMATH_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults adjusted by whatever `lookup` returns for each variable.
    ///
    /// Unparsable values are logged and ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(THREADS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.override_threads = Some(n),
                _ => warn!(value = %raw, "ignoring LPMATH_THREADS, expected a positive integer"),
            }
        }
        if let Some(raw) = lookup(ITERATIONS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.iterations = n,
                Err(_) => warn!(
                    value = %raw,
                    "ignoring LPMATH_CALIBRATION_ITERATIONS, expected an integer"
                ),
            }
        }
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
            config.cache_dir = Some(PathBuf::from(dir));
        }

        config
    }

    /// Path of the persisted record, if a cache directory can be found.
    #[must_use]
    pub fn record_path(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("lpmath")))
            .map(|d| d.join(RECORD_FILE))
    }
}

/// Result of a calibration: the core count and the chosen thread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadConfig {
    /// Logical cores detected when the record was made.
    pub core_count: usize,
    /// Thread count new matrices receive by default.
    pub optimal_threads: usize,
}

impl Validate for ThreadConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.core_count == 0
            || self.optimal_threads == 0
            || self.optimal_threads > self.core_count
        {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Where a [`ThreadConfig`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationSource {
    /// Measured in this process.
    Benchmarked,
    /// Loaded from the persisted record.
    Persisted,
    /// Taken from [`CalibrationConfig::override_threads`].
    Override,
}

/// A thread configuration and its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// The configuration itself.
    pub config: ThreadConfig,
    /// How it was obtained.
    pub source: CalibrationSource,
}

/// Runs the calibration procedure for one [`CalibrationConfig`].
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    /// A calibrator for `config`.
    #[must_use]
    pub const fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Logical cores, or [`FALLBACK_CORES`] when they cannot be detected.
    #[must_use]
    pub fn core_count() -> usize {
        thread::available_parallelism().map_or_else(
            |err| {
                warn!(%err, fallback = FALLBACK_CORES, "could not detect core count");
                FALLBACK_CORES
            },
            |n| n.get(),
        )
    }

    /// Produces a thread configuration; never fails.
    #[must_use]
    pub fn run(&self) -> Calibration {
        let cores = Self::core_count();

        if let Some(requested) = self.config.override_threads {
            let threads = requested.clamp(1, cores);
            if threads != requested {
                warn!(requested, cores, "thread override exceeds core count, clamping");
            }
            let calibration = Calibration {
                config: ThreadConfig {
                    core_count: cores,
                    optimal_threads: threads,
                },
                source: CalibrationSource::Override,
            };
            info!(threads, "using thread count from configuration");
            return calibration;
        }

        let path = self.config.persist.then(|| self.config.record_path()).flatten();

        if let Some(record) = path.as_deref().and_then(|p| load_record(p, cores)) {
            info!(threads = record.optimal_threads, cores, "loaded persisted thread calibration");
            return Calibration {
                config: record,
                source: CalibrationSource::Persisted,
            };
        }

        let record = self.benchmark(cores);
        info!(threads = record.optimal_threads, cores, "calibrated thread count");
        if let Some(path) = path.as_deref() {
            store_record(path, &record);
        }
        Calibration {
            config: record,
            source: CalibrationSource::Benchmarked,
        }
    }

    /// Times every candidate thread count and keeps the fastest.
    #[must_use]
    pub fn benchmark(&self, cores: usize) -> ThreadConfig {
        let size = self.config.benchmark_size;
        let matrix = Matrix::build(
            MatrixInit::Shape { rows: size, cols: size },
            &MatrixOptions::with_threads(1),
        );
        let mut matrix = match matrix {
            Ok(m) => m,
            Err(err) => {
                warn!(%err, size, "cannot build benchmark matrix, using every core");
                return ThreadConfig {
                    core_count: cores,
                    optimal_threads: cores,
                };
            }
        };
        matrix.fill_ascending();

        let mut best = (1, Duration::MAX);
        for threads in 1..=cores {
            if matrix.set_threads(threads).is_err() {
                continue;
            }
            let start = Instant::now();
            for _ in 0..self.config.iterations {
                let _ = black_box(&matrix + &matrix);
            }
            let elapsed = start.elapsed();
            debug!(threads, ?elapsed, "calibration candidate");
            if elapsed < best.1 {
                best = (threads, elapsed);
            }
        }

        ThreadConfig {
            core_count: cores,
            optimal_threads: best.0,
        }
    }
}

fn load_record(path: &Path, cores: usize) -> Option<ThreadConfig> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no persisted thread calibration");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "cannot read thread calibration");
            return None;
        }
    };

    let record: ThreadConfig = match serde_json::from_str(&text) {
        Ok(record) => record,
        Err(err) => {
            warn!(path = %path.display(), %err, "malformed thread calibration, recalibrating");
            return None;
        }
    };

    let Ok(record) = TrustedData::new(record) else {
        warn!(path = %path.display(), "invalid thread calibration, recalibrating");
        return None;
    };
    let record = record.into_inner();

    if record.core_count == cores {
        Some(record)
    } else {
        debug!(recorded = record.core_count, cores, "core count changed, recalibrating");
        None
    }
}

fn store_record(path: &Path, record: &ThreadConfig) {
    let result = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| serde_json::to_string_pretty(record).map_err(io::Error::other))
        .and_then(|json| fs::write(path, json));

    match result {
        Ok(()) => debug!(path = %path.display(), "persisted thread calibration"),
        Err(err) => warn!(path = %path.display(), %err, "cannot persist thread calibration"),
    }
}

static CALIBRATION: OnceCell<Calibration> = OnceCell::new();

/// The process-wide calibration, running it from the environment on first use.
pub fn calibration() -> &'static Calibration {
    CALIBRATION.get_or_init(|| Calibrator::new(CalibrationConfig::from_env()).run())
}

/// Calibrates with `config` unless the process is already calibrated.
///
/// Returns whichever calibration is in effect afterwards.
pub fn init_with(config: CalibrationConfig) -> &'static Calibration {
    CALIBRATION.get_or_init(|| Calibrator::new(config).run())
}

/// The process-wide thread configuration.
#[must_use]
pub fn thread_config() -> ThreadConfig {
    calibration().config
}
