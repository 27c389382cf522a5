//! Training metrics recorded by [`Network`](crate::Network).

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use crate::error::{MatrixError, Result};

/// A metric a network can record while training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    /// `mean(target - output)^2` of a backpropagation step.
    Loss,
}

impl Metric {
    /// Every metric, in declaration order.
    pub const ALL: [Self; 1] = [Self::Loss];

    /// Identifier accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Loss => "loss",
        }
    }
}

impl FromStr for Metric {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| MatrixError::lookup(format!("metric '{s}' does not exist")))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One recorded series and how often it samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    interval: usize,
    values: Vec<f64>,
}

impl Series {
    /// Steps between recorded samples.
    #[must_use]
    pub const fn interval(&self) -> usize {
        self.interval
    }

    /// Recorded samples, oldest first.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `(step, value)` pairs, where sample `i` was taken at step `i * interval`.
    #[must_use]
    pub fn indexed(&self) -> Vec<(usize, f64)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| (i * self.interval, v))
            .collect()
    }
}

/// The metrics enabled on a network.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricLog {
    series: BTreeMap<Metric, Series>,
}

impl MetricLog {
    /// Starts (or re-times) recording `metric` every `interval` steps.
    ///
    /// Samples already recorded are kept.
    ///
    /// # Errors
    /// [`MatrixError::Type`] if `interval` is zero.
    pub fn enable(&mut self, metric: Metric, interval: usize) -> Result<()> {
        if interval == 0 {
            return Err(MatrixError::type_error(
                "metric logging interval must be >= 1",
            ));
        }
        self.series.entry(metric).or_default().interval = interval;
        Ok(())
    }

    /// Whether `metric` should be sampled at `step`.
    #[must_use]
    pub fn due(&self, metric: Metric, step: usize) -> bool {
        self.series
            .get(&metric)
            .is_some_and(|s| step % s.interval == 0)
    }

    /// Appends a sample; ignored when `metric` is not enabled.
    pub fn record(&mut self, metric: Metric, value: f64) {
        if let Some(series) = self.series.get_mut(&metric) {
            series.values.push(value);
        }
    }

    /// The series for `metric`.
    ///
    /// # Errors
    /// [`MatrixError::Lookup`] if it is not being logged.
    pub fn series(&self, metric: Metric) -> Result<&Series> {
        self.series
            .get(&metric)
            .ok_or_else(|| MatrixError::lookup(format!("metric '{metric}' is not being logged")))
    }
}
