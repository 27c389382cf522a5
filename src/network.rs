//! Fully connected feed-forward networks trained by backpropagation.
//!
//! # Model
//!
//! A network with widths `[n0, n1, ..., nk]` owns, for each transition `i`,
//! a weight matrix `W_i: (n_{i+1} x n_i)`, a bias column `b_i: (n_{i+1} x 1)`
//! and an [`Activation`]. Inference is
//!
//! ```text
//! x_{i+1} = f_i(W_i x_i + b_i)
//! ```
//!
//! Training is plain per-sample gradient descent on `target - output`:
//! for each layer, last to first, the gradient `f_i'(x_{i+1}) ⊙ e_i · lr`
//! updates `W_i += gradient · x_iᵀ` and `b_i += gradient`, and the error is
//! carried backwards with the weights as they were before the update,
//! `e_{i-1} = W_iᵀ e_i`.
//!
//! # Example
//!
//! ```rust
//! use lpmath::{Activation, Network, NetworkConfig};
//!
//! let mut net = Network::new(
//!     NetworkConfig::new([2, 3, 1])
//!         .with_activations(vec![Activation::Sigmoid; 2])
//!         .with_threads(1)
//!         .with_seed(7),
//! )?;
//!
//! net.log("loss", 10)?;
//! net.backpropagate(vec![0.0, 1.0], vec![1.0])?;
//!
//! let out = net.forward_pass(vec![0.0, 1.0])?;
//! assert_eq!(out.shape(), (1, 1));
//! assert_eq!(net.metrics("loss")?.len(), 1);
//! # Ok::<(), lpmath::MatrixError>(())
//! ```

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::activation::Activation;
use crate::backend;
use crate::error::{MatrixError, Result};
use crate::matrix::{Matrix, MatrixInit, MatrixOptions};
use crate::metrics::{Metric, MetricLog};
use crate::modelio::{self, ModelIoError};

/// Default learning rate.
pub const DEFAULT_LEARNING_RATE: f64 = 0.025;

/// Range initial weights and biases are drawn from.
pub const INIT_RANGE: (f64, f64) = (-1.0, 1.0);

/// Construction parameters for a [`Network`].
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Width of every layer, input first; at least two entries.
    pub layers: Vec<usize>,
    /// Gradient step size; finite and positive.
    pub learning_rate: f64,
    /// One activation per transition; `None` means relu everywhere.
    pub activations: Option<Vec<Activation>>,
    /// Threads for every matrix the network owns; `None` takes the default.
    pub threads: Option<usize>,
    /// Seed for weight initialization and sample selection.
    pub seed: Option<u64>,
}

impl NetworkConfig {
    /// Defaults for the given layer widths.
    #[must_use]
    pub fn new(layers: impl Into<Vec<usize>>) -> Self {
        Self {
            layers: layers.into(),
            learning_rate: DEFAULT_LEARNING_RATE,
            activations: None,
            threads: None,
            seed: None,
        }
    }

    /// Sets the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets one activation per transition.
    #[must_use]
    pub fn with_activations(mut self, activations: Vec<Activation>) -> Self {
        self.activations = Some(activations);
        self
    }

    /// Sets the thread count.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Makes initialization and sampling reproducible.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Options for [`Network::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitConfig {
    /// Backpropagation steps, each on one randomly chosen sample.
    pub epochs: usize,
    /// Emit `info` progress events roughly every tenth of the run.
    pub progress: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 500,
            progress: false,
        }
    }
}

/// Anything accepted as one network input or target.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// A single value; only valid for width-1 layers.
    Scalar(f64),
    /// A sequence of exactly the layer's width.
    Values(Vec<f64>),
    /// A column vector, or a row vector that is transposed.
    Matrix(Matrix),
}

impl From<f64> for Sample {
    fn from(x: f64) -> Self {
        Self::Scalar(x)
    }
}

impl From<Vec<f64>> for Sample {
    fn from(values: Vec<f64>) -> Self {
        Self::Values(values)
    }
}

impl From<&[f64]> for Sample {
    fn from(values: &[f64]) -> Self {
        Self::Values(values.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Sample {
    fn from(values: [f64; N]) -> Self {
        Self::Values(values.to_vec())
    }
}

impl From<Matrix> for Sample {
    fn from(m: Matrix) -> Self {
        Self::Matrix(m)
    }
}

impl From<&Matrix> for Sample {
    fn from(m: &Matrix) -> Self {
        Self::Matrix(m.clone())
    }
}

/// A trainable stack of fully connected layers.
#[derive(Debug, Clone)]
pub struct Network {
    node_counts: Vec<usize>,
    layers: Vec<Matrix>,
    biases: Vec<Matrix>,
    activations: Vec<Activation>,
    learning_rate: f64,
    threads: usize,
    metrics: MetricLog,
    backprop_index: usize,
    rng: StdRng,
}

impl Network {
    /// Builds a network with weights and biases drawn from [`INIT_RANGE`].
    ///
    /// # Errors
    /// - [`MatrixError::Type`] for fewer than two layers, a learning rate that
    ///   is not finite and positive, an activation count that does not match
    ///   the transitions, or zero threads
    /// - [`MatrixError::Shape`] for a zero layer width
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let NetworkConfig {
            layers: node_counts,
            learning_rate,
            activations,
            threads,
            seed,
        } = config;

        if node_counts.len() < 2 {
            return Err(MatrixError::type_error(format!(
                "a network needs at least two layers, got {}",
                node_counts.len()
            )));
        }
        if let Some(i) = node_counts.iter().position(|&n| n == 0) {
            return Err(MatrixError::shape(format!("layer {i} has zero width")));
        }
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(MatrixError::type_error(format!(
                "learning rate must be finite and positive, got {learning_rate}"
            )));
        }
        let transitions = node_counts.len() - 1;
        let activations = activations.unwrap_or_else(|| vec![Activation::default(); transitions]);
        if activations.len() != transitions {
            return Err(MatrixError::type_error(format!(
                "expected {transitions} activations, got {}",
                activations.len()
            )));
        }
        if threads == Some(0) {
            return Err(MatrixError::type_error(
                "invalid number of threads, must be >= 1",
            ));
        }
        let threads = threads.unwrap_or_else(backend::default_threads);

        let mut rng =
            seed.map_or_else(|| StdRng::from_rng(&mut rand::rng()), StdRng::seed_from_u64);
        let options = MatrixOptions::with_threads(threads);
        let (min, max) = INIT_RANGE;

        let mut layers = Vec::with_capacity(transitions);
        let mut biases = Vec::with_capacity(transitions);
        for pair in node_counts.windows(2) {
            let (inputs, outputs) = (pair[0], pair[1]);

            let mut weights =
                Matrix::build(MatrixInit::Shape { rows: outputs, cols: inputs }, &options)?;
            weights.fill_random_with(&mut rng, min, max)?;
            let mut bias = Matrix::build(MatrixInit::Shape { rows: outputs, cols: 1 }, &options)?;
            bias.fill_random_with(&mut rng, min, max)?;

            layers.push(weights);
            biases.push(bias);
        }

        debug!(shape = ?node_counts, threads, learning_rate, "built network");

        Ok(Self {
            node_counts,
            layers,
            biases,
            activations,
            learning_rate,
            threads,
            metrics: MetricLog::default(),
            backprop_index: 0,
            rng,
        })
    }

    /// Layer widths, input first.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.node_counts
    }

    /// Weight matrices, one per transition.
    #[must_use]
    pub fn layers(&self) -> &[Matrix] {
        &self.layers
    }

    /// Bias columns, one per transition.
    #[must_use]
    pub fn biases(&self) -> &[Matrix] {
        &self.biases
    }

    /// Activations, one per transition.
    #[must_use]
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    /// Gradient step size.
    #[must_use]
    pub const fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Threads used by every matrix the network owns.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Backpropagation steps taken so far.
    #[must_use]
    pub const fn backprop_index(&self) -> usize {
        self.backprop_index
    }

    /// Coerces `sample` into a column vector for the layer of `width`.
    fn coerce(&self, sample: Sample, width: usize) -> Result<Matrix> {
        let options = MatrixOptions::with_threads(self.threads);
        match sample {
            Sample::Scalar(x) if width == 1 => Matrix::build(
                MatrixInit::Data {
                    data: vec![x].into(),
                    rows: Some(1),
                    cols: Some(1),
                },
                &options,
            ),
            Sample::Scalar(_) => Err(MatrixError::shape(format!(
                "only one value was passed, though the layer requires {width}"
            ))),
            Sample::Values(values) if values.len() == width => Matrix::build(
                MatrixInit::Data {
                    data: values.into(),
                    rows: Some(width),
                    cols: Some(1),
                },
                &options,
            ),
            Sample::Values(values) => Err(MatrixError::shape(format!(
                "the layer requires {width} values, received {}",
                values.len()
            ))),
            Sample::Matrix(m) => match m.shape() {
                (r, 1) if r == width => m.with_threads(self.threads),
                (1, c) if c == width => m.t().with_threads(self.threads),
                (r, c) => Err(MatrixError::shape(format!(
                    "the layer requires {width} values, received a {r}x{c} matrix"
                ))),
            },
        }
    }

    fn input_width(&self) -> usize {
        self.node_counts[0]
    }

    fn output_width(&self) -> usize {
        self.node_counts[self.node_counts.len() - 1]
    }

    /// Post-activation output of every layer for a coerced input.
    fn feed(&self, input: &Matrix) -> Result<Vec<Matrix>> {
        let mut outputs: Vec<Matrix> = Vec::with_capacity(self.layers.len());
        for ((weights, bias), &activation) in
            self.layers.iter().zip(&self.biases).zip(&self.activations)
        {
            let current = outputs.last().unwrap_or(input);
            let mut next = weights.dot(current)?;
            next.try_add_assign(bias)?;
            next.map(activation);
            outputs.push(next);
        }
        Ok(outputs)
    }

    /// Runs inference, returning an `(output width x 1)` column.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if `input` cannot be coerced to the input width.
    pub fn forward_pass(&self, input: impl Into<Sample>) -> Result<Matrix> {
        let input = self.coerce(input.into(), self.input_width())?;
        let mut outputs = self.feed(&input)?;
        outputs
            .pop()
            .ok_or_else(|| MatrixError::shape("network has no layers"))
    }

    /// One gradient-descent step on a single `(input, target)` pair.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] if either argument does not fit its layer.
    pub fn backpropagate(
        &mut self,
        input: impl Into<Sample>,
        target: impl Into<Sample>,
    ) -> Result<()> {
        let input = self.coerce(input.into(), self.input_width())?;
        let target = self.coerce(target.into(), self.output_width())?;
        self.train_step(&input, &target)
    }

    fn train_step(&mut self, input: &Matrix, target: &Matrix) -> Result<()> {
        let outputs = self.feed(input)?;
        let Some(output) = outputs.last() else {
            return Ok(());
        };

        let mut error = target.try_sub(output)?;
        if self.metrics.due(Metric::Loss, self.backprop_index) {
            let mean = error.mean();
            self.metrics.record(Metric::Loss, mean * mean);
        }
        self.backprop_index += 1;

        for i in (0..self.layers.len()).rev() {
            let mut gradient = outputs[i].mapped_derivative(self.activations[i]);
            gradient.try_mul_assign(&error)?;
            gradient.try_mul_assign(self.learning_rate)?;

            let previous = if i > 0 { &outputs[i - 1] } else { input };
            let deltas = gradient.dot(&previous.t())?;

            // propagate through the weights before they change
            let carried = if i > 0 {
                Some(self.layers[i].t().dot(&error)?)
            } else {
                None
            };

            self.layers[i].try_add_assign(&deltas)?;
            self.biases[i].try_add_assign(&gradient)?;

            if let Some(carried) = carried {
                error = carried;
            }
        }
        Ok(())
    }

    /// Pairs rows of training data into `(input, target)` columns.
    ///
    /// With `targets`, row `i` of `inputs` pairs with row `i` of `targets`.
    /// Without, every row holds the input values followed by the target
    /// values.
    ///
    /// # Errors
    /// [`MatrixError::Shape`] for no rows, mismatched row counts, or rows of
    /// the wrong width.
    pub fn parse_data(
        &self,
        inputs: &[Vec<f64>],
        targets: Option<&[Vec<f64>]>,
    ) -> Result<Vec<(Matrix, Matrix)>> {
        if inputs.is_empty() {
            return Err(MatrixError::shape("no training samples were given"));
        }
        let (n_in, n_out) = (self.input_width(), self.output_width());

        match targets {
            Some(targets) => {
                if inputs.len() != targets.len() {
                    return Err(MatrixError::shape(format!(
                        "input and target counts must be equal, got {} and {}",
                        inputs.len(),
                        targets.len()
                    )));
                }
                inputs
                    .iter()
                    .zip(targets)
                    .map(|(x, y)| {
                        Ok((
                            self.coerce(x.as_slice().into(), n_in)?,
                            self.coerce(y.as_slice().into(), n_out)?,
                        ))
                    })
                    .collect()
            }
            None => inputs
                .iter()
                .map(|row| {
                    if row.len() != n_in + n_out {
                        return Err(MatrixError::shape(format!(
                            "expected rows of {} values, got {}",
                            n_in + n_out,
                            row.len()
                        )));
                    }
                    let (x, y) = row.split_at(n_in);
                    Ok((self.coerce(x.into(), n_in)?, self.coerce(y.into(), n_out)?))
                })
                .collect(),
        }
    }

    /// Trains for `config.epochs` steps, each on a uniformly drawn sample.
    ///
    /// # Errors
    /// As [`Network::parse_data`]; no step runs if the data is invalid.
    pub fn fit(
        &mut self,
        inputs: &[Vec<f64>],
        targets: Option<&[Vec<f64>]>,
        config: &FitConfig,
    ) -> Result<()> {
        let data = self.parse_data(inputs, targets)?;
        let report_every = (config.epochs / 10).max(1);

        for epoch in 0..config.epochs {
            let (input, target) = &data[self.rng.random_range(0..data.len())];
            self.train_step(input, target)?;

            if config.progress && (epoch + 1) % report_every == 0 {
                let loss = self
                    .metrics
                    .series(Metric::Loss)
                    .ok()
                    .and_then(|s| s.values().last().copied());
                info!(epoch = epoch + 1, epochs = config.epochs, ?loss, "training");
            }
        }
        Ok(())
    }

    /// Starts recording `metric` every `interval` backpropagation steps.
    ///
    /// # Errors
    /// - [`MatrixError::Lookup`] for an unknown metric name
    /// - [`MatrixError::Type`] for a zero interval
    pub fn log(&mut self, metric: &str, interval: usize) -> Result<()> {
        self.metrics.enable(metric.parse()?, interval)
    }

    /// Recorded values of `metric`.
    ///
    /// # Errors
    /// [`MatrixError::Lookup`] if the metric does not exist or is not logged.
    pub fn metrics(&self, metric: &str) -> Result<&[f64]> {
        Ok(self.metrics.series(metric.parse()?)?.values())
    }

    /// `(step, value)` pairs of `metric`.
    ///
    /// # Errors
    /// [`MatrixError::Lookup`] if the metric does not exist or is not logged.
    pub fn metric_data(&self, metric: &str) -> Result<Vec<(usize, f64)>> {
        Ok(self.metrics.series(metric.parse()?)?.indexed())
    }

    /// Writes weights then biases to an `.lpm` file.
    ///
    /// # Errors
    /// Any [`ModelIoError`] from writing the file.
    pub fn save_weights(&self, path: impl AsRef<Path>) -> core::result::Result<(), ModelIoError> {
        modelio::save_matrices(path, self.layers.iter().chain(&self.biases))
    }

    /// Replaces weights and biases with those in an `.lpm` file.
    ///
    /// The network is unchanged if the file does not match its shape.
    ///
    /// # Errors
    /// [`ModelIoError::ShapeMismatch`] when the file holds a different
    /// architecture, or any error from reading it.
    pub fn load_weights(
        &mut self,
        path: impl AsRef<Path>,
    ) -> core::result::Result<(), ModelIoError> {
        let mut loaded =
            modelio::load_matrices_with(path, &MatrixOptions::with_threads(self.threads))?;

        let expected: Vec<(usize, usize)> = self
            .layers
            .iter()
            .chain(&self.biases)
            .map(Matrix::shape)
            .collect();
        let found: Vec<(usize, usize)> = loaded.iter().map(Matrix::shape).collect();
        if expected != found {
            return Err(ModelIoError::ShapeMismatch { expected, found });
        }

        self.biases = loaded.split_off(self.layers.len());
        self.layers = loaded;
        Ok(())
    }
}
