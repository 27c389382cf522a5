//! Elementwise activation functions.
//!
//! A dense layer computes `z = W x + b` and then applies an activation
//! elementwise, `y = f(z)`. The network caches `y`, so every derivative here
//! is written in terms of the *output* `y` rather than the input `z`.

use core::fmt;
use core::str::FromStr;

use crate::error::MatrixError;

/// Slope used by [`Activation::LeakyRelu`] for negative inputs.
pub const LEAKY_RELU_SLOPE: f64 = 0.2;

/// A unary function paired with its derivative.
#[derive(Clone, Copy)]
pub struct ActivationFns {
    /// `y = f(x)`.
    pub forward: fn(f64) -> f64,
    /// `f'(x)` expressed through the cached output `y`.
    pub derivative: fn(f64) -> f64,
}

impl fmt::Debug for ActivationFns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationFns").finish_non_exhaustive()
    }
}

/// Activation applied after each layer's linear transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Activation {
    /// `1 / (1 + e^-x)`.
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
    /// `max(0, x)`.
    #[default]
    Relu,
    /// `x` for positive inputs, `0.2 x` otherwise.
    LeakyRelu,
}

impl Activation {
    /// Every supported activation, in declaration order.
    pub const ALL: [Self; 4] = [Self::Sigmoid, Self::Tanh, Self::Relu, Self::LeakyRelu];

    /// The forward function and its derivative.
    #[must_use]
    pub const fn functions(self) -> ActivationFns {
        match self {
            Self::Sigmoid => ActivationFns {
                forward: sigmoid,
                derivative: sigmoid_derivative,
            },
            Self::Tanh => ActivationFns {
                forward: f64::tanh,
                derivative: tanh_derivative,
            },
            Self::Relu => ActivationFns {
                forward: relu,
                derivative: relu_derivative,
            },
            Self::LeakyRelu => ActivationFns {
                forward: leaky_relu,
                derivative: leaky_relu_derivative,
            },
        }
    }

    /// Applies the activation to one value.
    #[inline]
    #[must_use]
    pub fn forward(self, x: f64) -> f64 {
        (self.functions().forward)(x)
    }

    /// Derivative at the point whose activated output is `y`.
    #[inline]
    #[must_use]
    pub fn derivative(self, y: f64) -> f64 {
        (self.functions().derivative)(y)
    }

    /// Lowercase identifier accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Relu => "relu",
            Self::LeakyRelu => "leaky_relu",
        }
    }
}

impl FromStr for Activation {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(Self::Sigmoid),
            "tanh" => Ok(Self::Tanh),
            "relu" => Ok(Self::Relu),
            "leaky_relu" | "leakyrelu" | "leaky-relu" => Ok(Self::LeakyRelu),
            _ => Err(MatrixError::type_error(format!(
                "the activation function '{s}' is not implemented"
            ))),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    // stable for large |x|
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[inline]
fn sigmoid_derivative(y: f64) -> f64 {
    y * (1.0 - y)
}

#[inline]
fn tanh_derivative(y: f64) -> f64 {
    1.0 - y * y
}

#[inline]
fn relu(x: f64) -> f64 {
    if x > 0.0 { x } else { 0.0 }
}

#[inline]
fn relu_derivative(y: f64) -> f64 {
    if y > 0.0 { 1.0 } else { 0.0 }
}

#[inline]
fn leaky_relu(x: f64) -> f64 {
    if x > 0.0 { x } else { x * LEAKY_RELU_SLOPE }
}

#[inline]
fn leaky_relu_derivative(y: f64) -> f64 {
    if y > 0.0 { 1.0 } else { LEAKY_RELU_SLOPE }
}
