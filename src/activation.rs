//! Activation registry.
//!
//! A layer computes a pre-activation value `z = W x + b` and then applies an activation
//! element-wise: `y = activation(z)`.
//!
//! Each activation is paired with its derivative. The derivatives do not all take the same
//! argument: sigmoid's derivative is cheapest in terms of its own output `y`, while the
//! piecewise-linear activations are differentiated at `z`. [`Activation::derivative_input`]
//! tells the caller which of the two cached values to hand to [`Activation::derivative`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Negative-side slope of [`Activation::LeakyReLU`].
pub const LEAKY_RELU_SLOPE: f32 = 0.01;

/// Element-wise activation function.
///
/// `Identity` doubles as the "unbound" state: the layer's raw linear output is passed
/// through unchanged, which is what a loss consuming raw outputs expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    #[serde(alias = "none")]
    Identity,
    #[serde(rename = "relu")]
    ReLU,
    #[serde(rename = "leaky_relu")]
    LeakyReLU,
    Sigmoid,
}

/// Which cached quantity an activation derivative must be evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeInput {
    /// The linear sum `z`, before the activation was applied.
    PreActivation,
    /// The activation output `y = f(z)`.
    PostActivation,
}

impl Activation {
    pub const ALL: [Activation; 4] = [
        Activation::Identity,
        Activation::ReLU,
        Activation::LeakyReLU,
        Activation::Sigmoid,
    ];

    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Identity => x,
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_RELU_SLOPE * x
                }
            }
            Activation::Sigmoid => sigmoid(x),
        }
    }

    /// Derivative of the activation.
    ///
    /// `x` must be the quantity reported by [`Activation::derivative_input`]: the sigmoid
    /// output for `Sigmoid`, the pre-activation sum for everything else.
    #[inline]
    pub fn derivative(self, x: f32) -> f32 {
        match self {
            Activation::Identity => 1.0,
            Activation::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    LEAKY_RELU_SLOPE
                }
            }
            Activation::Sigmoid => x * (1.0 - x),
        }
    }

    #[inline]
    pub fn derivative_input(self) -> DerivativeInput {
        match self {
            Activation::Sigmoid => DerivativeInput::PostActivation,
            Activation::Identity | Activation::ReLU | Activation::LeakyReLU => {
                DerivativeInput::PreActivation
            }
        }
    }

    /// Picks the derivative argument out of a cached `(pre, post)` pair and evaluates it.
    #[inline]
    pub fn derivative_at(self, pre_activation: f32, post_activation: f32) -> f32 {
        match self.derivative_input() {
            DerivativeInput::PreActivation => self.derivative(pre_activation),
            DerivativeInput::PostActivation => self.derivative(post_activation),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::ReLU => "relu",
            Activation::LeakyReLU => "leaky_relu",
            Activation::Sigmoid => "sigmoid",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" | "none" | "linear" => Ok(Activation::Identity),
            "relu" => Ok(Activation::ReLU),
            "leaky_relu" | "leakyrelu" | "leaky-relu" => Ok(Activation::LeakyReLU),
            "sigmoid" => Ok(Activation::Sigmoid),
            other => Err(Error::InvalidConfig(format!(
                "unknown activation {other:?}; expected one of identity, relu, leaky_relu, sigmoid"
            ))),
        }
    }
}

/// Logistic sigmoid.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}
