//! A small, from-scratch feed-forward neural network engine.
//!
//! `cogni` represents a multi-layer perceptron as explicit weight/bias buffers, computes
//! forward activations, propagates error gradients backward layer by layer and applies
//! gradient-descent updates. There is no tensor type and no automatic differentiation: the
//! architecture is a static stack of fully-connected layers trained on a squared-error loss.
//!
//! # Data layout
//!
//! - Every scalar is an `f32`.
//! - Each [`Layer`] owns one [`ParameterBlock`]: a single contiguous arena holding weights,
//!   biases, their gradients and every per-step cache. Nothing is allocated per step.
//! - Weights are row-major with shape `(out_features, in_features)`; row `i` is neuron `i`'s
//!   [`NeuronView`].
//! - [`Dataset`] and [`CsvTable`] store samples contiguously in row-major layout.
//!
//! # Panics and errors
//!
//! - Hot path (panics on misuse): [`Layer::forward`], [`Layer::backpropagate`],
//!   [`Layer::project_partial_derivative`], [`Network::forward`], [`Network::backpropagate`].
//!   Length mismatches and out-of-order calls are programmer errors.
//! - Boundaries (return [`Result`]): construction, model assembly, dataset loading,
//!   checkpoints, configuration, [`Network::fit`].
//!
//! # Quick start
//!
//! ```rust
//! use cogni::{Activation, Dataset, FitConfig, Init, NetworkBuilder};
//!
//! # fn main() -> cogni::Result<()> {
//! // Learn y = (a + b) / 2 on a handful of points.
//! let features = vec![0.0, 0.0, 0.2, 0.4, 0.6, 0.2, 1.0, 0.8, 0.4, 0.4];
//! let labels = vec![0.0, 0.3, 0.4, 0.9, 0.4];
//! let train = Dataset::from_flat(features, labels, 2, 1)?;
//!
//! let mut net = NetworkBuilder::new(2)?
//!     .init(Init::Xavier)?
//!     .add_layer(4, Activation::LeakyReLU)?
//!     .add_layer(1, Activation::Identity)?
//!     .build_with_seed(0)?;
//!
//! let report = net.fit(
//!     &train,
//!     &FitConfig {
//!         epochs: 100,
//!         learning_rate: 0.05,
//!         log_every: 0,
//!     },
//! )?;
//! assert!(report.final_loss().is_finite());
//! # Ok(())
//! # }
//! ```
//!
//! # Driving layers by hand
//!
//! ```rust
//! use cogni::{loss, Activation, Init, Layer};
//!
//! # fn main() -> cogni::Result<()> {
//! let mut hidden = Layer::new_with_seed(3, 4, Init::Xavier, Activation::ReLU, 0)?;
//! let mut output = Layer::new_with_seed(4, 1, Init::Xavier, Activation::Identity, 1)?;
//! let x = [0.1_f32, -0.2, 0.3];
//! let mut d_out = [0.0_f32; 1];
//!
//! let h = hidden.forward(&x);
//! let y = output.forward(h);
//! loss::mse_backward(y, &[0.5], &mut d_out);
//!
//! hidden.zero_grad();
//! output.zero_grad();
//! output.backpropagate(&d_out);
//! hidden.backpropagate(output.project_partial_derivative());
//!
//! output.apply_gradients(1e-2);
//! hidden.apply_gradients(1e-2);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod block;
pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod layer;
pub mod loss;
pub mod network;
pub mod neuron;
pub mod serde_model;
pub mod train;

pub use activation::{Activation, DerivativeInput};
pub use block::{ParameterBlock, Section};
pub use builder::NetworkBuilder;
pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use config::{load_config, TrainConfig};
pub use data::{CsvOptions, CsvTable, Dataset};
pub use error::{Error, Result};
pub use layer::{Init, Layer};
pub use network::Network;
pub use neuron::NeuronView;
pub use train::{FitConfig, FitReport};
