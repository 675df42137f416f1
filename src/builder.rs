//! Network builder.
//!
//! `NetworkBuilder` is the recommended way to define a network. Widths are chained
//! automatically, so the resulting stack always satisfies the width invariant checked by
//! [`Network::from_layers`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Activation, Error, Init, Layer, Network, Result};

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    out_features: usize,
    activation: Activation,
}

#[derive(Debug, Clone)]
/// Builder for a [`Network`].
///
/// ```rust
/// use cogni::{Activation, NetworkBuilder};
///
/// # fn main() -> cogni::Result<()> {
/// let net = NetworkBuilder::new(2)?
///     .add_layer(8, Activation::ReLU)?
///     .add_layer(1, Activation::Sigmoid)?
///     .build_with_seed(0)?;
/// assert_eq!(net.widths(), vec![2, 8, 1]);
/// # Ok(())
/// # }
/// ```
pub struct NetworkBuilder {
    input_dim: usize,
    init: Init,
    layers: Vec<LayerSpec>,
}

impl NetworkBuilder {
    /// Start building a network that accepts inputs of length `input_dim`.
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidConfig("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            input_dim,
            init: Init::default(),
            layers: Vec::new(),
        })
    }

    /// Convenience constructor from a widths list + activations.
    ///
    /// `widths` includes the input width, so its length must be at least 2.
    /// `activations` must have length `widths.len() - 1`.
    pub fn from_widths(widths: &[usize], activations: &[Activation]) -> Result<Self> {
        if widths.len() < 2 {
            return Err(Error::InvalidConfig(
                "widths must include input and output dims".to_owned(),
            ));
        }
        if activations.len() != widths.len() - 1 {
            return Err(Error::InvalidConfig(format!(
                "activations length {} does not match widths.len() - 1 ({})",
                activations.len(),
                widths.len() - 1
            )));
        }

        let mut b = Self::new(widths[0])?;
        for (&out_features, &act) in widths[1..].iter().zip(activations) {
            b = b.add_layer(out_features, act)?;
        }
        Ok(b)
    }

    /// Initialisation used for every layer. Defaults to uniform `[0, 1)`.
    pub fn init(mut self, init: Init) -> Result<Self> {
        init.validate()?;
        self.init = init;
        Ok(self)
    }

    /// Add a fully-connected layer with `out_features` neurons.
    pub fn add_layer(mut self, out_features: usize, activation: Activation) -> Result<Self> {
        if out_features == 0 {
            return Err(Error::InvalidConfig(
                "layer out_features must be > 0".to_owned(),
            ));
        }
        self.layers.push(LayerSpec {
            out_features,
            activation,
        });
        Ok(self)
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed(self, seed: u64) -> Result<Network> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build with an OS-seeded generator.
    pub fn build(self) -> Result<Network> {
        self.build_with_rng(&mut StdRng::from_entropy())
    }

    /// Build using the provided RNG.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Network> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig(
                "network must have at least one layer".to_owned(),
            ));
        }

        let mut layers = Vec::with_capacity(self.layers.len());
        let mut in_features = self.input_dim;
        for spec in self.layers {
            let layer =
                Layer::new_with_rng(in_features, spec.out_features, self.init, spec.activation, rng)?;
            layers.push(layer);
            in_features = spec.out_features;
        }

        Network::from_layers(layers)
    }
}
