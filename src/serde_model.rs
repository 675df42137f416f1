//! JSON model snapshots.
//!
//! Unlike the text checkpoint, a snapshot records each layer's shape and activation next to
//! its parameters, so a [`Network`] can be rebuilt from it without knowing the architecture
//! up front. The snapshot types are separate from `Network`/`Layer` so the file format does
//! not follow changes to the in-memory layout.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Activation, Error, Layer, Network, Result};

/// Bumped whenever the snapshot layout changes incompatibly.
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub format_version: u32,
    pub layers: Vec<LayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub in_features: usize,
    pub out_features: usize,
    pub activation: Activation,
    /// Row-major `(out_features, in_features)`.
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl ModelSnapshot {
    /// Check the version and that consecutive layers chain. Per-layer parameter counts are
    /// checked when the layers are rebuilt.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "snapshot format_version {} is not supported (this build reads {})",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if self.layers.is_empty() {
            return Err(Error::InvalidData("snapshot contains no layers".to_owned()));
        }
        for (idx, pair) in self.layers.windows(2).enumerate() {
            if pair[0].out_features != pair[1].in_features {
                return Err(Error::InvalidShape(format!(
                    "snapshot layer {} expects {} inputs but layer {idx} produces {}",
                    idx + 1,
                    pair[1].in_features,
                    pair[0].out_features
                )));
            }
        }
        Ok(())
    }
}

impl From<&Layer> for LayerSnapshot {
    fn from(layer: &Layer) -> Self {
        Self {
            in_features: layer.in_features(),
            out_features: layer.out_features(),
            activation: layer.activation(),
            weights: layer.weights().to_vec(),
            bias: layer.bias().to_vec(),
        }
    }
}

impl From<&Network> for ModelSnapshot {
    fn from(network: &Network) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            layers: network.layers().iter().map(LayerSnapshot::from).collect(),
        }
    }
}

impl TryFrom<&LayerSnapshot> for Layer {
    type Error = Error;

    fn try_from(snap: &LayerSnapshot) -> Result<Self> {
        Layer::from_parts(
            snap.in_features,
            snap.out_features,
            snap.activation,
            &snap.weights,
            &snap.bias,
        )
    }
}

impl TryFrom<ModelSnapshot> for Network {
    type Error = Error;

    fn try_from(snap: ModelSnapshot) -> Result<Self> {
        snap.validate()?;
        let layers = snap
            .layers
            .iter()
            .enumerate()
            .map(|(idx, layer)| {
                Layer::try_from(layer)
                    .map_err(|e| Error::InvalidData(format!("snapshot layer {idx}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Network::from_layers(layers)
    }
}

impl Network {
    pub fn to_json_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&ModelSnapshot::from(self))?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&ModelSnapshot::from(self))?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str::<ModelSnapshot>(text)?.try_into()
    }

    /// Write a pretty-printed snapshot to `path`, replacing any existing file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json_string_pretty()?).map_err(|e| Error::io(path, e))?;
        log::info!("saved model snapshot to {}", path.display());
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let network = Self::from_json_str(&text)?;
        log::debug!("loaded model {:?} from {}", network.widths(), path.display());
        Ok(network)
    }
}
