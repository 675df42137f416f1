//! Training configuration.
//!
//! A run is described by a JSON file:
//!
//! ```json
//! {
//!   "input_dim": 4,
//!   "layers": [
//!     { "width": 8, "activation": "relu" },
//!     { "width": 1, "activation": "identity" }
//!   ],
//!   "epochs": 100,
//!   "learning_rate": 0.00005,
//!   "seed": 7,
//!   "init": { "kind": "uniform", "low": 0.0, "high": 1.0 },
//!   "data": { "path": "data/busses.csv", "has_header": true, "label_column": 4 },
//!   "checkpoint": "busses.w"
//! }
//! ```
//!
//! Every field except `input_dim`, `layers` and `data.path` has a default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Activation, CsvOptions, Error, FitConfig, Init, Network, NetworkBuilder, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub width: usize,
    #[serde(default)]
    pub activation: Activation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub has_header: bool,
    /// Column holding the target; every other column is a feature.
    #[serde(default)]
    pub label_column: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl DataConfig {
    pub fn csv_options(&self) -> Result<CsvOptions> {
        let delimiter = u8::try_from(self.delimiter).map_err(|_| {
            Error::InvalidConfig(format!(
                "csv delimiter must be a single-byte character, got {:?}",
                self.delimiter
            ))
        })?;
        Ok(CsvOptions {
            has_header: self.has_header,
            delimiter,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub input_dim: usize,
    pub layers: Vec<LayerConfig>,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub init: Init,
    #[serde(default = "default_log_every")]
    pub log_every: usize,
    pub data: DataConfig,
    /// Written after training.
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
    /// Read before training.
    #[serde(default)]
    pub resume: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_epochs() -> usize {
    100
}

fn default_learning_rate() -> f32 {
    1e-2
}

fn default_log_every() -> usize {
    10
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(Error::InvalidConfig("input_dim must be > 0".to_owned()));
        }
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig(
                "layers must not be empty".to_owned(),
            ));
        }
        if let Some(i) = self.layers.iter().position(|l| l.width == 0) {
            return Err(Error::InvalidConfig(format!("layer {i} width must be > 0")));
        }
        self.init.validate()?;
        self.data.csv_options()?;
        self.fit_config().validate()
    }

    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            log_every: self.log_every,
        }
    }

    /// Build the configured architecture with freshly initialised parameters.
    pub fn build_network(&self) -> Result<Network> {
        let mut builder = NetworkBuilder::new(self.input_dim)?.init(self.init)?;
        for layer in &self.layers {
            builder = builder.add_layer(layer.width, layer.activation)?;
        }
        match self.seed {
            Some(seed) => builder.build_with_seed(seed),
            None => builder.build(),
        }
    }
}

/// Load and validate a training configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TrainConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let config: TrainConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "input_dim": 4,
        "layers": [
            { "width": 8, "activation": "relu" },
            { "width": 1 }
        ],
        "data": { "path": "data/busses.csv", "label_column": 4 }
    }"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg: TrainConfig = serde_json::from_str(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.epochs, 100);
        assert_eq!(cfg.init, Init::default());
        assert_eq!(cfg.layers[1].activation, Activation::Identity);
        assert!(cfg.data.has_header);
        assert_eq!(cfg.data.csv_options().unwrap().delimiter, b',');
        assert!(cfg.checkpoint.is_none());

        let net = cfg.build_network().unwrap();
        assert_eq!(net.widths(), vec![4, 8, 1]);
    }

    #[test]
    fn load_config_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.data.label_column, 4);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(br#"{"input_dim": 2, "layers": [], "data": {"path": "x"}}"#)
            .unwrap();
        assert!(matches!(
            load_config(bad.path()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_activation_is_rejected() {
        let text = MINIMAL.replace("\"relu\"", "\"swish\"");
        assert!(serde_json::from_str::<TrainConfig>(&text).is_err());
    }

    #[test]
    fn bad_hyper_parameters_are_rejected() {
        let mut cfg: TrainConfig = serde_json::from_str(MINIMAL).unwrap();
        cfg.learning_rate = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg: TrainConfig = serde_json::from_str(MINIMAL).unwrap();
        cfg.data.delimiter = 'λ';
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn init_range_wider_than_f32_is_rejected() {
        let text = MINIMAL.replace(
            "\"input_dim\": 4,",
            r#""input_dim": 4, "init": {"kind": "uniform", "low": -3e38, "high": 3e38},"#,
        );
        let cfg: TrainConfig = serde_json::from_str(&text).unwrap();
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
        assert!(matches!(cfg.build_network(), Err(Error::InvalidConfig(_))));
    }
}
