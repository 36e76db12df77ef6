use serde::{Serialize, Deserialize};

use crate::error::{ModelError, Result};
use crate::loss::loss_type::LossType;

/// Batch-normalization hyperparameters shared by every conv block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchNormConfig {
    /// Added to the variance before the square root.
    pub epsilon: f64,
    /// Decay of the moving mean / variance.
    pub momentum: f64,
}

impl Default for BatchNormConfig {
    fn default() -> Self {
        BatchNormConfig { epsilon: 1e-3, momentum: 0.99 }
    }
}

/// Everything needed to build a [`Model`](crate::Model) besides the data
/// and the parameters. Missing fields take their defaults when loaded from
/// JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Width of the embedding produced by the extractor.
    pub embedding_dim: usize,
    pub loss_type: LossType,
    /// L2 strength on conv and projection kernels, reported through
    /// `Model::regularization_loss` for the optimizer to use.
    pub weight_decay: f64,
    /// `true` normalizes with batch statistics and records moving-average
    /// updates; `false` uses the stored moving statistics.
    pub trainable: bool,
    pub num_classes: usize,
    pub batch_norm: BatchNormConfig,
    /// Angular head only: blend `f = 1 / (1 + lambda)` between plain and
    /// margin logits.
    pub lambda: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            embedding_dim: 2,
            loss_type: LossType::Original,
            weight_decay: 0.001,
            trainable: true,
            num_classes: 10,
            batch_norm: BatchNormConfig::default(),
            lambda: 1.0,
        }
    }
}

impl ModelConfig {
    pub fn new(embedding_dim: usize, loss_type: LossType) -> Self {
        ModelConfig { embedding_dim, loss_type, ..ModelConfig::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(ModelError::InvalidConfig("embedding_dim must be positive".into()));
        }
        if self.num_classes < 2 {
            return Err(ModelError::InvalidConfig(format!(
                "num_classes must be at least 2, got {}",
                self.num_classes
            )));
        }
        if !self.weight_decay.is_finite() || self.weight_decay < 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "weight_decay must be a non-negative number, got {}",
                self.weight_decay
            )));
        }
        if self.lambda.is_nan() || self.lambda < 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "lambda must be non-negative, got {}",
                self.lambda
            )));
        }
        let bn = &self.batch_norm;
        if bn.epsilon.is_nan() || bn.epsilon < 0.0 || !(0.0..=1.0).contains(&bn.momentum) {
            return Err(ModelError::InvalidConfig(format!(
                "batch norm needs epsilon >= 0 and momentum in [0, 1], got {} and {}",
                bn.epsilon, bn.momentum
            )));
        }
        Ok(())
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reads and validates a config previously written by `save_json`.
    pub fn load_json(path: &str) -> Result<ModelConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: ModelConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
