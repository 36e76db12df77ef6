pub mod config;
pub mod extractor;

pub use config::{BatchNormConfig, ModelConfig};
pub use extractor::{Extraction, FeatureExtractor};
