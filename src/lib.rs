pub mod math;
pub mod activation;
pub mod layers;
pub mod params;
pub mod network;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use math::tensor::Tensor4;
pub use params::{Param, ParamStore};
pub use network::{ModelConfig, FeatureExtractor};
pub use loss::{LossType, LossHead, OriginalSoftmax, ModifiedSoftmax, AngularSoftmax};
pub use model::Model;
pub use error::{ModelError, Result};
