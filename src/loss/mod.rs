pub mod angular;
pub mod cross_entropy;
pub mod head;
pub mod loss_type;
pub mod modified;
pub mod original;

pub use angular::{multiple_angle_cos, AngularSoftmax, AngularTerms};
pub use cross_entropy::{softmax, SparseCrossEntropy};
pub use head::{HeadOutput, LossHead, EMBEDDING_WEIGHTS};
pub use loss_type::LossType;
pub use modified::ModifiedSoftmax;
pub use original::OriginalSoftmax;
