use crate::error::Result;
use crate::math::init::Initializer;
use crate::math::matrix::Matrix;
use crate::params::ParamStore;

/// Store name of the `[embedding_dim, num_classes]` class-weight matrix.
/// Every head reads the same entry.
pub const EMBEDDING_WEIGHTS: &str = "softmax/embedding_weights";

/// What a loss head produces for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadOutput {
    /// The logits the loss was computed on.
    pub logits: Matrix,
    /// softmax(logits), shape [batch, num_classes].
    pub pred_prob: Matrix,
    /// Mean cross-entropy over the batch.
    pub loss: f64,
}

/// Maps embeddings and integer labels to class probabilities and a loss.
pub trait LossHead {
    fn forward(&self, embeddings: &Matrix, labels: &[usize]) -> HeadOutput;

    /// Class-weight matrix as stored, before any normalization.
    fn weights(&self) -> &Matrix;

    fn num_classes(&self) -> usize {
        self.weights().cols
    }
}

pub(crate) fn embedding_weights(store: &mut ParamStore, embedding_dim: usize, num_classes: usize) -> Result<Matrix> {
    Ok(store
        .get_or_init(EMBEDDING_WEIGHTS, &[embedding_dim, num_classes], Initializer::XavierUniform)?
        .to_matrix())
}
