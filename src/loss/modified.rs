use crate::error::Result;
use crate::loss::cross_entropy::{softmax, SparseCrossEntropy};
use crate::loss::head::{embedding_weights, HeadOutput, LossHead};
use crate::math::matrix::Matrix;
use crate::params::ParamStore;

/// Softmax cross-entropy with every class-weight column scaled to unit
/// L2 norm, so a logit is `||x|| * cos(theta)` and the decision boundary
/// depends only on angles.
///
/// Embeddings are left unnormalized: normalizing them as well makes the
/// loss diverge in training.
#[derive(Debug, Clone)]
pub struct ModifiedSoftmax {
    weights: Matrix,
}

impl ModifiedSoftmax {
    pub fn new(store: &mut ParamStore, embedding_dim: usize, num_classes: usize) -> Result<Self> {
        Ok(Self::with_weights(embedding_weights(store, embedding_dim, num_classes)?))
    }

    pub fn with_weights(weights: Matrix) -> Self {
        ModifiedSoftmax { weights }
    }

    /// Class weights divided by their column norms. A zero column gives NaN.
    pub fn normalized_weights(&self) -> Matrix {
        self.weights.normalize_columns()
    }
}

impl LossHead for ModifiedSoftmax {
    fn forward(&self, embeddings: &Matrix, labels: &[usize]) -> HeadOutput {
        let logits = embeddings.matmul(&self.normalized_weights());
        let pred_prob = softmax(&logits);
        let loss = SparseCrossEntropy::mean(&logits, labels);
        HeadOutput { logits, pred_prob, loss }
    }

    fn weights(&self) -> &Matrix {
        &self.weights
    }
}
