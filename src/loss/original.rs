use crate::error::Result;
use crate::loss::cross_entropy::{softmax, SparseCrossEntropy};
use crate::loss::head::{embedding_weights, HeadOutput, LossHead};
use crate::math::matrix::Matrix;
use crate::params::ParamStore;

/// Plain softmax cross-entropy over `embeddings * W`.
#[derive(Debug, Clone)]
pub struct OriginalSoftmax {
    weights: Matrix,
}

impl OriginalSoftmax {
    pub fn new(store: &mut ParamStore, embedding_dim: usize, num_classes: usize) -> Result<Self> {
        Ok(Self::with_weights(embedding_weights(store, embedding_dim, num_classes)?))
    }

    pub fn with_weights(weights: Matrix) -> Self {
        OriginalSoftmax { weights }
    }
}

impl LossHead for OriginalSoftmax {
    fn forward(&self, embeddings: &Matrix, labels: &[usize]) -> HeadOutput {
        let logits = embeddings.matmul(&self.weights);
        let pred_prob = softmax(&logits);
        let loss = SparseCrossEntropy::mean(&logits, labels);
        HeadOutput { logits, pred_prob, loss }
    }

    fn weights(&self) -> &Matrix {
        &self.weights
    }
}
