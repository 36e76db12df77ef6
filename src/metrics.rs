use crate::math::matrix::Matrix;

/// Most probable class of every row. Ties go to the lowest class index.
pub fn predictions(pred_prob: &Matrix) -> Vec<usize> {
    pred_prob.argmax_rows()
}

/// Fraction of `predictions` equal to `labels`, in [0, 1].
/// An empty batch has accuracy 0.
pub fn accuracy(predictions: &[usize], labels: &[usize]) -> f64 {
    assert_eq!(predictions.len(), labels.len(), "one prediction per label is required");
    if labels.is_empty() {
        return 0.0;
    }
    let correct = predictions.iter().zip(labels).filter(|(p, l)| p == l).count();
    correct as f64 / labels.len() as f64
}
