use crate::math::matrix::Matrix;

/// Cross-entropy between softmax(logits) and integer class labels.
pub struct SparseCrossEntropy;

impl SparseCrossEntropy {
    /// Per-sample loss `logsumexp(logits_i) - logits_i[label_i]`, the
    /// negative log of the probability assigned to the true class.
    ///
    /// `logits` — shape [batch, n_classes]
    /// `labels` — shape [batch], values in [0, n_classes)
    pub fn per_sample(logits: &Matrix, labels: &[usize]) -> Vec<f64> {
        assert_eq!(logits.rows, labels.len(), "one label per logit row is required");
        logits.data.iter().zip(labels)
            .map(|(row, &label)| log_sum_exp(row) - row[label])
            .collect()
    }

    /// Batch mean of [`SparseCrossEntropy::per_sample`].
    pub fn mean(logits: &Matrix, labels: &[usize]) -> f64 {
        let losses = Self::per_sample(logits, labels);
        losses.iter().sum::<f64>() / losses.len() as f64
    }
}

/// Row-wise softmax; every row of the result sums to 1.
pub fn softmax(logits: &Matrix) -> Matrix {
    Matrix::from_data(logits.data.iter().map(|row| softmax_row(row)).collect())
}

fn softmax_row(row: &[f64]) -> Vec<f64> {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = row.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn log_sum_exp(row: &[f64]) -> f64 {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        return max;
    }
    max + row.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}
