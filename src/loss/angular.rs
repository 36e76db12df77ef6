//! Angular-margin softmax (A-Softmax) with margin 4.
//!
//! For a sample with embedding `x` and true class `y`, the true-class logit
//! `||x|| cos(theta)` is replaced by `||x|| psi(theta)`, where `psi` is the
//! monotone extension of `cos(4 theta)`:
//!
//! ```text
//! psi(theta) = (-1)^k cos(4 theta) - 2k,   theta in [k pi/4, (k+1) pi/4]
//! ```
//!
//! `psi` is evaluated directly from `cos(theta)` with the quadruple-angle
//! polynomial and sign corrections, so no inverse cosine is needed. The
//! margin logits are then blended with the unmodified logits,
//! `f = 1 / (1 + lambda)`.

use crate::error::Result;
use crate::loss::cross_entropy::{softmax, SparseCrossEntropy};
use crate::loss::head::{embedding_weights, HeadOutput, LossHead};
use crate::math::matrix::Matrix;
use crate::params::ParamStore;

/// Floor on a squared column norm during weight normalization.
const NORM_EPSILON: f64 = 1e-12;

/// Every intermediate of one angular-margin evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct AngularTerms {
    /// `||x_i||`, shape [batch].
    pub embeddings_norm: Vec<f64>,
    /// `x_i . w_j` with unit-norm `w_j`, shape [batch, num_classes].
    pub original_logits: Matrix,
    /// `original_logits[i, labels[i]]`.
    pub selected_logits: Vec<f64>,
    pub cos_theta: Vec<f64>,
    /// `psi(cos_theta[i]) * ||x_i||`.
    pub margin_logits: Vec<f64>,
    /// `original_logits` with the true-label entries replaced by `margin_logits`.
    pub combined_logits: Matrix,
    /// `(1 - f) * original_logits + f * combined_logits`.
    pub updated_logits: Matrix,
}

#[derive(Debug, Clone)]
pub struct AngularSoftmax {
    weights: Matrix,
    lambda: f64,
}

impl AngularSoftmax {
    pub fn new(store: &mut ParamStore, embedding_dim: usize, num_classes: usize, lambda: f64) -> Result<Self> {
        Ok(Self::with_weights(embedding_weights(store, embedding_dim, num_classes)?, lambda))
    }

    pub fn with_weights(weights: Matrix, lambda: f64) -> Self {
        AngularSoftmax { weights, lambda }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Weight of the margin logits in the blend, `1 / (1 + lambda)`.
    pub fn blend_factor(&self) -> f64 {
        1.0 / (1.0 + self.lambda)
    }

    /// Class weights with unit-norm columns.
    pub fn normalized_weights(&self) -> Matrix {
        self.weights.l2_normalize_columns(NORM_EPSILON)
    }

    /// Runs the margin computation and returns every intermediate.
    ///
    /// A zero embedding has no angle; its `cos_theta` is NaN and the NaN
    /// flows through to the logits.
    pub fn terms(&self, embeddings: &Matrix, labels: &[usize]) -> AngularTerms {
        let embeddings_norm = embeddings.row_norms();
        let original_logits = embeddings.matmul(&self.normalized_weights());
        let selected_logits = original_logits.gather_labels(labels);

        let cos_theta: Vec<f64> = selected_logits
            .iter()
            .zip(&embeddings_norm)
            .map(|(logit, norm)| logit / norm)
            .collect();
        let margin_logits: Vec<f64> = cos_theta
            .iter()
            .zip(&embeddings_norm)
            .map(|(&cos, norm)| multiple_angle_cos(cos) * norm)
            .collect();

        let combined_logits = replace_label_logits(&original_logits, labels, &selected_logits, &margin_logits);
        let updated_logits = blend_logits(&original_logits, &combined_logits, self.blend_factor());

        AngularTerms {
            embeddings_norm,
            original_logits,
            selected_logits,
            cos_theta,
            margin_logits,
            combined_logits,
            updated_logits,
        }
    }
}

impl LossHead for AngularSoftmax {
    fn forward(&self, embeddings: &Matrix, labels: &[usize]) -> HeadOutput {
        let logits = self.terms(embeddings, labels).updated_logits;
        let loss = SparseCrossEntropy::mean(&logits, labels);
        let pred_prob = softmax(&logits);
        HeadOutput { logits, pred_prob, loss }
    }

    fn weights(&self) -> &Matrix {
        &self.weights
    }
}

/// `psi` for margin 4, computed from `cos(theta)`:
///
/// ```text
/// sign3 = sign(2 cos^2 - 1) * sign(cos)
/// sign4 = 2 sign(cos) + sign3 - 3
/// psi   = sign3 * (8 cos^4 - 8 cos^2 + 1) + sign4
/// ```
///
/// Equals `cos(4 theta)` for `theta` in `[0, pi/4]` and decreases
/// monotonically from 1 at `theta = 0` to -7 at `theta = pi`.
pub fn multiple_angle_cos(cos_theta: f64) -> f64 {
    let cos2 = cos_theta * cos_theta;
    let cos4 = cos2 * cos2;
    let sign0 = sign(cos_theta);
    let sign3 = sign(2.0 * cos2 - 1.0) * sign0;
    let sign4 = 2.0 * sign0 + sign3 - 3.0;
    sign3 * (8.0 * cos4 - 8.0 * cos2 + 1.0) + sign4
}

/// Three-valued sign: -1, 0 or 1. NaN stays NaN.
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        // 0.0, -0.0 and NaN are returned as they are
        x
    }
}

/// Swaps the true-label entry of every row from `selected[i]` to
/// `replacement[i]` by scattering the difference.
pub fn replace_label_logits(logits: &Matrix, labels: &[usize], selected: &[f64], replacement: &[f64]) -> Matrix {
    let delta: Vec<f64> = replacement.iter().zip(selected).map(|(r, s)| r - s).collect();
    logits.scatter_add_labels(labels, &delta)
}

/// `(1 - f) * original + f * combined`.
pub fn blend_logits(original: &Matrix, combined: &Matrix, f: f64) -> Matrix {
    original.scale(1.0 - f) + combined.scale(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn psi_at_extremes() {
        assert_eq!(multiple_angle_cos(1.0), 1.0);
        // (-1)^3 cos(4 pi) - 6
        assert_eq!(multiple_angle_cos(-1.0), -7.0);
        // theta = pi / 2 exactly: (-1)^2 cos(2 pi) - 4
        assert_eq!(multiple_angle_cos(0.0), -3.0);
    }

    #[test]
    fn psi_matches_quadruple_angle_cosine_in_principal_range() {
        for step in 0..=20 {
            let theta = PI / 4.0 * step as f64 / 20.0;
            assert_abs_diff_eq!(multiple_angle_cos(theta.cos()), (4.0 * theta).cos(), epsilon = 1e-9);
        }
    }

    #[test]
    fn psi_follows_piecewise_definition_everywhere() {
        for step in 0..=360 {
            let theta = PI * step as f64 / 360.0;
            let k = ((4.0 * theta / PI).floor() as i32).min(3);
            let expected = (-1f64).powi(k) * (4.0 * theta).cos() - 2.0 * k as f64;
            assert_abs_diff_eq!(multiple_angle_cos(theta.cos()), expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn psi_is_monotone_in_theta() {
        let mut previous = multiple_angle_cos(1.0);
        for step in 1..=1000 {
            let theta = PI * step as f64 / 1000.0;
            let current = multiple_angle_cos(theta.cos());
            assert!(current <= previous + 1e-9, "psi increased at theta = {theta}");
            previous = current;
        }
    }

    #[test]
    fn sign_keeps_zero_and_nan() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-3.0), -1.0);
        assert!(sign(f64::NAN).is_nan());
    }

    #[test]
    fn blend_factor_follows_lambda() {
        let head = AngularSoftmax::with_weights(Matrix::zeros(2, 2), 1.0);
        assert_eq!(head.blend_factor(), 0.5);
        let head = AngularSoftmax::with_weights(Matrix::zeros(2, 2), 3.0);
        assert_eq!(head.lambda(), 3.0);
        assert_eq!(head.blend_factor(), 0.25);
    }
}
