use log::{debug, warn};

use crate::error::{ModelError, Result};
use crate::layers::batch_norm::MovingAverageUpdate;
use crate::math::matrix::Matrix;
use crate::math::tensor::Tensor4;
use crate::metrics;
use crate::network::config::ModelConfig;
use crate::network::extractor::FeatureExtractor;
use crate::params::ParamStore;

/// One forward evaluation: images -> embeddings -> loss head -> metrics.
///
/// Every output is computed in the constructor and exposed read-only.
/// Parameters live in the [`ParamStore`] passed in; building a second model
/// against the same store reuses them.
#[derive(Debug, Clone)]
pub struct Model {
    config: ModelConfig,
    embeddings: Matrix,
    logits: Matrix,
    pred_prob: Matrix,
    loss: f64,
    predictions: Vec<usize>,
    accuracy: f64,
    regularization_loss: f64,
    updates: Vec<MovingAverageUpdate>,
}

impl Model {
    /// Evaluates the full network on a batch of single-channel images.
    pub fn new(
        images: &Tensor4,
        labels: &[usize],
        config: &ModelConfig,
        store: &mut ParamStore,
    ) -> Result<Model> {
        config.validate()?;
        images.check_len()?;
        if images.channels != 1 {
            return Err(ModelError::ChannelMismatch(images.channels));
        }
        check_labels(images.batch, labels, config.num_classes)?;

        let extractor = FeatureExtractor::new(
            store,
            images.height,
            images.width,
            config.embedding_dim,
            config.batch_norm.epsilon,
        )?;
        let extraction = extractor.forward(images, config.trainable);

        let mut model = Model::from_embeddings(extraction.embeddings, labels, config, store)?;
        model.updates = extraction.updates;
        model.regularization_loss = config.weight_decay * store.l2_loss("/kernel");
        Ok(model)
    }

    /// Runs only the loss head and metrics on embeddings computed elsewhere.
    pub fn from_embeddings(
        embeddings: Matrix,
        labels: &[usize],
        config: &ModelConfig,
        store: &mut ParamStore,
    ) -> Result<Model> {
        config.validate()?;
        check_labels(embeddings.rows, labels, config.num_classes)?;
        if embeddings.cols != config.embedding_dim {
            return Err(ModelError::InvalidConfig(format!(
                "embeddings have {} columns but embedding_dim is {}",
                embeddings.cols, config.embedding_dim
            )));
        }

        let head = config.loss_type.build(store, config.embedding_dim, config.num_classes, config.lambda)?;
        debug!("{} head over {} samples", config.loss_type, labels.len());
        let output = head.forward(&embeddings, labels);
        if !output.loss.is_finite() {
            warn!("{} loss is not finite: {}", config.loss_type, output.loss);
        }

        let predictions = metrics::predictions(&output.pred_prob);
        let accuracy = metrics::accuracy(&predictions, labels);

        Ok(Model {
            config: config.clone(),
            embeddings,
            logits: output.logits,
            pred_prob: output.pred_prob,
            loss: output.loss,
            predictions,
            accuracy,
            regularization_loss: 0.0,
            updates: Vec::new(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Shape [batch, embedding_dim].
    pub fn embeddings(&self) -> &Matrix {
        &self.embeddings
    }

    /// Logits the loss was computed on (margin-adjusted for the angular head).
    pub fn logits(&self) -> &Matrix {
        &self.logits
    }

    /// Shape [batch, num_classes]; rows sum to 1.
    pub fn pred_prob(&self) -> &Matrix {
        &self.pred_prob
    }

    /// Mean cross-entropy over the batch.
    pub fn loss(&self) -> f64 {
        self.loss
    }

    pub fn predictions(&self) -> &[usize] {
        &self.predictions
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// `weight_decay * sum(0.5 * w^2)` over the conv and projection kernels.
    /// Zero for models built with [`Model::from_embeddings`].
    pub fn regularization_loss(&self) -> f64 {
        self.regularization_loss
    }

    pub fn total_loss(&self) -> f64 {
        self.loss + self.regularization_loss
    }

    /// Batch-norm statistics to fold in with
    /// [`ParamStore::apply_moving_averages`]. Empty unless `trainable`.
    pub fn moving_average_updates(&self) -> &[MovingAverageUpdate] {
        &self.updates
    }
}

fn check_labels(batch: usize, labels: &[usize], num_classes: usize) -> Result<()> {
    if batch != labels.len() {
        return Err(ModelError::BatchMismatch { images: batch, labels: labels.len() });
    }
    if labels.is_empty() {
        return Err(ModelError::EmptyBatch);
    }
    if let Some(index) = labels.iter().position(|&l| l >= num_classes) {
        return Err(ModelError::LabelOutOfRange { index, label: labels[index], num_classes });
    }
    Ok(())
}
