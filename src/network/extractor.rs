use log::debug;

use crate::activation::activation::ActivationFunction;
use crate::error::{ModelError, Result};
use crate::layers::batch_norm::{BatchNorm, MovingAverageUpdate};
use crate::layers::conv2d::{Conv2d, Padding};
use crate::layers::dense::Dense;
use crate::math::matrix::Matrix;
use crate::math::tensor::Tensor4;
use crate::params::ParamStore;

pub const KERNEL_SIZE: usize = 5;

/// `(scope, filters, stride, padding)` of the four conv blocks.
pub const BLOCKS: [(&str, usize, usize, Padding); 4] = [
    ("conv1", 32, 1, Padding::Same),
    ("conv2", 64, 2, Padding::Same),
    ("conv3", 128, 1, Padding::Valid),
    ("conv4", 256, 2, Padding::Valid),
];

/// Smallest height / width that leaves at least one pixel after `conv4`.
pub const MIN_IMAGE_SIZE: usize = 17;

/// conv -> batch norm -> ReLU
#[derive(Debug, Clone)]
struct ConvBlock {
    scope: &'static str,
    conv: Conv2d,
    norm: BatchNorm,
    activation: ActivationFunction,
}

/// Output of one extractor pass.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Shape [batch, embedding_dim].
    pub embeddings: Matrix,
    /// Batch statistics recorded in training mode, one per conv block.
    pub updates: Vec<MovingAverageUpdate>,
}

/// Four conv blocks of increasing depth, flattened and projected linearly
/// to `embedding_dim`.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    blocks: Vec<ConvBlock>,
    projection: Dense,
    pub embedding_dim: usize,
}

impl FeatureExtractor {
    /// Builds the extractor for single-channel images of `height x width`.
    /// The projection's input width depends on the image size.
    pub fn new(
        store: &mut ParamStore,
        height: usize,
        width: usize,
        embedding_dim: usize,
        epsilon: f64,
    ) -> Result<FeatureExtractor> {
        let (out_h, out_w) = Self::output_hw(height, width);
        if out_h == 0 || out_w == 0 {
            return Err(ModelError::ImageTooSmall { height, width, min: MIN_IMAGE_SIZE });
        }

        let mut blocks = Vec::with_capacity(BLOCKS.len());
        let mut in_channels = 1;
        for (scope, filters, stride, padding) in BLOCKS {
            let conv = Conv2d::new(store, scope, in_channels, filters, KERNEL_SIZE, stride, padding)?;
            let norm = BatchNorm::new(store, &format!("{scope}/batch_norm"), filters, epsilon)?;
            blocks.push(ConvBlock { scope, conv, norm, activation: ActivationFunction::ReLU });
            in_channels = filters;
        }

        let flat = out_h * out_w * in_channels;
        let projection = Dense::new(store, "dense", flat, embedding_dim, ActivationFunction::Identity)?;

        Ok(FeatureExtractor { blocks, projection, embedding_dim })
    }

    /// Spatial size of the last conv block's output.
    pub fn output_hw(height: usize, width: usize) -> (usize, usize) {
        BLOCKS.iter().fold((height, width), |(h, w), &(_, _, stride, padding)| {
            (
                padding.output_size(h, KERNEL_SIZE, stride).0,
                padding.output_size(w, KERNEL_SIZE, stride).0,
            )
        })
    }

    /// Embeds every image in the batch.
    ///
    /// `training` selects batch statistics (and records their moving-average
    /// updates) over the stored moving statistics.
    pub fn forward(&self, images: &Tensor4, training: bool) -> Extraction {
        let mut net = images.clone();
        let mut updates = Vec::new();

        for block in &self.blocks {
            net = block.conv.forward(&net);
            let (normed, update) = block.norm.forward(&net, training);
            net = normed.map(|x| block.activation.function(x));
            updates.extend(update);
            debug!("{}: {:?}", block.scope, net.shape());
        }

        let embeddings = self.projection.forward(&net.flatten());
        debug!("embeddings: {}x{}", embeddings.rows, embeddings.cols);

        Extraction { embeddings, updates }
    }
}
