use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::init::Initializer;
use crate::math::tensor::Tensor4;
use crate::params::ParamStore;

/// Batch statistics observed in training mode, waiting to be folded into
/// the moving averages by [`ParamStore::apply_moving_averages`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageUpdate {
    pub mean_name: String,
    pub variance_name: String,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

/// Per-channel batch normalization over (batch, height, width).
#[derive(Debug, Clone)]
pub struct BatchNorm {
    pub channels: usize,
    pub epsilon: f64,
    gamma: Vec<f64>,
    beta: Vec<f64>,
    moving_mean: Vec<f64>,
    moving_variance: Vec<f64>,
    mean_name: String,
    variance_name: String,
}

impl BatchNorm {
    /// Looks up (or creates) `{scope}/gamma`, `beta`, `moving_mean` and
    /// `moving_variance`.
    pub fn new(store: &mut ParamStore, scope: &str, channels: usize, epsilon: f64) -> Result<BatchNorm> {
        let mut fetch = |suffix: &str, init: Initializer| -> Result<Vec<f64>> {
            Ok(store
                .get_or_init(&format!("{scope}/{suffix}"), &[channels], init)?
                .data
                .clone())
        };
        let gamma = fetch("gamma", Initializer::Ones)?;
        let beta = fetch("beta", Initializer::Zeros)?;
        let moving_mean = fetch("moving_mean", Initializer::Zeros)?;
        let moving_variance = fetch("moving_variance", Initializer::Ones)?;

        Ok(BatchNorm {
            channels,
            epsilon,
            gamma,
            beta,
            moving_mean,
            moving_variance,
            mean_name: format!("{scope}/moving_mean"),
            variance_name: format!("{scope}/moving_variance"),
        })
    }

    /// Normalizes `input`.
    ///
    /// With `training` set the statistics come from the batch itself and
    /// are returned as a pending moving-average update; otherwise the
    /// stored moving statistics are used and nothing is recorded.
    pub fn forward(&self, input: &Tensor4, training: bool) -> (Tensor4, Option<MovingAverageUpdate>) {
        assert_eq!(
            input.channels, self.channels,
            "batch norm expects {} channels, got {}",
            self.channels, input.channels
        );
        let (mean, variance, update) = if training {
            let (mean, variance) = channel_moments(input);
            let update = MovingAverageUpdate {
                mean_name: self.mean_name.clone(),
                variance_name: self.variance_name.clone(),
                mean: mean.clone(),
                variance: variance.clone(),
            };
            (mean, variance, Some(update))
        } else {
            (self.moving_mean.clone(), self.moving_variance.clone(), None)
        };

        let scale: Vec<f64> = self
            .gamma
            .iter()
            .zip(&variance)
            .map(|(g, v)| g / (v + self.epsilon).sqrt())
            .collect();

        let mut output = input.clone();
        for pixel in output.data.chunks_mut(self.channels) {
            for (c, x) in pixel.iter_mut().enumerate() {
                *x = (*x - mean[c]) * scale[c] + self.beta[c];
            }
        }

        (output, update)
    }
}

/// Per-channel mean and population variance.
fn channel_moments(input: &Tensor4) -> (Vec<f64>, Vec<f64>) {
    let channels = input.channels;
    let count = (input.data.len() / channels.max(1)) as f64;
    let mut mean = vec![0.0; channels];
    for pixel in input.data.chunks(channels) {
        for (m, x) in mean.iter_mut().zip(pixel) {
            *m += x;
        }
    }
    mean.iter_mut().for_each(|m| *m /= count);

    let mut variance = vec![0.0; channels];
    for pixel in input.data.chunks(channels) {
        for ((v, x), m) in variance.iter_mut().zip(pixel).zip(&mean) {
            *v += (x - m) * (x - m);
        }
    }
    variance.iter_mut().for_each(|v| *v /= count);

    (mean, variance)
}
