use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::math::matrix::Matrix;

/// Batch of feature maps in NHWC order, stored flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor4 {
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<f64>,
}

impl Tensor4 {
    pub fn zeros(batch: usize, height: usize, width: usize, channels: usize) -> Tensor4 {
        Tensor4 {
            batch,
            height,
            width,
            channels,
            data: vec![0.0; batch * height * width * channels],
        }
    }

    /// Wraps a flat NHWC buffer, checking its length against the shape.
    pub fn from_data(shape: [usize; 4], data: Vec<f64>) -> Result<Tensor4> {
        let [batch, height, width, channels] = shape;
        let tensor = Tensor4 { batch, height, width, channels, data };
        tensor.check_len()?;
        Ok(tensor)
    }

    /// Fails unless `data` holds exactly one value per shape element.
    pub fn check_len(&self) -> Result<()> {
        let shape = self.shape();
        let expected: usize = shape.iter().product();
        if self.data.len() != expected {
            return Err(ModelError::DataLength {
                shape: shape.to_vec(),
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Stacks row-major grayscale images of `height * width` pixels into a
    /// single-channel batch.
    pub fn from_grayscale(images: &[Vec<f64>], height: usize, width: usize) -> Result<Tensor4> {
        let mut data = Vec::with_capacity(images.len() * height * width);
        for image in images {
            if image.len() != height * width {
                return Err(ModelError::DataLength {
                    shape: vec![1, height, width, 1],
                    expected: height * width,
                    actual: image.len(),
                });
            }
            data.extend_from_slice(image);
        }
        Tensor4::from_data([images.len(), height, width, 1], data)
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.batch, self.height, self.width, self.channels]
    }

    /// Number of values in one sample.
    pub fn sample_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    #[inline]
    pub fn index(&self, n: usize, h: usize, w: usize, c: usize) -> usize {
        ((n * self.height + h) * self.width + w) * self.channels + c
    }

    pub fn get(&self, n: usize, h: usize, w: usize, c: usize) -> f64 {
        self.data[self.index(n, h, w, c)]
    }

    pub fn map<F>(&self, functor: F) -> Tensor4
    where
        F: Fn(f64) -> f64,
    {
        Tensor4 {
            data: self.data.iter().map(|&x| functor(x)).collect(),
            ..*self
        }
    }

    /// Collapses every sample to one row of `height * width * channels`
    /// values, preserving NHWC order.
    pub fn flatten(&self) -> Matrix {
        Matrix::from_flat(self.batch, self.sample_len(), &self.data)
    }
}
