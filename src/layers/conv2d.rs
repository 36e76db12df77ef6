use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::init::Initializer;
use crate::math::tensor::Tensor4;
use crate::params::ParamStore;

/// Border handling of a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Padding {
    /// Zero-pad so that `out = ceil(in / stride)`.
    Same,
    /// No padding; only windows fully inside the input.
    Valid,
}

impl Padding {
    /// Returns `(output_size, padding_before)` along one spatial axis.
    ///
    /// For `Same` the total padding is `max((out - 1) * stride + kernel - in, 0)`,
    /// with the odd element placed after the input.
    pub fn output_size(&self, input: usize, kernel: usize, stride: usize) -> (usize, usize) {
        match self {
            Padding::Same => {
                let out = input.div_ceil(stride);
                let needed = (out.saturating_sub(1) * stride + kernel).saturating_sub(input);
                (out, needed / 2)
            }
            Padding::Valid => {
                if input < kernel {
                    (0, 0)
                } else {
                    ((input - kernel) / stride + 1, 0)
                }
            }
        }
    }
}

/// 2-D convolution over NHWC input with a `[k, k, in, filters]` kernel and bias.
#[derive(Debug, Clone)]
pub struct Conv2d {
    pub in_channels: usize,
    pub filters: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: Padding,
    kernel: Vec<f64>,
    bias: Vec<f64>,
}

impl Conv2d {
    /// Looks up (or creates) `{scope}/kernel` and `{scope}/bias` in `store`.
    pub fn new(
        store: &mut ParamStore,
        scope: &str,
        in_channels: usize,
        filters: usize,
        kernel_size: usize,
        stride: usize,
        padding: Padding,
    ) -> Result<Conv2d> {
        let kernel = store
            .get_or_init(
                &format!("{scope}/kernel"),
                &[kernel_size, kernel_size, in_channels, filters],
                Initializer::XavierNormal,
            )?
            .data
            .clone();
        let bias = store
            .get_or_init(&format!("{scope}/bias"), &[filters], Initializer::Zeros)?
            .data
            .clone();

        Ok(Conv2d { in_channels, filters, kernel_size, stride, padding, kernel, bias })
    }

    /// Spatial output shape for an input of `height x width`.
    pub fn output_hw(&self, height: usize, width: usize) -> (usize, usize) {
        let (h, _) = self.padding.output_size(height, self.kernel_size, self.stride);
        let (w, _) = self.padding.output_size(width, self.kernel_size, self.stride);
        (h, w)
    }

    /// Convolves every sample of the batch; samples run in parallel.
    ///
    /// # Panics
    /// Panics if the input channel count differs from `in_channels`.
    pub fn forward(&self, input: &Tensor4) -> Tensor4 {
        assert_eq!(
            input.channels, self.in_channels,
            "conv2d expects {} input channels, got {}",
            self.in_channels, input.channels
        );
        let k = self.kernel_size;
        let f = self.filters;
        let c_in = self.in_channels;
        let (out_h, pad_top) = self.padding.output_size(input.height, k, self.stride);
        let (out_w, pad_left) = self.padding.output_size(input.width, k, self.stride);

        let mut output = Tensor4::zeros(input.batch, out_h, out_w, f);
        let sample_len = out_h * out_w * f;
        if sample_len == 0 {
            return output;
        }

        output
            .data
            .par_chunks_mut(sample_len)
            .enumerate()
            .for_each(|(n, sample)| {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let start = (oh * out_w + ow) * f;
                        let out = &mut sample[start..start + f];
                        out.copy_from_slice(&self.bias);

                        for kh in 0..k {
                            let ih = (oh * self.stride + kh) as isize - pad_top as isize;
                            if ih < 0 || ih >= input.height as isize {
                                continue;
                            }
                            for kw in 0..k {
                                let iw = (ow * self.stride + kw) as isize - pad_left as isize;
                                if iw < 0 || iw >= input.width as isize {
                                    continue;
                                }
                                let base = input.index(n, ih as usize, iw as usize, 0);
                                for ic in 0..c_in {
                                    let x = input.data[base + ic];
                                    let w_start = ((kh * k + kw) * c_in + ic) * f;
                                    let weights = &self.kernel[w_start..w_start + f];
                                    for (o, w) in out.iter_mut().zip(weights) {
                                        *o += x * w;
                                    }
                                }
                            }
                        }
                    }
                }
            });

        output
    }
}
