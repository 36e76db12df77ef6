use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// How a freshly created parameter is filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    /// Truncated normal with stddev `sqrt(1.3 * 2 / (fan_in + fan_out))`.
    /// Samples beyond two standard deviations are redrawn.
    XavierNormal,
    /// Uniform on `[-limit, limit]` with `limit = sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
    Zeros,
    Ones,
    Constant(f64),
}

impl Initializer {
    /// Fills a parameter of `shape`.
    ///
    /// Fan counts follow the usual kernel layout: for a 2-D `[in, out]`
    /// matrix they are the two dimensions, for a `[kh, kw, in, out]`
    /// convolution kernel the receptive field `kh * kw` multiplies both.
    pub fn sample<R: Rng + ?Sized>(&self, shape: &[usize], rng: &mut R) -> Vec<f64> {
        let len: usize = shape.iter().product();
        match *self {
            Initializer::XavierNormal => {
                let (fan_in, fan_out) = fans(shape);
                let std_dev = (1.3 * 2.0 / (fan_in + fan_out) as f64).sqrt();
                (0..len)
                    .map(|_| truncated_standard_normal(rng) * std_dev)
                    .collect()
            }
            Initializer::XavierUniform => {
                let (fan_in, fan_out) = fans(shape);
                let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
                (0..len).map(|_| rng.gen_range(-limit..=limit)).collect()
            }
            Initializer::Zeros => vec![0.0; len],
            Initializer::Ones => vec![1.0; len],
            Initializer::Constant(value) => vec![value; len],
        }
    }
}

/// Returns `(fan_in, fan_out)` for a parameter shape.
pub fn fans(shape: &[usize]) -> (usize, usize) {
    match shape {
        [] => (1, 1),
        [n] => (*n, *n),
        [fan_in, fan_out] => (*fan_in, *fan_out),
        _ => {
            let receptive: usize = shape[..shape.len() - 2].iter().product();
            let fan_in = shape[shape.len() - 2] * receptive;
            let fan_out = shape[shape.len() - 1] * receptive;
            (fan_in, fan_out)
        }
    }
}

/// Samples N(0, 1) with the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // (0, 1] keeps ln() finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn truncated_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let x = standard_normal(rng);
        if x.abs() <= 2.0 {
            return x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn conv_kernel_fans_include_receptive_field() {
        assert_eq!(fans(&[5, 5, 32, 64]), (800, 1600));
        assert_eq!(fans(&[2, 10]), (2, 10));
    }

    #[test]
    fn xavier_normal_is_truncated() {
        let mut rng = StdRng::seed_from_u64(7);
        let shape = [5, 5, 1, 32];
        let (fan_in, fan_out) = fans(&shape);
        let bound = 2.0 * (1.3 * 2.0 / (fan_in + fan_out) as f64).sqrt();
        let values = Initializer::XavierNormal.sample(&shape, &mut rng);
        assert_eq!(values.len(), 800);
        assert!(values.iter().all(|v| v.abs() <= bound));
    }

    #[test]
    fn xavier_uniform_respects_limit() {
        let mut rng = StdRng::seed_from_u64(11);
        let limit = (6.0f64 / 12.0).sqrt();
        let values = Initializer::XavierUniform.sample(&[2, 10], &mut rng);
        assert!(values.iter().all(|v| v.abs() <= limit));
        assert!(values.iter().any(|v| *v != 0.0));
    }
}
