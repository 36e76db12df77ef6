use serde::{Serialize, Deserialize};

/// Element-wise activation applied after a layer's affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    ReLU,
    Identity,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            // NaN passes through unchanged.
            ActivationFunction::ReLU => if x > 0.0 || x.is_nan() { x } else { 0.0 },
            ActivationFunction::Identity => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_clamps_negatives_and_keeps_nan() {
        let relu = ActivationFunction::ReLU;
        assert_eq!(relu.function(-2.0), 0.0);
        assert_eq!(relu.function(1.5), 1.5);
        assert!(relu.function(f64::NAN).is_nan());
        assert_eq!(ActivationFunction::Identity.function(-2.0), -2.0);
    }
}
