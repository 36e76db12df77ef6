use crate::{activation::activation::ActivationFunction, error::Result, math::init::Initializer, math::matrix::Matrix, params::ParamStore};

/// Fully connected layer: `activation(x * W + b)` on a batch of rows.
#[derive(Debug, Clone)]
pub struct Dense {
    pub units: usize,
    pub weights: Matrix,
    pub biases: Vec<f64>,
    pub activator: ActivationFunction
}

impl Dense {
    /// Looks up (or creates) `{scope}/kernel` of shape `[input_size, units]`
    /// and `{scope}/bias`.
    pub fn new(
        store: &mut ParamStore,
        scope: &str,
        input_size: usize,
        units: usize,
        activation: ActivationFunction,
    ) -> Result<Dense> {
        let weights = store
            .get_or_init(&format!("{scope}/kernel"), &[input_size, units], Initializer::XavierNormal)?
            .to_matrix();
        let biases = store
            .get_or_init(&format!("{scope}/bias"), &[units], Initializer::Zeros)?
            .data
            .clone();

        Ok(Dense {
            units,
            weights,
            biases,
            activator: activation
        })
    }

    pub fn forward(&self, input: &Matrix) -> Matrix {
        let z = input.matmul(&self.weights).add_row_vector(&self.biases);
        z.map(|x| self.activator.function(x))
    }
}
