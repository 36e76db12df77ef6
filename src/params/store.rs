use std::collections::BTreeMap;

use log::trace;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::layers::batch_norm::MovingAverageUpdate;
use crate::math::init::Initializer;
use crate::math::matrix::Matrix;

/// A named array of trainable (or tracked) values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Param {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Param> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ModelError::DataLength { shape, expected, actual: data.len() });
        }
        Ok(Param { shape, data })
    }

    pub fn from_matrix(matrix: &Matrix) -> Param {
        Param {
            shape: vec![matrix.rows, matrix.cols],
            data: matrix.data.iter().flatten().copied().collect(),
        }
    }

    /// Views a 2-D parameter as a [`Matrix`].
    ///
    /// # Panics
    /// Panics if the parameter is not 2-D.
    pub fn to_matrix(&self) -> Matrix {
        match self.shape[..] {
            [rows, cols] => Matrix::from_flat(rows, cols, &self.data),
            _ => panic!("parameter of shape {:?} is not a matrix", self.shape),
        }
    }
}

fn fresh_rng() -> StdRng {
    StdRng::from_entropy()
}

/// Explicit storage for every parameter a [`Model`](crate::Model) reads.
///
/// Layers and loss heads look their weights up by hierarchical name
/// (`"conv1/kernel"`, `"softmax/embedding_weights"`, ...). The first lookup
/// creates the parameter from its initializer; later lookups, including
/// those from a different loss head, return the same values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamStore {
    params: BTreeMap<String, Param>,
    #[serde(skip, default = "fresh_rng")]
    rng: StdRng,
}

impl Default for ParamStore {
    fn default() -> Self {
        ParamStore::new()
    }
}

impl ParamStore {
    pub fn new() -> ParamStore {
        ParamStore { params: BTreeMap::new(), rng: fresh_rng() }
    }

    /// Store whose initializers draw from a fixed seed.
    pub fn seeded(seed: u64) -> ParamStore {
        ParamStore { params: BTreeMap::new(), rng: StdRng::seed_from_u64(seed) }
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    /// Inserts or replaces a parameter, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, param: Param) -> Option<Param> {
        self.params.insert(name.into(), param)
    }

    /// Returns the parameter called `name`, creating it with `initializer`
    /// if the store does not hold it yet.
    pub fn get_or_init(
        &mut self,
        name: &str,
        shape: &[usize],
        initializer: Initializer,
    ) -> Result<&Param> {
        let existing = self.params.get(name).map(|p| p.shape.clone());
        match existing {
            Some(existing) if existing != shape => {
                return Err(ModelError::ShapeConflict {
                    name: name.to_string(),
                    existing,
                    requested: shape.to_vec(),
                });
            }
            Some(_) => {}
            None => {
                trace!("creating parameter {name} {shape:?} with {initializer:?}");
                let data = initializer.sample(shape, &mut self.rng);
                self.params.insert(name.to_string(), Param { shape: shape.to_vec(), data });
            }
        }
        Ok(&self.params[name])
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// `sum(0.5 * w^2)` over every parameter whose name ends with `suffix`.
    pub fn l2_loss(&self, suffix: &str) -> f64 {
        self.params
            .iter()
            .filter(|(name, _)| name.ends_with(suffix))
            .map(|(_, p)| 0.5 * p.data.iter().map(|w| w * w).sum::<f64>())
            .sum()
    }

    /// Folds recorded batch statistics into the moving averages:
    /// `moving = momentum * moving + (1 - momentum) * batch`.
    ///
    /// Updates naming a parameter the store does not hold are skipped.
    pub fn apply_moving_averages(&mut self, updates: &[MovingAverageUpdate], momentum: f64) {
        for update in updates {
            for (name, batch) in [
                (&update.mean_name, &update.mean),
                (&update.variance_name, &update.variance),
            ] {
                if let Some(param) = self.params.get_mut(name) {
                    for (moving, value) in param.data.iter_mut().zip(batch) {
                        *moving = momentum * *moving + (1.0 - momentum) * value;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn get_or_init_reuses_existing_values() {
        let mut store = ParamStore::seeded(3);
        let first = store.get_or_init("w", &[2, 3], Initializer::XavierUniform).unwrap().clone();
        let second = store.get_or_init("w", &[2, 3], Initializer::Zeros).unwrap();
        assert_eq!(&first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_or_init_rejects_shape_change() {
        let mut store = ParamStore::seeded(3);
        store.get_or_init("w", &[2, 3], Initializer::Zeros).unwrap();
        let err = store.get_or_init("w", &[3, 2], Initializer::Zeros).unwrap_err();
        assert!(matches!(err, ModelError::ShapeConflict { .. }));
    }

    #[test]
    fn seeded_stores_initialize_identically() {
        let mut a = ParamStore::seeded(42);
        let mut b = ParamStore::seeded(42);
        let pa = a.get_or_init("k", &[5, 5, 1, 4], Initializer::XavierNormal).unwrap();
        let pb = b.get_or_init("k", &[5, 5, 1, 4], Initializer::XavierNormal).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn l2_loss_only_counts_matching_names() {
        let mut store = ParamStore::seeded(0);
        store.insert("a/kernel", Param::new(vec![2], vec![1.0, 2.0]).unwrap());
        store.insert("a/bias", Param::new(vec![1], vec![10.0]).unwrap());
        assert_abs_diff_eq!(store.l2_loss("/kernel"), 2.5);
    }

    #[test]
    fn moving_averages_blend_with_momentum() {
        let mut store = ParamStore::seeded(0);
        store.insert("bn/moving_mean", Param::new(vec![2], vec![0.0, 0.0]).unwrap());
        store.insert("bn/moving_variance", Param::new(vec![2], vec![1.0, 1.0]).unwrap());
        let update = MovingAverageUpdate {
            mean_name: "bn/moving_mean".into(),
            variance_name: "bn/moving_variance".into(),
            mean: vec![1.0, -1.0],
            variance: vec![3.0, 1.0],
        };
        store.apply_moving_averages(&[update], 0.9);
        let mean = &store.get("bn/moving_mean").unwrap().data;
        let var = &store.get("bn/moving_variance").unwrap().data;
        assert_abs_diff_eq!(mean[0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(mean[1], -0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(var[0], 1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(var[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn param_matrix_round_trip_preserves_layout() {
        let m = Matrix::from_data(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let p = Param::from_matrix(&m);
        assert_eq!(p.shape, vec![2, 3]);
        assert_eq!(p.to_matrix(), m);
    }
}
