use serde::{Serialize, Deserialize};
use std::ops::{Add, Mul};

/// Row-major 2-D array. Batched values keep one sample per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix{
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>
}

impl Matrix{
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix{
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows]
        }
    }

    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        let cols = data.first().map_or(0, |row| row.len());
        assert!(
            data.iter().all(|row| row.len() == cols),
            "Matrix rows must all have the same length"
        );
        Matrix {
            rows: data.len(),
            cols,
            data
        }
    }

    /// Builds a matrix from a row-major flat buffer of `rows * cols` values.
    pub fn from_flat(rows: usize, cols: usize, flat: &[f64]) -> Matrix {
        assert_eq!(flat.len(), rows * cols, "flat buffer does not match {rows}x{cols}");
        if cols == 0 {
            return Matrix::zeros(rows, 0);
        }
        Matrix {
            rows,
            cols,
            data: flat.chunks(cols).map(|row| row.to_vec()).collect()
        }
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect()
        }
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| x * factor)
    }

    pub fn matmul(&self, rhs: &Matrix) -> Matrix {
        if self.cols != rhs.rows {
            panic!(
                "Matrices are of incorrect sizes: {}x{} * {}x{}",
                self.rows, self.cols, rhs.rows, rhs.cols
            )
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        for i in 0..res.rows {
            let lhs_row = &self.data[i];
            let out_row = &mut res.data[i];
            for (k, &a) in lhs_row.iter().enumerate() {
                for (out, &b) in out_row.iter_mut().zip(rhs.data[k].iter()) {
                    *out += a * b;
                }
            }
        }

        res
    }

    /// Adds `bias` to every row.
    pub fn add_row_vector(&self, bias: &[f64]) -> Matrix {
        assert_eq!(bias.len(), self.cols, "bias length must equal column count");
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter()
                .map(|row| row.iter().zip(bias).map(|(x, b)| x + b).collect())
                .collect()
        }
    }

    /// L2 norm of every row.
    pub fn row_norms(&self) -> Vec<f64> {
        self.data.iter()
            .map(|row| row.iter().map(|x| x * x).sum::<f64>().sqrt())
            .collect()
    }

    /// L2 norm of every column.
    pub fn column_norms(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.cols];
        for row in &self.data {
            for (s, x) in sums.iter_mut().zip(row) {
                *s += x * x;
            }
        }
        sums.into_iter().map(f64::sqrt).collect()
    }

    /// Divides every column by its L2 norm. A zero column yields NaN.
    pub fn normalize_columns(&self) -> Matrix {
        let norms = self.column_norms();
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter()
                .map(|row| row.iter().zip(&norms).map(|(x, n)| x / n).collect())
                .collect()
        }
    }

    /// Scales every column by `1 / sqrt(max(sum(x^2), epsilon))`.
    ///
    /// Unlike [`Matrix::normalize_columns`] a zero column stays zero.
    pub fn l2_normalize_columns(&self, epsilon: f64) -> Matrix {
        let inv: Vec<f64> = self.column_norms()
            .into_iter()
            .map(|n| 1.0 / (n * n).max(epsilon).sqrt())
            .collect();
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter()
                .map(|row| row.iter().zip(&inv).map(|(x, s)| x * s).collect())
                .collect()
        }
    }

    /// Picks `self[i][labels[i]]` for every row `i`.
    pub fn gather_labels(&self, labels: &[usize]) -> Vec<f64> {
        assert_eq!(labels.len(), self.rows, "one label per row is required");
        self.data.iter().zip(labels).map(|(row, &l)| row[l]).collect()
    }

    /// Returns a copy with `values[i]` added at `(i, labels[i])`.
    pub fn scatter_add_labels(&self, labels: &[usize], values: &[f64]) -> Matrix {
        assert_eq!(labels.len(), self.rows, "one label per row is required");
        assert_eq!(values.len(), self.rows, "one value per row is required");
        let mut res = self.clone();
        for ((row, &l), v) in res.data.iter_mut().zip(labels).zip(values) {
            row[l] += v;
        }
        res
    }

    /// Index of the largest value in every row. Ties go to the lowest index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.data.iter().map(|row| argmax(row)).collect()
    }
}

/// Index of the first maximum element. NaN entries are never selected
/// over a number; an empty slice returns 0.
pub fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in v.iter().enumerate().skip(1) {
        if x > v[best] || (v[best].is_nan() && !x.is_nan()) {
            best = i;
        }
    }
    best
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = self;
        for (row, rhs_row) in res.data.iter_mut().zip(rhs.data) {
            for (x, y) in row.iter_mut().zip(rhs_row) {
                *x += y;
            }
        }

        res
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        self.matmul(&rhs)
    }
}
