use rayon::prelude::*;

use crate::GraphAlgoError;

/// Row-major matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut matrix = Self::zeros(size, size);
        for index in 0..size {
            matrix.set(index, index, 1.0);
        }
        matrix
    }

    /// Every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, GraphAlgoError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in &rows {
            if row.len() != cols {
                return Err(GraphAlgoError::DimensionMismatch {
                    expected: format!("{cols} columns"),
                    found: format!("{} columns", row.len()),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|row| self.row(row).to_vec()).collect()
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|value| f(*value)).collect(),
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.is_square()
            && (0..self.rows).all(|row| (0..row).all(|col| self.get(row, col) == self.get(col, row)))
    }

    /// Rows of the product are computed in parallel.
    pub fn matmul(&self, other: &Self) -> Result<Self, GraphAlgoError> {
        if self.cols != other.rows {
            return Err(GraphAlgoError::DimensionMismatch {
                expected: format!("{} rows", self.cols),
                found: format!("{} rows", other.rows),
            });
        }
        let mut product = Self::zeros(self.rows, other.cols);
        if other.cols == 0 {
            return Ok(product);
        }
        product
            .data
            .par_chunks_mut(other.cols)
            .enumerate()
            .for_each(|(row, out)| {
                for (k, left) in self.row(row).iter().enumerate() {
                    if *left == 0.0 {
                        continue;
                    }
                    for (slot, right) in out.iter_mut().zip(other.row(k)) {
                        *slot += left * right;
                    }
                }
            });
        Ok(product)
    }

    pub fn power(&self, exponent: u32) -> Result<Self, GraphAlgoError> {
        if !self.is_square() {
            return Err(GraphAlgoError::DimensionMismatch {
                expected: "square matrix".to_owned(),
                found: format!("{}x{}", self.rows, self.cols),
            });
        }
        let mut result = Self::identity(self.rows);
        for _ in 0..exponent {
            result = result.matmul(self)?;
        }
        Ok(result)
    }

    /// Scales every column to sum to one; all-zero columns stay zero.
    pub fn normalize_columns(&mut self) {
        for col in 0..self.cols {
            let sum: f64 = (0..self.rows).map(|row| self.get(row, col).abs()).sum();
            if sum > 0.0 {
                for row in 0..self.rows {
                    let value = self.get(row, col);
                    self.set(row, col, value / sum);
                }
            }
        }
    }

    /// Element-wise `|a - b| <= atol + rtol * |b|`.
    pub fn all_close(&self, other: &Self, rtol: f64, atol: f64) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(left, right)| (left - right).abs() <= atol + rtol * right.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_rows_are_rejected() {
        let err = DenseMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).expect_err("ragged");

        assert!(matches!(err, GraphAlgoError::DimensionMismatch { .. }));
    }

    #[test]
    fn matmul_and_power_follow_linear_algebra() {
        let matrix = DenseMatrix::from_rows(vec![vec![1.0, 1.0], vec![0.0, 1.0]]).expect("matrix");

        let cubed = matrix.power(3).expect("power");

        assert_eq!(cubed.to_rows(), vec![vec![1.0, 3.0], vec![0.0, 1.0]]);
        assert_eq!(matrix.power(0).expect("identity"), DenseMatrix::identity(2));
        let wide = DenseMatrix::zeros(2, 3);
        assert!(wide.matmul(&matrix).is_err());
    }

    #[test]
    fn column_normalization_skips_empty_columns() {
        let mut matrix =
            DenseMatrix::from_rows(vec![vec![1.0, 0.0], vec![3.0, 0.0]]).expect("matrix");

        matrix.normalize_columns();

        assert_eq!(matrix.to_rows(), vec![vec![0.25, 0.0], vec![0.75, 0.0]]);
    }
}
