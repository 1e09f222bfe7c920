//! Dense row-major feature matrix

use crate::{MathError, Result};

/// Dense feature matrix, one row per observation and one column per feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl FeatureMatrix {
    /// Create a matrix from row-major values
    pub fn new(values: Vec<f64>, n_rows: usize, n_cols: usize) -> Result<Self> {
        if values.len() != n_rows * n_cols {
            return Err(MathError::InvalidInput(format!(
                "Matrix of shape {}x{} needs {} values, got {}",
                n_rows,
                n_cols,
                n_rows * n_cols,
                values.len()
            )));
        }

        Ok(Self {
            values,
            n_rows,
            n_cols,
        })
    }

    /// Create a matrix from a list of rows with equal length
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != n_cols) {
            return Err(MathError::InvalidInput(format!(
                "Row {} has {} columns, expected {}",
                bad,
                rows[bad].len(),
                n_cols
            )));
        }

        let values = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::new(values, rows.len(), n_cols)
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Whether the matrix has no rows
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Single value
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.n_cols + col]
    }

    /// One row as a slice
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.n_cols..(row + 1) * self.n_cols]
    }

    /// New matrix holding only the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut values = Vec::with_capacity(rows.len() * self.n_cols);
        for &r in rows {
            values.extend_from_slice(self.row(r));
        }

        Self {
            values,
            n_rows: rows.len(),
            n_cols: self.n_cols,
        }
    }
}
