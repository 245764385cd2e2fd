use std::ops::Range;

use ndarray::Array2;

use super::{OperatorProvider, check_dims, check_range};
use crate::Result;

/// A synthetic operator with `value` on the main diagonal and zeros elsewhere.
///
/// With more rows than columns the trailing rows are all zeros.
#[derive(Debug, Clone, Copy)]
pub struct DiagonalOperator {
    rows: usize,
    cols: usize,
    value: f64,
}

impl DiagonalOperator {
    /// Creates a new `DiagonalOperator`.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows.
    /// * `cols` - The amount of columns.
    /// * `value` - The value on the diagonal.
    ///
    /// # Returns
    /// A new `DiagonalOperator` or an error if a dimension is zero.
    pub fn new(rows: usize, cols: usize, value: f64) -> Result<Self> {
        check_dims(rows, cols)?;
        Ok(Self { rows, cols, value })
    }
}

impl OperatorProvider for DiagonalOperator {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn load(&self) -> Result<Array2<f64>> {
        self.load_rows(0..self.rows)
    }

    fn load_rows(&self, rows: Range<usize>) -> Result<Array2<f64>> {
        check_range("row", &rows, self.rows)?;

        let start = rows.start;
        let mut block = Array2::zeros((rows.len(), self.cols));
        for i in rows.filter(|&i| i < self.cols) {
            block[[i - start, i]] = self.value;
        }

        Ok(block)
    }

    fn load_cols(&self, cols: Range<usize>) -> Result<Array2<f64>> {
        check_range("column", &cols, self.cols)?;

        let start = cols.start;
        let mut block = Array2::zeros((self.rows, cols.len()));
        for j in cols.filter(|&j| j < self.rows) {
            block[[j, j - start]] = self.value;
        }

        Ok(block)
    }
}
