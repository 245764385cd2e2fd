mod dense;
mod diagonal;
mod file;

use std::ops::Range;

use ndarray::{Array2, s};

use crate::{Result, StorageErr};

pub(crate) use dense::{check_row_major, uniform};
pub use dense::DenseOperator;
pub use diagonal::DiagonalOperator;
pub use file::FileOperator;

/// Read access to a dense response operator of shape `(rows, cols)`.
///
/// Only `shape` and `load` are required, the slice accessors default to slicing
/// the full matrix. Implementors that can produce a slice cheaper should override them.
pub trait OperatorProvider {
    /// The `(rows, cols)` shape of the operator.
    fn shape(&self) -> (usize, usize);

    /// Should load the entire operator.
    fn load(&self) -> Result<Array2<f64>>;

    /// Loads the rows in `rows` with every column.
    ///
    /// # Arguments
    /// * `rows` - The range of rows to load.
    ///
    /// # Returns
    /// A `(rows.len(), cols)` matrix or an error if the range is out of bounds.
    fn load_rows(&self, rows: Range<usize>) -> Result<Array2<f64>> {
        check_range("row", &rows, self.shape().0)?;
        Ok(self.load()?.slice(s![rows, ..]).to_owned())
    }

    /// Loads the columns in `cols` with every row.
    ///
    /// # Arguments
    /// * `cols` - The range of columns to load.
    ///
    /// # Returns
    /// A `(rows, cols.len())` matrix or an error if the range is out of bounds.
    fn load_cols(&self, cols: Range<usize>) -> Result<Array2<f64>> {
        check_range("column", &cols, self.shape().1)?;
        Ok(self.load()?.slice(s![.., cols]).to_owned())
    }
}

/// Checks that `range` lies within `[0, len)`.
pub(crate) fn check_range(axis: &'static str, range: &Range<usize>, len: usize) -> Result<()> {
    if range.start > range.end || range.end > len {
        return Err(StorageErr::OutOfBounds {
            axis,
            start: range.start,
            end: range.end,
            len,
        });
    }

    Ok(())
}

/// Checks that both dimensions of a synthetic operator are positive.
pub(crate) fn check_dims(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(StorageErr::InvalidSpec(format!(
            "operator dimensions must be positive, got {rows}x{cols}"
        )));
    }

    Ok(())
}
