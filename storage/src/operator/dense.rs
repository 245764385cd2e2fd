use ndarray::Array2;
use rand::{
    SeedableRng,
    distr::{Distribution, Uniform},
    rngs::StdRng,
};

use super::{OperatorProvider, check_dims};
use crate::{Result, StorageErr};

/// An operator fully held in memory.
#[derive(Debug, Clone)]
pub struct DenseOperator {
    matrix: Array2<f64>,
}

impl DenseOperator {
    /// Creates a new `DenseOperator` from an already built matrix.
    pub fn new(matrix: Array2<f64>) -> Self {
        Self { matrix }
    }

    /// Creates a new `DenseOperator` from a row major buffer.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows.
    /// * `cols` - The amount of columns.
    /// * `values` - `rows * cols` values in row major order.
    ///
    /// # Returns
    /// A new `DenseOperator` or an error if the buffer doesn't fit the shape.
    pub fn from_row_major(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        check_row_major(rows, cols, values.len())?;

        let matrix = Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| StorageErr::InvalidSpec(e.to_string()))?;

        Ok(Self { matrix })
    }

    /// Creates a new `DenseOperator` sampled uniformly from `[low, high)`.
    ///
    /// The same `seed` always yields the same matrix, so independent processes
    /// resolving the same spec agree on every entry.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows.
    /// * `cols` - The amount of columns.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    /// * `seed` - The seed of the generator.
    ///
    /// # Returns
    /// A new `DenseOperator` or an error if the range or the shape is invalid.
    pub fn random(rows: usize, cols: usize, low: f64, high: f64, seed: u64) -> Result<Self> {
        let distribution = uniform(rows, cols, low, high)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let matrix = Array2::from_shape_fn((rows, cols), |_| distribution.sample(&mut rng));

        Ok(Self { matrix })
    }
}

/// Checks that `len` row major values fill a `(rows, cols)` matrix.
pub(crate) fn check_row_major(rows: usize, cols: usize, len: usize) -> Result<()> {
    check_dims(rows, cols)?;

    if len != rows * cols {
        return Err(StorageErr::ShapeMismatch {
            what: "inline operator",
            got: len,
            expected: rows * cols,
        });
    }

    Ok(())
}

/// Validates the parameters of a random operator and builds its distribution.
pub(crate) fn uniform(rows: usize, cols: usize, low: f64, high: f64) -> Result<Uniform<f64>> {
    check_dims(rows, cols)?;
    Uniform::new(low, high).map_err(|e| StorageErr::InvalidSpec(e.to_string()))
}

impl OperatorProvider for DenseOperator {
    fn shape(&self) -> (usize, usize) {
        self.matrix.dim()
    }

    fn load(&self) -> Result<Array2<f64>> {
        Ok(self.matrix.clone())
    }
}
