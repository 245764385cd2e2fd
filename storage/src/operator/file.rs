use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use ndarray::Array2;

use super::{OperatorProvider, check_range};
use crate::{Result, StorageErr, tensor_file};

const F64_SIZE: usize = size_of::<f64>();

/// An operator stored as a rank 2 `F64` tensor in a safetensors file.
///
/// The file is read once when opened, row and column slices only decode the entries they cover.
pub struct FileOperator {
    path: PathBuf,
    tensor: String,
    bytes: Vec<u8>,
    rows: usize,
    cols: usize,
}

impl FileOperator {
    /// Opens the tensor `tensor` in the file at `path`.
    ///
    /// # Returns
    /// A new `FileOperator` or a `StorageErr` if the file is missing, unreadable,
    /// lacks the tensor or the tensor isn't a non empty `F64` matrix.
    pub fn open(path: &Path, tensor: &str) -> Result<Self> {
        let bytes = tensor_file::read(path)?;
        let (shape, _) = tensor_file::locate(path, &bytes, tensor, 2)?;
        let (rows, cols) = check_shape(path, tensor, &shape)?;

        Ok(Self {
            path: path.to_path_buf(),
            tensor: tensor.to_string(),
            bytes,
            rows,
            cols,
        })
    }

    /// The shape of the operator, read from the file header alone.
    ///
    /// # Returns
    /// The `(rows, cols)` shape or the same errors `open` reports about the header.
    pub fn shape_of(path: &Path, tensor: &str) -> Result<(usize, usize)> {
        let shape = tensor_file::read_shape(path, tensor, 2)?;
        check_shape(path, tensor, &shape)
    }

    fn data(&self) -> Result<&[u8]> {
        let (_, data) = tensor_file::locate(&self.path, &self.bytes, &self.tensor, 2)?;
        Ok(data)
    }

    fn build_matrix(&self, shape: (usize, usize), values: Vec<f64>) -> Result<Array2<f64>> {
        Array2::from_shape_vec(shape, values).map_err(|e| StorageErr::Format {
            path: self.path.clone(),
            detail: e.to_string(),
        })
    }
}

fn check_shape(path: &Path, tensor: &str, shape: &[usize]) -> Result<(usize, usize)> {
    let (rows, cols) = (shape[0], shape[1]);

    if rows == 0 || cols == 0 {
        return Err(StorageErr::InvalidSpec(format!(
            "tensor '{tensor}' in {} is empty",
            path.display()
        )));
    }

    Ok((rows, cols))
}

impl OperatorProvider for FileOperator {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn load(&self) -> Result<Array2<f64>> {
        self.load_rows(0..self.rows)
    }

    fn load_rows(&self, rows: Range<usize>) -> Result<Array2<f64>> {
        check_range("row", &rows, self.rows)?;

        let row_bytes = self.cols * F64_SIZE;
        let data = &self.data()?[rows.start * row_bytes..rows.end * row_bytes];

        let mut values = Vec::with_capacity(rows.len() * self.cols);
        tensor_file::decode_into(data, &mut values);
        self.build_matrix((rows.len(), self.cols), values)
    }

    fn load_cols(&self, cols: Range<usize>) -> Result<Array2<f64>> {
        check_range("column", &cols, self.cols)?;

        let row_bytes = self.cols * F64_SIZE;
        let data = self.data()?;

        let mut values = Vec::with_capacity(self.rows * cols.len());
        for row in data.chunks_exact(row_bytes) {
            tensor_file::decode_into(&row[cols.start * F64_SIZE..cols.end * F64_SIZE], &mut values);
        }

        self.build_matrix((self.rows, cols.len()), values)
    }
}
