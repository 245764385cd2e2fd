use std::path::{Path, PathBuf};

use crate::{Result, tensor_file};

/// Supplies the model vector for a round.
pub trait ModelProvider {
    /// Should load the whole model vector.
    fn load(&self) -> Result<Vec<f64>>;
}

/// The reference model, `M[j] = j + 1`.
#[derive(Debug, Clone, Copy)]
pub struct RampModel {
    len: usize,
}

impl RampModel {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl ModelProvider for RampModel {
    fn load(&self) -> Result<Vec<f64>> {
        Ok((1..=self.len).map(|j| j as f64).collect())
    }
}

/// A model with the same value in every entry.
#[derive(Debug, Clone, Copy)]
pub struct ConstModel {
    len: usize,
    value: f64,
}

impl ConstModel {
    pub fn new(len: usize, value: f64) -> Self {
        Self { len, value }
    }
}

impl ModelProvider for ConstModel {
    fn load(&self) -> Result<Vec<f64>> {
        Ok(vec![self.value; self.len])
    }
}

#[derive(Debug, Clone)]
pub struct InlineModel {
    values: Vec<f64>,
}

impl InlineModel {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

impl ModelProvider for InlineModel {
    fn load(&self) -> Result<Vec<f64>> {
        Ok(self.values.clone())
    }
}

/// A model stored as a rank 1 `F64` tensor in a safetensors file.
///
/// Unlike the operator the file is read on every load, so an outer loop
/// rewriting it between rounds is picked up.
#[derive(Debug, Clone)]
pub struct FileModel {
    path: PathBuf,
    tensor: String,
}

impl FileModel {
    pub fn new(path: &Path, tensor: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            tensor: tensor.to_string(),
        }
    }
}

impl ModelProvider for FileModel {
    fn load(&self) -> Result<Vec<f64>> {
        let bytes = tensor_file::read(&self.path)?;
        let (shape, data) = tensor_file::locate(&self.path, &bytes, &self.tensor, 1)?;

        let mut values = Vec::with_capacity(shape[0]);
        tensor_file::decode_into(data, &mut values);
        Ok(values)
    }
}
