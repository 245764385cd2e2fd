//! Reading and writing `F64` tensors in the safetensors container format.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};

use ndarray::ArrayView2;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};
use serde::Deserialize;

use crate::{Result, StorageErr};

const F64_SIZE: usize = size_of::<f64>();
const HEADER_LEN_SIZE: usize = size_of::<u64>();
const MAX_HEADER_LEN: usize = 100 << 20;

/// The per tensor entry of a container header.
#[derive(Deserialize)]
struct TensorInfo {
    dtype: String,
    shape: Vec<usize>,
}

/// Reads the raw bytes of a tensor file.
pub(crate) fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| StorageErr::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Finds `tensor` inside an already read container and checks its dtype and rank.
///
/// # Arguments
/// * `path` - The path the bytes were read from, for error reporting.
/// * `bytes` - The full contents of the file.
/// * `tensor` - The name of the tensor.
/// * `rank` - The expected rank.
///
/// # Returns
/// The shape of the tensor and its little endian data.
pub(crate) fn locate<'a>(
    path: &Path,
    bytes: &'a [u8],
    tensor: &str,
    rank: usize,
) -> Result<(Vec<usize>, &'a [u8])> {
    let container = SafeTensors::deserialize(bytes).map_err(|e| StorageErr::Format {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let view = container
        .tensor(tensor)
        .map_err(|_| StorageErr::MissingTensor {
            path: path.to_path_buf(),
            tensor: tensor.to_string(),
        })?;

    if view.dtype() != Dtype::F64 {
        return Err(StorageErr::Dtype {
            tensor: tensor.to_string(),
            got: format!("{:?}", view.dtype()),
        });
    }

    if view.shape().len() != rank {
        return Err(StorageErr::Rank {
            tensor: tensor.to_string(),
            got: view.shape().len(),
            expected: rank,
        });
    }

    Ok((view.shape().to_vec(), view.data()))
}

/// Reads only the header of a container and returns the shape of `tensor`.
///
/// The data section is never read, a large operator costs as much as a small one.
///
/// # Arguments
/// * `path` - The path of the file.
/// * `tensor` - The name of the tensor.
/// * `rank` - The expected rank.
///
/// # Returns
/// The shape of the tensor or a `StorageErr` if the header is unreadable or the
/// tensor is missing, isn't `F64` or has another rank.
pub(crate) fn read_shape(path: &Path, tensor: &str, rank: usize) -> Result<Vec<usize>> {
    let io_err = |source| StorageErr::Io {
        path: path.to_path_buf(),
        source,
    };
    let format_err = |detail: String| StorageErr::Format {
        path: path.to_path_buf(),
        detail,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut len_buf = [0; HEADER_LEN_SIZE];
    file.read_exact(&mut len_buf).map_err(io_err)?;

    let len = usize::try_from(u64::from_le_bytes(len_buf))
        .ok()
        .filter(|&len| len <= MAX_HEADER_LEN)
        .ok_or_else(|| format_err("header length out of range".to_string()))?;

    let mut header = vec![0; len];
    file.read_exact(&mut header).map_err(io_err)?;

    let mut entries: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&header).map_err(|e| format_err(e.to_string()))?;

    let entry = entries
        .remove(tensor)
        .ok_or_else(|| StorageErr::MissingTensor {
            path: path.to_path_buf(),
            tensor: tensor.to_string(),
        })?;
    let info: TensorInfo = serde_json::from_value(entry).map_err(|e| format_err(e.to_string()))?;

    if info.dtype != "F64" {
        return Err(StorageErr::Dtype {
            tensor: tensor.to_string(),
            got: info.dtype,
        });
    }

    if info.shape.len() != rank {
        return Err(StorageErr::Rank {
            tensor: tensor.to_string(),
            got: info.shape.len(),
            expected: rank,
        });
    }

    Ok(info.shape)
}

/// Decodes little endian `f64` values, appending them to `out`.
pub(crate) fn decode_into(bytes: &[u8], out: &mut Vec<f64>) {
    out.extend(bytes.chunks_exact(F64_SIZE).map(|chunk| {
        let mut raw = [0; F64_SIZE];
        raw.copy_from_slice(chunk);
        f64::from_le_bytes(raw)
    }));
}

fn encode<'a>(values: impl IntoIterator<Item = &'a f64>) -> Vec<u8> {
    values.into_iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn write(path: &Path, tensor: &str, shape: Vec<usize>, data: &[u8]) -> Result<()> {
    let format_err = |e: safetensors::SafeTensorError| StorageErr::Format {
        path: PathBuf::from(path),
        detail: e.to_string(),
    };

    let view = TensorView::new(Dtype::F64, shape, data).map_err(format_err)?;
    safetensors::serialize_to_file([(tensor, view)], &None, path).map_err(format_err)
}

/// Writes an operator as a rank 2 `F64` tensor named `tensor`.
///
/// # Arguments
/// * `path` - The file to create or overwrite.
/// * `tensor` - The name of the tensor inside the file.
/// * `matrix` - The operator.
///
/// # Returns
/// A `StorageErr` if the file can't be written.
pub fn save_operator(path: &Path, tensor: &str, matrix: ArrayView2<'_, f64>) -> Result<()> {
    let (rows, cols) = matrix.dim();
    write(path, tensor, vec![rows, cols], &encode(matrix.iter()))
}

/// Writes a model vector as a rank 1 `F64` tensor named `tensor`.
pub fn save_model(path: &Path, tensor: &str, values: &[f64]) -> Result<()> {
    write(path, tensor, vec![values.len()], &encode(values))
}
