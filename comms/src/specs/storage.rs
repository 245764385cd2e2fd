use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn response_tensor() -> String {
    "response_matrix".to_string()
}

fn model_tensor() -> String {
    "sky_model".to_string()
}

/// The specification of where the response operator comes from.
///
/// Every participant resolves it on its own, nothing but this description
/// ever crosses process boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorSpec {
    /// `value` on the main diagonal, zero elsewhere.
    Diagonal { rows: usize, cols: usize, value: f64 },
    /// A dense row major matrix carried inline.
    Inline {
        rows: usize,
        cols: usize,
        values: Vec<f64>,
    },
    /// A dense matrix sampled uniformly from `[low, high)` with a seeded generator.
    Random {
        rows: usize,
        cols: usize,
        low: f64,
        high: f64,
        seed: u64,
    },
    /// A rank 2 `F64` tensor inside a safetensors file.
    File {
        path: PathBuf,
        #[serde(default = "response_tensor")]
        tensor: String,
    },
}

/// The specification of where the model vector comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    /// `M[j] = j + 1`.
    Ramp { len: usize },
    Ones { len: usize },
    Inline { values: Vec<f64> },
    /// A rank 1 `F64` tensor inside a safetensors file.
    File {
        path: PathBuf,
        #[serde(default = "model_tensor")]
        tensor: String,
    },
}
