use comms::specs::{ModelSpec, OperatorSpec};
use log::debug;

use crate::{
    ConstModel, DenseOperator, DiagonalOperator, FileModel, FileOperator, InlineModel,
    ModelProvider, OperatorProvider, RampModel, Result,
    operator::{check_dims, check_row_major, uniform},
};

/// Builds the `OperatorProvider` described by `spec`.
///
/// # Arguments
/// * `spec` - The specification of the operator.
///
/// # Returns
/// A boxed provider or a `StorageErr` if the source can't be opened or its parameters are invalid.
pub fn resolve_operator(spec: &OperatorSpec) -> Result<Box<dyn OperatorProvider + Send>> {
    let provider: Box<dyn OperatorProvider + Send> = match spec {
        &OperatorSpec::Diagonal { rows, cols, value } => {
            Box::new(DiagonalOperator::new(rows, cols, value)?)
        }
        OperatorSpec::Inline { rows, cols, values } => {
            Box::new(DenseOperator::from_row_major(*rows, *cols, values.clone())?)
        }
        &OperatorSpec::Random {
            rows,
            cols,
            low,
            high,
            seed,
        } => Box::new(DenseOperator::random(rows, cols, low, high, seed)?),
        OperatorSpec::File { path, tensor } => Box::new(FileOperator::open(path, tensor)?),
    };

    let (rows, cols) = provider.shape();
    debug!(rows = rows, cols = cols; "resolved operator");
    Ok(provider)
}

/// The `(rows, cols)` shape of the operator described by `spec`, without loading it.
///
/// Synthetic operators are only validated and files only have their header read.
///
/// # Errors
/// The same `StorageErr` `resolve_operator` would report about the shape or the parameters.
pub fn operator_shape(spec: &OperatorSpec) -> Result<(usize, usize)> {
    match spec {
        &OperatorSpec::Diagonal { rows, cols, .. } => check_dims(rows, cols).map(|_| (rows, cols)),
        OperatorSpec::Inline { rows, cols, values } => {
            check_row_major(*rows, *cols, values.len()).map(|_| (*rows, *cols))
        }
        &OperatorSpec::Random {
            rows,
            cols,
            low,
            high,
            ..
        } => uniform(rows, cols, low, high).map(|_| (rows, cols)),
        OperatorSpec::File { path, tensor } => FileOperator::shape_of(path, tensor),
    }
}

/// Builds the `ModelProvider` described by `spec`.
pub fn resolve_model(spec: &ModelSpec) -> Box<dyn ModelProvider + Send> {
    match spec {
        &ModelSpec::Ramp { len } => Box::new(RampModel::new(len)),
        &ModelSpec::Ones { len } => Box::new(ConstModel::new(len, 1.)),
        ModelSpec::Inline { values } => Box::new(InlineModel::new(values.clone())),
        ModelSpec::File { path, tensor } => Box::new(FileModel::new(path, tensor)),
    }
}
