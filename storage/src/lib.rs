mod builder;
mod error;
mod model;
pub mod operator;
mod tensor_file;

pub use builder::{operator_shape, resolve_model, resolve_operator};
pub use error::{Result, StorageErr};
pub use model::{ConstModel, FileModel, InlineModel, ModelProvider, RampModel};
pub use operator::{DenseOperator, DiagonalOperator, FileOperator, OperatorProvider};
pub use tensor_file::{save_model, save_operator};
