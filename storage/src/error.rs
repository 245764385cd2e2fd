use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// The storage module's result type.
pub type Result<T> = std::result::Result<T, StorageErr>;

/// Failures while obtaining the operator or the model vector from their source.
#[derive(Debug)]
pub enum StorageErr {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    /// The file exists but is not a readable tensor container.
    Format {
        path: PathBuf,
        detail: String,
    },
    MissingTensor {
        path: PathBuf,
        tensor: String,
    },
    Dtype {
        tensor: String,
        got: String,
    },
    Rank {
        tensor: String,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    OutOfBounds {
        axis: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },
    InvalidSpec(String),
}

impl Display for StorageErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot access {}: {source}", path.display()),
            Self::Format { path, detail } => {
                write!(f, "{} is not a valid tensor file: {detail}", path.display())
            }
            Self::MissingTensor { path, tensor } => {
                write!(f, "tensor '{tensor}' not found in {}", path.display())
            }
            Self::Dtype { tensor, got } => {
                write!(f, "tensor '{tensor}' has dtype {got}, expected F64")
            }
            Self::Rank {
                tensor,
                got,
                expected,
            } => write!(f, "tensor '{tensor}' has rank {got}, expected {expected}"),
            Self::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "{what} length mismatch: got {got}, expected {expected}"),
            Self::OutOfBounds {
                axis,
                start,
                end,
                len,
            } => write!(f, "{axis} range {start}..{end} out of bounds for length {len}"),
            Self::InvalidSpec(detail) => write!(f, "invalid storage spec: {detail}"),
        }
    }
}

impl Error for StorageErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
