use std::{error::Error, fmt, io};

use storage::StorageErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    /// The operator for the assignment couldn't be obtained.
    Storage(StorageErr),
    UnexpectedMessage {
        stage: &'static str,
        got: &'static str,
    },
    LengthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// The coordinator aborted the round.
    Aborted(String),
}

impl WorkerErr {
    /// Whether the failure only concerns the current round, leaving the channel usable.
    pub fn is_round_local(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::LengthMismatch { .. } | Self::Aborted(_)
        )
    }
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Storage(e) => write!(f, "storage error: {e}"),
            WorkerErr::UnexpectedMessage { stage, got } => {
                write!(f, "unexpected message while {stage}: got {got}")
            }
            WorkerErr::LengthMismatch {
                what,
                got,
                expected,
            } => write!(f, "{what} length mismatch: got {got}, expected {expected}"),
            WorkerErr::Aborted(reason) => write!(f, "round aborted by coordinator: {reason}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<StorageErr> for WorkerErr {
    fn from(value: StorageErr) -> Self {
        Self::Storage(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
