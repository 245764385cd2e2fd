use std::{error::Error, fmt, io};

use storage::StorageErr;

use crate::round::Phase;

/// The coordinator module's result type.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// All errors that can occur while driving a round.
#[derive(Debug)]
pub enum CoordinatorError {
    /// Invalid configuration, caught before any message is exchanged.
    Configuration(String),
    Storage(StorageErr),
    /// A worker link was closed or failed mid round.
    CommunicationFailure {
        worker_id: usize,
        source: io::Error,
    },
    /// A worker didn't answer within the phase timeout.
    Timeout { phase: Phase },
    /// A worker sent something the round protocol doesn't allow at that point.
    ProtocolViolation { worker_id: usize, detail: String },
    /// A worker reported that it couldn't complete its part of the round.
    WorkerFailed { worker_id: usize, detail: String },
    /// The forward projection has zero or non-finite entries at `rows`.
    NumericDegeneracy { rows: Vec<usize> },
    /// A previous round failed, the worker links are in an unknown state.
    Poisoned,
    Io(io::Error),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::CommunicationFailure { worker_id, source } => {
                write!(f, "communication with worker {worker_id} failed: {source}")
            }
            Self::Timeout { phase } => write!(f, "timed out during the {phase} phase"),
            Self::ProtocolViolation { worker_id, detail } => {
                write!(f, "protocol violation by worker {worker_id}: {detail}")
            }
            Self::WorkerFailed { worker_id, detail } => {
                write!(f, "worker {worker_id} failed: {detail}")
            }
            Self::NumericDegeneracy { rows } => {
                write!(f, "forward projection is degenerate at rows {rows:?}")
            }
            Self::Poisoned => write!(f, "coordinator is poisoned by a previous failed round"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::CommunicationFailure { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CoordinatorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<StorageErr> for CoordinatorError {
    fn from(e: StorageErr) -> Self {
        Self::Storage(e)
    }
}
