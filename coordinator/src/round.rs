use std::fmt;

use comms::specs::Partition;

use crate::error::{CoordinatorError, Result};

/// The steps of a round, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dispatch,
    Forward,
    Barrier,
    Adjoint,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dispatch => "dispatch",
            Self::Forward => "forward",
            Self::Barrier => "barrier",
            Self::Adjoint => "adjoint",
        };

        f.write_str(name)
    }
}

/// The result of a completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutput {
    /// The forward projection `R·M`.
    pub epsilon: Vec<f64>,
    /// `C[j] = Σ_i R[i][j] / epsilon[i]`.
    pub correction: Vec<f64>,
    /// Indices of `correction` that are NaN or infinite.
    pub non_finite: Vec<usize>,
}

/// Assembles a global vector out of the slices each worker owns.
///
/// Every worker must deliver exactly the slice its partition describes, once.
pub(crate) struct Assembler<'a> {
    what: &'static str,
    partitions: &'a [Partition],
    received: Vec<bool>,
    values: Vec<f64>,
}

impl<'a> Assembler<'a> {
    /// Creates a new `Assembler`.
    ///
    /// # Arguments
    /// * `what` - The name of the vector, for error reporting.
    /// * `partitions` - The partition of every worker, in worker order.
    pub fn new(what: &'static str, partitions: &'a [Partition]) -> Self {
        let len = partitions.last().map(Partition::end).unwrap_or_default();

        Self {
            what,
            partitions,
            received: vec![false; partitions.len()],
            values: vec![0.; len],
        }
    }

    /// Writes the slice sent by `worker_id` at `offset`.
    ///
    /// # Errors
    /// Returns `ProtocolViolation` if the slice doesn't match the worker's partition
    /// or was already received.
    pub fn insert(&mut self, worker_id: usize, offset: usize, slice: &[f64]) -> Result<()> {
        let idx = worker_id - 1;
        let expected = self.partitions[idx];

        if self.received[idx] {
            return Err(self.violation(worker_id, format!("sent its {} slice twice", self.what)));
        }

        if offset != expected.offset || slice.len() != expected.count {
            let detail = format!(
                "expected {} slice {}..{}, got {}..{}",
                self.what,
                expected.offset,
                expected.end(),
                offset,
                offset + slice.len()
            );
            return Err(self.violation(worker_id, detail));
        }

        self.values[expected.range()].copy_from_slice(slice);
        self.received[idx] = true;
        Ok(())
    }

    /// Returns the assembled vector.
    ///
    /// # Errors
    /// Returns `ProtocolViolation` if any worker's slice is missing.
    pub fn finish(self) -> Result<Vec<f64>> {
        if let Some(idx) = self.received.iter().position(|got| !got) {
            return Err(self.violation(idx + 1, format!("{} slice is missing", self.what)));
        }

        Ok(self.values)
    }

    fn violation(&self, worker_id: usize, detail: String) -> CoordinatorError {
        CoordinatorError::ProtocolViolation { worker_id, detail }
    }
}
