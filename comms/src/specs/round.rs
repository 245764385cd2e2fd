use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::OperatorSpec;

/// A contiguous index range `[offset, offset + count)` owned by one worker on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub offset: usize,
    pub count: usize,
}

impl Partition {
    /// Creates a new `Partition`.
    ///
    /// # Arguments
    /// * `offset` - The first index of the range.
    /// * `count` - The amount of indices in the range.
    ///
    /// # Returns
    /// A new `Partition` instance.
    pub fn new(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    /// The index one past the last index of the range.
    pub fn end(&self) -> usize {
        self.offset + self.count
    }

    /// The partition as a standard range.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// What to do when the forward projection has zero entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneracyPolicy {
    /// Divide as written and report every non-finite correction entry.
    #[default]
    Flag,
    /// Abort the round before the barrier if epsilon has a zero or non-finite entry.
    Reject,
    /// Add `value` to every epsilon entry in the forward step, then behave as `Flag`.
    Background { value: f64 },
}

impl DegeneracyPolicy {
    /// The value added to every forward projection entry.
    pub fn background(&self) -> f64 {
        match *self {
            Self::Background { value } => value,
            _ => 0.,
        }
    }
}

/// Everything a worker needs to take part in one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentSpec {
    /// Worker identifier assigned by the coordinator, starting at 1.
    pub worker_id: usize,
    /// Round counter, only used for observability.
    pub round: u64,
    /// The rows of the operator reduced in the forward step.
    pub rows: Partition,
    /// The columns of the operator reduced in the adjoint step.
    pub cols: Partition,
    /// Where the worker obtains the operator from.
    pub operator: OperatorSpec,
    pub degeneracy: DegeneracyPolicy,
    /// Whether a `Counts` vector follows the model, without it every count is one.
    #[serde(default)]
    pub counts: bool,
}
