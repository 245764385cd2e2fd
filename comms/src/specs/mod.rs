pub mod round;
pub mod storage;

pub use round::{AssignmentSpec, DegeneracyPolicy, Partition};
pub use storage::{ModelSpec, OperatorSpec};
