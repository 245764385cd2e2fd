use comms::specs::Partition;

use crate::error::{CoordinatorError, Result};

/// Splits `[0, n)` into `workers` contiguous partitions.
///
/// Every partition gets `n / workers` indices and the first `n % workers` get one more.
/// When `n < workers` the trailing partitions are empty.
///
/// # Arguments
/// * `n` - The size of the axis.
/// * `workers` - The amount of partitions.
///
/// # Returns
/// The partitions in worker order.
///
/// # Errors
/// Returns `CoordinatorError::Configuration` if `workers` is zero.
pub fn plan(n: usize, workers: usize) -> Result<Vec<Partition>> {
    if workers == 0 {
        return Err(CoordinatorError::Configuration(
            "cannot partition an axis among zero workers".to_string(),
        ));
    }

    let (base, remainder) = (n / workers, n % workers);
    let mut offset = 0;

    let partitions = (0..workers)
        .map(|k| {
            let count = base + usize::from(k < remainder);
            let partition = Partition::new(offset, count);
            offset += count;
            partition
        })
        .collect();

    Ok(partitions)
}
