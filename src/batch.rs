//! Order-preserving batch partitioning.

use crate::{ChemSnapError, Result};

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Split `rows` into `ceil(N / batch_size)` batches preserving input order.
///
/// No row is duplicated or dropped; the last batch may be smaller. A batch
/// size of zero is an input error.
pub fn partition<T>(rows: &[T], batch_size: usize) -> Result<Vec<&[T]>> {
    if batch_size == 0 {
        return Err(ChemSnapError::InvalidInput(
            "batch size must be non-zero".into(),
        ));
    }
    Ok(rows.chunks(batch_size).collect())
}
