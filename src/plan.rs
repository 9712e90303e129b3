//! Splits a resource into contiguous byte ranges, one per worker.

use crate::error::{DownloadError, Result};

/// A `[offset, offset + size)` slice of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub offset: u64,
    pub size: u64,
}

impl PartRange {
    /// Inclusive last byte, as used in a `Range` header. `None` for an empty range.
    pub fn last_byte(&self) -> Option<u64> {
        (self.size > 0).then(|| self.offset + self.size - 1)
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Every part gets `total / workers` bytes except the last, which absorbs
/// the remainder.
pub fn plan(total: u64, workers: usize) -> Result<Vec<PartRange>> {
    if workers == 0 {
        return Err(DownloadError::usage("worker count must be at least 1"));
    }

    let count = workers as u64;
    let base = total / count;
    let ranges = (0..count)
        .map(|i| {
            let offset = i * base;
            let size = if i == count - 1 { total - base * i } else { base };
            PartRange { offset, size }
        })
        .collect();

    Ok(ranges)
}
