//! Chunk planning and lane partitioning.
//!
//! A plan is an ordered list of chunks that exactly tiles `[0, capacity)`.
//! Concurrent execution splits that list into contiguous index ranges, one
//! per lane, so two lanes never touch the same offsets.

use crate::error::{WipeError, WipeResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One contiguous byte range of the device, processed as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u64,
    pub offset: u64,
    pub length: u64,
}

impl Chunk {
    /// One past the last byte of this chunk
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Upper bound on chunks in one plan; the plan is held in memory
pub const MAX_CHUNKS: u64 = 1 << 22;

pub struct ChunkScheduler;

impl ChunkScheduler {
    /// Split `capacity_bytes` into `chunk_size_bytes` pieces. The last chunk
    /// carries the remainder when the capacity is not a multiple.
    pub fn plan(capacity_bytes: u64, chunk_size_bytes: u64) -> WipeResult<Vec<Chunk>> {
        let count = Self::chunk_count(capacity_bytes, chunk_size_bytes)?;
        let chunks = (0..count)
            .map(|index| {
                let offset = index * chunk_size_bytes;
                Chunk {
                    index,
                    offset,
                    length: chunk_size_bytes.min(capacity_bytes - offset),
                }
            })
            .collect();

        Ok(chunks)
    }

    /// Number of chunks `plan` would produce, without allocating them
    pub fn chunk_count(capacity_bytes: u64, chunk_size_bytes: u64) -> WipeResult<u64> {
        if chunk_size_bytes == 0 {
            return Err(WipeError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if capacity_bytes == 0 {
            return Err(WipeError::InvalidConfig(
                "device capacity must be greater than zero".to_string(),
            ));
        }
        let count = capacity_bytes.div_ceil(chunk_size_bytes);
        if count > MAX_CHUNKS {
            return Err(WipeError::InvalidConfig(format!(
                "{} chunks exceeds the limit of {}; use a larger chunk size",
                count, MAX_CHUNKS
            )));
        }
        Ok(count)
    }
}

/// Split `chunk_count` chunk indices into `lanes` contiguous, non-overlapping
/// ranges that together cover `0..chunk_count`. Earlier lanes take one extra
/// chunk when the count does not divide evenly. Never returns an empty range.
pub fn partition_lanes(chunk_count: usize, lanes: usize) -> Vec<Range<usize>> {
    let lanes = lanes.clamp(1, chunk_count.max(1));
    if chunk_count == 0 {
        return Vec::new();
    }

    let base = chunk_count / lanes;
    let extra = chunk_count % lanes;

    let mut ranges = Vec::with_capacity(lanes);
    let mut start = 0;
    for lane in 0..lanes {
        let len = base + usize::from(lane < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}
