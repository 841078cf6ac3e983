//! Chunk range type and range planning.

use crate::protocol::MAX_FILE_FEED_CHUNK_SIZE;

/// A window `[offset, offset + length)` of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    pub offset: u32,
    pub length: u32,
}

impl ChunkRange {
    /// End offset (exclusive).
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Splits `[0, slice_size)` into contiguous ranges of at most `max_chunk_size`
/// bytes (itself capped at the protocol maximum). Every range is full-size
/// except possibly the last. Returns an empty vec for an empty slice.
pub fn plan_chunks(slice_size: u32, max_chunk_size: u32) -> Vec<ChunkRange> {
    let chunk = max_chunk_size.clamp(1, MAX_FILE_FEED_CHUNK_SIZE);
    if slice_size == 0 {
        return Vec::new();
    }

    let count = slice_size.div_ceil(chunk) as usize;
    let mut out = Vec::with_capacity(count);
    let mut offset = 0u32;
    while offset < slice_size {
        let length = chunk.min(slice_size - offset);
        out.push(ChunkRange { offset, length });
        offset += length;
    }
    out
}
