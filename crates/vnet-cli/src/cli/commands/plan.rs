//! `vnet plan` – print the chunk plan of a slice.

use anyhow::{bail, Result};
use vnet_core::chunk_plan::plan_chunks;
use vnet_core::protocol::MAX_FILE_FEED_CHUNK_SIZE;

pub fn run_plan(size: u32, max_chunk: u32) -> Result<()> {
    if size == 0 {
        bail!("slice size must be positive");
    }
    if max_chunk == 0 || max_chunk > MAX_FILE_FEED_CHUNK_SIZE {
        bail!("chunk size must be between 1 and {}", MAX_FILE_FEED_CHUNK_SIZE);
    }
    let ranges = plan_chunks(size, max_chunk);
    println!("{:<6} {:<10} {}", "CHUNK", "OFFSET", "LENGTH");
    for (i, r) in ranges.iter().enumerate() {
        println!("{:<6} {:<10} {}", i, r.offset, r.length);
    }
    println!("{} chunks of at most {} bytes", ranges.len(), max_chunk);
    Ok(())
}
