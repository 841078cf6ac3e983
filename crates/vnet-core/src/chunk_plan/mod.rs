//! Chunk planning for one slice.
//!
//! Splits a slice into request-sized ranges and tracks, for every range,
//! whether it is pending, in flight to a node, or complete. The three classes
//! always partition the slice: together they cover `[0, size)` exactly once.

mod plan;
mod range;

pub use plan::{ChunkId, ChunkPlan, ChunkPlanError, ChunkState};
pub use range::{plan_chunks, ChunkRange};
