//! Slice storage access.
//!
//! The session writes each chunk through a [`SliceWriter`] bound to one
//! slice, and reads the assembled slice back through it once complete.
//! [`MemoryStore`] is an in-process [`crate::transport::SliceStore`] used by
//! the simulated network and tests.

mod memory;
mod writer;

pub use memory::MemoryStore;
pub use writer::SliceWriter;

/// Status code for a write outside the slice.
pub const STATUS_OUT_OF_RANGE: i32 = -34;
/// Status code for reading a slice that was never written.
pub const STATUS_NOT_FOUND: i32 = -2;
/// Status code for an injected or generic I/O failure.
pub const STATUS_IO: i32 = -5;
