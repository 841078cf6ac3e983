//! Per-range state tracking for a slice download.

use std::collections::BTreeSet;

use tokio::time::Instant;

use crate::node_pool::NodeKey;
use crate::storage::SliceWriter;
use crate::transport::{Slice, StorageError};

use super::range::{plan_chunks, ChunkRange};

/// Index of a range within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub usize);

/// Where a range currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Not yet requested, or re-queued after a failure.
    Pending,
    /// Requested from `node`; expected back before `deadline`.
    InFlight { node: NodeKey, deadline: Instant },
    /// Data received and stored.
    Complete,
}

impl ChunkState {
    fn name(&self) -> &'static str {
        match self {
            ChunkState::Pending => "pending",
            ChunkState::InFlight { .. } => "in-flight",
            ChunkState::Complete => "complete",
        }
    }
}

/// Misuse of the plan or a rejected write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkPlanError {
    #[error("chunk {chunk} is {state}, expected {expected}")]
    InvalidRangeState {
        chunk: usize,
        state: &'static str,
        expected: &'static str,
    },
    #[error("chunk {0} does not exist")]
    UnknownChunk(usize),
    #[error("chunk {chunk}: expected {expected} bytes, got {got}")]
    LengthMismatch { chunk: usize, expected: u32, got: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Ranges of one slice and their states.
///
/// Pending ranges are handed out lowest offset first; a failed range goes
/// back into the pending set and is therefore retried before later ranges.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    ranges: Vec<ChunkRange>,
    states: Vec<ChunkState>,
    pending: BTreeSet<usize>,
    in_flight: usize,
    completed: usize,
    completed_bytes: u64,
}

impl ChunkPlan {
    /// Plan `slice` in chunks of at most `max_chunk_size` bytes; all start pending.
    pub fn create(slice: &Slice, max_chunk_size: u32) -> Self {
        let ranges = plan_chunks(slice.size, max_chunk_size);
        let states = vec![ChunkState::Pending; ranges.len()];
        let pending = (0..ranges.len()).collect();
        Self {
            ranges,
            states,
            pending,
            in_flight: 0,
            completed: 0,
            completed_bytes: 0,
        }
    }

    /// Lowest-offset pending range, if any. Does not change its state.
    pub fn next_pending_chunk(&self) -> Option<ChunkId> {
        self.pending.first().copied().map(ChunkId)
    }

    pub fn range(&self, id: ChunkId) -> Option<ChunkRange> {
        self.ranges.get(id.0).copied()
    }

    pub fn state(&self, id: ChunkId) -> Option<&ChunkState> {
        self.states.get(id.0)
    }

    fn expect_state(
        &self,
        id: ChunkId,
        expected: &'static str,
        ok: impl Fn(&ChunkState) -> bool,
    ) -> Result<(), ChunkPlanError> {
        let state = self
            .states
            .get(id.0)
            .ok_or(ChunkPlanError::UnknownChunk(id.0))?;
        if ok(state) {
            Ok(())
        } else {
            Err(ChunkPlanError::InvalidRangeState {
                chunk: id.0,
                state: state.name(),
                expected,
            })
        }
    }

    /// Pending → in flight to `node`.
    pub fn mark_in_flight(
        &mut self,
        id: ChunkId,
        node: NodeKey,
        deadline: Instant,
    ) -> Result<(), ChunkPlanError> {
        self.expect_state(id, "pending", |s| matches!(s, ChunkState::Pending))?;
        self.pending.remove(&id.0);
        self.states[id.0] = ChunkState::InFlight { node, deadline };
        self.in_flight += 1;
        Ok(())
    }

    /// In flight → complete, storing `bytes` at the range offset first.
    /// On a storage error the range stays in flight; the caller decides.
    pub fn mark_complete(
        &mut self,
        id: ChunkId,
        bytes: &[u8],
        writer: &SliceWriter,
    ) -> Result<(), ChunkPlanError> {
        self.expect_state(id, "in-flight", |s| matches!(s, ChunkState::InFlight { .. }))?;
        let range = self.ranges[id.0];
        if bytes.len() != range.length as usize {
            return Err(ChunkPlanError::LengthMismatch {
                chunk: id.0,
                expected: range.length,
                got: bytes.len(),
            });
        }
        writer.write_at(range.offset, bytes)?;
        self.states[id.0] = ChunkState::Complete;
        self.in_flight -= 1;
        self.completed += 1;
        self.completed_bytes += range.length as u64;
        Ok(())
    }

    /// In flight → pending, so the range can be routed to another node.
    pub fn mark_failed(&mut self, id: ChunkId) -> Result<(), ChunkPlanError> {
        self.expect_state(id, "in-flight", |s| matches!(s, ChunkState::InFlight { .. }))?;
        self.states[id.0] = ChunkState::Pending;
        self.pending.insert(id.0);
        self.in_flight -= 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.ranges.len()
    }

    /// Number of ranges in the plan.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    pub fn completed_bytes(&self) -> u64 {
        self.completed_bytes
    }
}
