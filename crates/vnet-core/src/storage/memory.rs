//! In-memory slice store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::protocol::ContentId;
use crate::transport::{Slice, SliceStore, StorageError, TransportContext};

use super::{STATUS_IO, STATUS_NOT_FOUND, STATUS_OUT_OF_RANGE};

type Areas = HashMap<(ContentId, u16), Vec<u8>>;

/// Process-local storage areas keyed by content and slice id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    areas: Mutex<Areas>,
    reject_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn areas(&self) -> MutexGuard<'_, Areas> {
        self.areas.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent write fail (simulates a full or broken disk).
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::Relaxed);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Copy of the stored area for a slice, if any chunk was written.
    pub fn contents(&self, ctx: &TransportContext, slice: &Slice) -> Option<Vec<u8>> {
        self.areas().get(&(ctx.content, slice.id)).cloned()
    }
}

impl SliceStore for MemoryStore {
    fn store_slice_data(
        &self,
        ctx: &TransportContext,
        slice: &Slice,
        buf: &[u8],
        offset: u32,
    ) -> Result<(), StorageError> {
        if self.reject_writes.load(Ordering::Relaxed) {
            return Err(StorageError(STATUS_IO));
        }
        let start = offset as usize;
        let end = start + buf.len();
        if end > slice.size as usize {
            return Err(StorageError(STATUS_OUT_OF_RANGE));
        }
        let mut areas = self.areas();
        let area = areas
            .entry((ctx.content, slice.id))
            .or_insert_with(|| vec![0u8; slice.size as usize]);
        area[start..end].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn slice_data(
        &self,
        ctx: &TransportContext,
        slice: &Slice,
        out: &mut [u8],
    ) -> Result<(), StorageError> {
        let areas = self.areas();
        let area = areas
            .get(&(ctx.content, slice.id))
            .ok_or(StorageError(STATUS_NOT_FOUND))?;
        if out.len() != area.len() {
            return Err(StorageError(STATUS_OUT_OF_RANGE));
        }
        out.copy_from_slice(area);
        Ok(())
    }
}
