//! Offset writer for one slice's storage area.

use std::sync::Arc;

use crate::transport::{Slice, SliceStore, StorageError, TransportContext};

use super::STATUS_OUT_OF_RANGE;

/// Writer bound to one slice of one content. Cheap to clone.
#[derive(Clone)]
pub struct SliceWriter {
    store: Arc<dyn SliceStore>,
    ctx: Arc<TransportContext>,
    slice: Slice,
}

impl SliceWriter {
    pub fn new(store: Arc<dyn SliceStore>, ctx: Arc<TransportContext>, slice: Slice) -> Self {
        Self { store, ctx, slice }
    }

    pub fn slice(&self) -> &Slice {
        &self.slice
    }

    /// Write `data` at `offset`. Rejects writes that would cross the slice end.
    pub fn write_at(&self, offset: u32, data: &[u8]) -> Result<(), StorageError> {
        let end = offset as u64 + data.len() as u64;
        if end > self.slice.size as u64 {
            return Err(StorageError(STATUS_OUT_OF_RANGE));
        }
        self.store
            .store_slice_data(&self.ctx, &self.slice, data, offset)
    }

    /// Read the whole slice back from storage.
    pub fn read_all(&self) -> Result<Vec<u8>, StorageError> {
        let mut out = vec![0u8; self.slice.size as usize];
        self.store.slice_data(&self.ctx, &self.slice, &mut out)?;
        Ok(out)
    }
}

impl std::fmt::Debug for SliceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceWriter")
            .field("content", &self.ctx.content)
            .field("slice", &self.slice)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ContentId;
    use crate::storage::MemoryStore;

    fn writer(store: Arc<MemoryStore>, size: u32) -> SliceWriter {
        let ctx = Arc::new(TransportContext::new(
            ContentId::parse("movie0000000000000000001").unwrap(),
        ));
        SliceWriter::new(store, ctx, Slice { id: 3, size })
    }

    #[test]
    fn write_out_of_order_then_read_back() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(Arc::clone(&store), 12);
        w.write_at(8, b"wxyz").unwrap();
        w.write_at(0, b"abcd").unwrap();
        w.write_at(4, b"efgh").unwrap();
        assert_eq!(w.read_all().unwrap(), b"abcdefghwxyz");
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn write_past_end_rejected() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(store, 10);
        assert_eq!(
            w.write_at(8, b"abc"),
            Err(StorageError(STATUS_OUT_OF_RANGE))
        );
    }

    #[test]
    fn rejected_writes_surface_status() {
        let store = Arc::new(MemoryStore::new());
        store.reject_writes(true);
        let w = writer(store, 10);
        assert!(w.write_at(0, b"abc").is_err());
    }
}
