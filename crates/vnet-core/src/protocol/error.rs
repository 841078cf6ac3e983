//! Decode errors for FILE_FEED payloads.

/// A payload could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated payload: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("content id must be 24 chars of [0-9a-z]")]
    ContentId,
    #[error("extended info {id} has invalid length {len}")]
    ExtendedInfoLength { id: u8, len: u32 },
    #[error("chunk size {0} exceeds the protocol maximum")]
    ChunkTooLarge(u32),
}
