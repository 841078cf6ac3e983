//! Classify transport errors and FILE_FEED replies into error kinds.

use std::time::Duration;

use bytes::Bytes;

use crate::protocol::{ChunkRequest, ChunkResponse, FILE_FEED_RESPONSE};
use crate::retry::policy::ErrorKind;
use crate::transport::{ConnError, Message};

/// Usable outcome of a well-formed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Chunk data of exactly the requested length.
    Chunk(Bytes),
    /// Node is busy; the duration is its suggested backoff.
    Busy(Duration),
    /// Node does not hold the slice.
    NoSlice,
}

/// Classify a connection error reported for an outstanding request.
pub fn classify_conn_error(e: ConnError) -> ErrorKind {
    match e {
        ConnError::Timeout => ErrorKind::Timeout,
        ConnError::Destroy => ErrorKind::Destroyed,
        ConnError::Protocol => ErrorKind::Protocol,
        ConnError::Clean
        | ConnError::Connect
        | ConnError::Reset
        | ConnError::Login
        | ConnError::BadHandle
        | ConnError::CantConnect => ErrorKind::Connection,
    }
}

/// Interpret a reply to `expected`.
///
/// The echoed content, slice and offset must match the request. "No slice
/// available" wins over "node busy"; either may come with an empty payload.
/// A data reply must carry exactly the requested number of bytes.
pub fn classify_reply(message: &Message, expected: &ChunkRequest) -> Result<Reply, ErrorKind> {
    if message.msg_type != FILE_FEED_RESPONSE {
        return Err(ErrorKind::Protocol);
    }
    let response = ChunkResponse::decode(message.payload.clone()).map_err(|e| {
        tracing::debug!("undecodable reply: {}", e);
        ErrorKind::Protocol
    })?;
    let header = &response.header;
    if header.content != expected.content
        || header.slice_id != expected.slice_id
        || header.offset != expected.offset
    {
        return Err(ErrorKind::Protocol);
    }
    if response.no_slice_available() {
        return Ok(Reply::NoSlice);
    }
    if let Some(hint) = response.busy_hint() {
        return Ok(Reply::Busy(Duration::from_millis(hint as u64)));
    }
    if header.size != expected.size {
        return Err(ErrorKind::Protocol);
    }
    Ok(Reply::Chunk(response.data))
}
