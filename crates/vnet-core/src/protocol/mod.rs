//! FILE_FEED wire codec.
//!
//! The transport carries typed opaque payloads; this module produces the
//! request payload for one chunk and interprets the response payload,
//! including its trailing extended-info entries.
//!
//! ```text
//! request:  <content-id 24 ascii><slice-id u16><offset u32><chunk-size u32>
//! response: <request fields><chunk-size bytes of data><extended-info>*
//! extended: <id u8><length u32><bytes>
//! ```
//! All integers are network byte order.

mod error;
mod request;
mod response;

use std::fmt;

pub use error::DecodeError;
pub use request::ChunkRequest;
pub use response::{ChunkResponse, ExtendedInfo};

/// Message type of a chunk request.
pub const FILE_FEED_REQUEST: u16 = 0x4036;
/// Message type of a chunk response.
pub const FILE_FEED_RESPONSE: u16 = 0x3938;

/// Largest chunk a node will serve in one response.
pub const MAX_FILE_FEED_CHUNK_SIZE: u32 = 51200;
/// Largest payload the connection framework carries in one message.
pub const MAX_PAYLOAD_SIZE: usize = 65535;

/// Extended info: node is busy; 4-byte payload.
pub const EXT_NODE_BUSY: u8 = 1;
/// Extended info: node does not hold the slice; no payload.
pub const EXT_NO_SLICE_AVAILABLE: u8 = 128;

/// Length of the content id field.
pub const CONTENT_ID_LEN: usize = 24;
/// Length of the fixed request header.
pub const REQUEST_LEN: usize = CONTENT_ID_LEN + 2 + 4 + 4;

/// Content identifier: 24 ASCII characters from `[0-9a-z]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentId([u8; CONTENT_ID_LEN]);

impl ContentId {
    /// Parse from text. Fails unless it is exactly 24 chars of `[0-9a-z]`.
    pub fn parse(s: &str) -> Result<Self, DecodeError> {
        Self::from_bytes(s.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != CONTENT_ID_LEN
            || !bytes
                .iter()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
        {
            return Err(DecodeError::ContentId);
        }
        let mut id = [0u8; CONTENT_ID_LEN];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; CONTENT_ID_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Only [0-9a-z] is accepted on construction.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.as_str())
    }
}

impl std::str::FromStr for ContentId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_accepts_lowercase_alnum() {
        let id = ContentId::parse("abcdefghijklmnop01234567").unwrap();
        assert_eq!(id.as_str(), "abcdefghijklmnop01234567");
        assert_eq!(id.to_string().len(), CONTENT_ID_LEN);
    }

    #[test]
    fn content_id_rejects_bad_input() {
        assert_eq!(ContentId::parse("short"), Err(DecodeError::ContentId));
        assert_eq!(
            ContentId::parse("ABCDEFGHIJKLMNOP01234567"),
            Err(DecodeError::ContentId)
        );
        assert_eq!(
            ContentId::parse("abcdefghijklmnop0123456-"),
            Err(DecodeError::ContentId)
        );
    }

    #[test]
    fn largest_response_fits_one_message() {
        assert!(REQUEST_LEN + MAX_FILE_FEED_CHUNK_SIZE as usize + 9 <= MAX_PAYLOAD_SIZE);
    }
}
