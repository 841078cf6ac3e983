//! FILE_FEED_REQUEST encoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{ContentId, DecodeError, CONTENT_ID_LEN, MAX_FILE_FEED_CHUNK_SIZE, REQUEST_LEN};

/// One chunk request: which bytes of which slice of which content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRequest {
    pub content: ContentId,
    pub slice_id: u16,
    pub offset: u32,
    pub size: u32,
}

impl ChunkRequest {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REQUEST_LEN);
        self.put(&mut buf);
        buf.freeze()
    }

    pub(super) fn put(&self, buf: &mut BytesMut) {
        buf.put_slice(self.content.as_bytes());
        buf.put_u16(self.slice_id);
        buf.put_u32(self.offset);
        buf.put_u32(self.size);
    }

    /// Decode the fixed header, advancing `buf` past it.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, DecodeError> {
        if buf.remaining() < REQUEST_LEN {
            return Err(DecodeError::Truncated {
                needed: REQUEST_LEN,
                available: buf.remaining(),
            });
        }
        let mut id = [0u8; CONTENT_ID_LEN];
        buf.copy_to_slice(&mut id);
        let content = ContentId::from_bytes(&id)?;
        let slice_id = buf.get_u16();
        let offset = buf.get_u32();
        let size = buf.get_u32();
        if size > MAX_FILE_FEED_CHUNK_SIZE {
            return Err(DecodeError::ChunkTooLarge(size));
        }
        Ok(Self {
            content,
            slice_id,
            offset,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> ContentId {
        ContentId::parse("movie0000000000000000042").unwrap()
    }

    #[test]
    fn encode_layout_is_network_order() {
        let req = ChunkRequest {
            content: content(),
            slice_id: 0x0102,
            offset: 0x0304_0506,
            size: 51200,
        };
        let bytes = req.encode();
        assert_eq!(bytes.len(), REQUEST_LEN);
        assert_eq!(&bytes[..24], b"movie0000000000000000042");
        assert_eq!(&bytes[24..26], &[0x01, 0x02]);
        assert_eq!(&bytes[26..30], &[0x03, 0x04, 0x05, 0x06]);
        assert_eq!(&bytes[30..34], &51200u32.to_be_bytes());
        let mut rd = bytes.clone();
        assert_eq!(ChunkRequest::decode(&mut rd).unwrap(), req);
    }

    #[test]
    fn decode_rejects_short_and_oversized() {
        let mut short = Bytes::from_static(b"movie");
        assert!(matches!(
            ChunkRequest::decode(&mut short),
            Err(DecodeError::Truncated { needed: REQUEST_LEN, available: 5 })
        ));

        let req = ChunkRequest {
            content: content(),
            slice_id: 1,
            offset: 0,
            size: MAX_FILE_FEED_CHUNK_SIZE + 1,
        };
        let mut bytes = req.encode();
        assert_eq!(
            ChunkRequest::decode(&mut bytes),
            Err(DecodeError::ChunkTooLarge(MAX_FILE_FEED_CHUNK_SIZE + 1))
        );
    }
}
