//! FILE_FEED_RESPONSE decoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{ChunkRequest, DecodeError, EXT_NODE_BUSY, EXT_NO_SLICE_AVAILABLE, REQUEST_LEN};

/// Trailing extended info attached to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedInfo {
    /// Node is overloaded; the payload is read as a suggested backoff in milliseconds.
    NodeBusy(u32),
    /// Node does not hold the requested slice.
    NoSliceAvailable,
    /// Any id this codec does not interpret.
    Unknown { id: u8, data: Bytes },
}

impl ExtendedInfo {
    fn id(&self) -> u8 {
        match self {
            ExtendedInfo::NodeBusy(_) => EXT_NODE_BUSY,
            ExtendedInfo::NoSliceAvailable => EXT_NO_SLICE_AVAILABLE,
            ExtendedInfo::Unknown { id, .. } => *id,
        }
    }
}

/// Decoded response: echoed request header, chunk data and extended infos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResponse {
    pub header: ChunkRequest,
    pub data: Bytes,
    pub extended: Vec<ExtendedInfo>,
}

impl ChunkResponse {
    /// Decode a full response payload. `data` shares the input buffer.
    pub fn decode(mut payload: Bytes) -> Result<Self, DecodeError> {
        let header = ChunkRequest::decode(&mut payload)?;
        let size = header.size as usize;
        if payload.remaining() < size {
            return Err(DecodeError::Truncated {
                needed: REQUEST_LEN + size,
                available: REQUEST_LEN + payload.remaining(),
            });
        }
        let data = payload.split_to(size);

        let mut extended = Vec::new();
        while payload.has_remaining() {
            if payload.remaining() < 5 {
                return Err(DecodeError::Truncated {
                    needed: 5,
                    available: payload.remaining(),
                });
            }
            let id = payload.get_u8();
            let len = payload.get_u32();
            if payload.remaining() < len as usize {
                return Err(DecodeError::Truncated {
                    needed: len as usize,
                    available: payload.remaining(),
                });
            }
            let mut body = payload.split_to(len as usize);
            let info = match id {
                EXT_NODE_BUSY if len == 4 => ExtendedInfo::NodeBusy(body.get_u32()),
                EXT_NO_SLICE_AVAILABLE if len == 0 => ExtendedInfo::NoSliceAvailable,
                EXT_NODE_BUSY | EXT_NO_SLICE_AVAILABLE => {
                    return Err(DecodeError::ExtendedInfoLength { id, len })
                }
                _ => ExtendedInfo::Unknown { id, data: body },
            };
            extended.push(info);
        }

        Ok(Self {
            header,
            data,
            extended,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REQUEST_LEN + self.data.len());
        self.header.put(&mut buf);
        buf.put_slice(&self.data);
        for info in &self.extended {
            buf.put_u8(info.id());
            match info {
                ExtendedInfo::NodeBusy(hint) => {
                    buf.put_u32(4);
                    buf.put_u32(*hint);
                }
                ExtendedInfo::NoSliceAvailable => buf.put_u32(0),
                ExtendedInfo::Unknown { data, .. } => {
                    buf.put_u32(data.len() as u32);
                    buf.put_slice(data);
                }
            }
        }
        buf.freeze()
    }

    /// Suggested backoff if the node reported itself busy.
    pub fn busy_hint(&self) -> Option<u32> {
        self.extended.iter().find_map(|info| match info {
            ExtendedInfo::NodeBusy(hint) => Some(*hint),
            _ => None,
        })
    }

    pub fn no_slice_available(&self) -> bool {
        self.extended
            .iter()
            .any(|info| matches!(info, ExtendedInfo::NoSliceAvailable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ContentId;

    fn header(size: u32) -> ChunkRequest {
        ChunkRequest {
            content: ContentId::parse("movie0000000000000000042").unwrap(),
            slice_id: 7,
            offset: 102400,
            size,
        }
    }

    #[test]
    fn decode_plain_data() {
        let resp = ChunkResponse {
            header: header(4),
            data: Bytes::from_static(b"abcd"),
            extended: Vec::new(),
        };
        let decoded = ChunkResponse::decode(resp.encode()).unwrap();
        assert_eq!(decoded.header.offset, 102400);
        assert_eq!(&decoded.data[..], b"abcd");
        assert!(decoded.extended.is_empty());
        assert_eq!(decoded.busy_hint(), None);
        assert!(!decoded.no_slice_available());
    }

    #[test]
    fn decode_extended_infos_by_hand() {
        let mut buf = BytesMut::new();
        header(0).put(&mut buf);
        buf.put_u8(EXT_NODE_BUSY);
        buf.put_u32(4);
        buf.put_u32(250);
        buf.put_u8(EXT_NO_SLICE_AVAILABLE);
        buf.put_u32(0);
        buf.put_u8(42);
        buf.put_u32(2);
        buf.put_slice(b"zz");

        let decoded = ChunkResponse::decode(buf.freeze()).unwrap();
        assert!(decoded.data.is_empty());
        assert_eq!(decoded.busy_hint(), Some(250));
        assert!(decoded.no_slice_available());
        assert_eq!(
            decoded.extended[2],
            ExtendedInfo::Unknown {
                id: 42,
                data: Bytes::from_static(b"zz")
            }
        );
    }

    #[test]
    fn decode_rejects_short_data() {
        let mut buf = BytesMut::new();
        header(10).put(&mut buf);
        buf.put_slice(b"abc");
        assert!(matches!(
            ChunkResponse::decode(buf.freeze()),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_busy_length() {
        let mut buf = BytesMut::new();
        header(0).put(&mut buf);
        buf.put_u8(EXT_NODE_BUSY);
        buf.put_u32(2);
        buf.put_slice(b"xx");
        assert_eq!(
            ChunkResponse::decode(buf.freeze()),
            Err(DecodeError::ExtendedInfoLength {
                id: EXT_NODE_BUSY,
                len: 2
            })
        );
    }
}
