//! Scripted node behaviours.

use std::time::Duration;

use bytes::Bytes;

use crate::node_pool::NodeClass;
use crate::protocol::{ChunkRequest, ChunkResponse, ContentId, ExtendedInfo};
use crate::transport::{ConnError, NodeId};

/// How a simulated node treats requests. `n` counts requests to the node,
/// starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeBehavior {
    /// Answer every request with the requested bytes.
    Serve,
    /// Never answer the first `n` requests (until the connection is destroyed).
    SilentFirst(u32),
    /// Answer the first `count` requests with "node busy" and `hint_ms`.
    BusyFirst { count: u32, hint_ms: u32 },
    /// Answer every request with "no slice available".
    NoSlice,
    /// Serve `n` requests, then reset the connection for every later one.
    ResetAfter(u32),
    /// Refuse connections.
    RefuseConnect,
    /// Echo a wrong offset.
    CorruptEcho,
    /// Fail the first `count` requests with `error` after `after_ms`
    /// instead of the node latency, then serve.
    FailFirst {
        count: u32,
        error: ConnError,
        after_ms: u64,
    },
}

/// One simulated node.
#[derive(Debug, Clone)]
pub struct SimNode {
    pub id: NodeId,
    pub class: NodeClass,
    pub latency: Duration,
    pub behavior: NodeBehavior,
}

impl SimNode {
    pub fn regular(id: impl Into<String>) -> Self {
        Self::new(id, NodeClass::Regular)
    }

    pub fn fallback(id: impl Into<String>) -> Self {
        Self::new(id, NodeClass::Fallback)
    }

    fn new(id: impl Into<String>, class: NodeClass) -> Self {
        Self {
            id: NodeId::new(id),
            class,
            latency: Duration::from_millis(10),
            behavior: NodeBehavior::Serve,
        }
    }

    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency = Duration::from_millis(ms);
        self
    }

    pub fn behavior(mut self, behavior: NodeBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

/// What the node does with its `n`-th request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Action {
    Reply(Bytes),
    Fail(ConnError),
    FailAfter(ConnError, Duration),
    Hold,
}

/// Byte at `offset` of a slice, identical on every node.
pub fn slice_byte(content: &ContentId, slice_id: u16, offset: u32) -> u8 {
    let seed = content.as_bytes().iter().fold(0u32, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(*b as u32)
    });
    (seed
        .wrapping_add(slice_id as u32 * 7)
        .wrapping_add(offset.wrapping_mul(13))
        % 251) as u8
}

/// Full contents of a slice as every simulated node serves it.
pub fn slice_bytes(content: &ContentId, slice_id: u16, size: u32) -> Vec<u8> {
    (0..size).map(|off| slice_byte(content, slice_id, off)).collect()
}

fn reply(header: ChunkRequest, data: Bytes, extended: Vec<ExtendedInfo>) -> Action {
    Action::Reply(
        ChunkResponse {
            header,
            data,
            extended,
        }
        .encode(),
    )
}

fn serve(req: &ChunkRequest) -> Action {
    let data: Vec<u8> = (req.offset..req.offset.saturating_add(req.size))
        .map(|off| slice_byte(&req.content, req.slice_id, off))
        .collect();
    reply(*req, Bytes::from(data), Vec::new())
}

fn empty(req: &ChunkRequest, info: ExtendedInfo) -> Action {
    let header = ChunkRequest { size: 0, ..*req };
    reply(header, Bytes::new(), vec![info])
}

impl NodeBehavior {
    pub(super) fn action(self, n: u32, req: &ChunkRequest) -> Action {
        match self {
            NodeBehavior::Serve => serve(req),
            NodeBehavior::SilentFirst(k) if n <= k => Action::Hold,
            NodeBehavior::SilentFirst(_) => serve(req),
            NodeBehavior::BusyFirst { count, hint_ms } if n <= count => {
                empty(req, ExtendedInfo::NodeBusy(hint_ms))
            }
            NodeBehavior::BusyFirst { .. } => serve(req),
            NodeBehavior::NoSlice => empty(req, ExtendedInfo::NoSliceAvailable),
            NodeBehavior::ResetAfter(k) if n > k => Action::Fail(ConnError::Reset),
            NodeBehavior::ResetAfter(_) => serve(req),
            NodeBehavior::RefuseConnect => Action::Fail(ConnError::CantConnect),
            NodeBehavior::CorruptEcho => {
                let header = ChunkRequest {
                    offset: req.offset.wrapping_add(1),
                    ..*req
                };
                reply(header, Bytes::from(vec![0u8; req.size as usize]), Vec::new())
            }
            NodeBehavior::FailFirst {
                count,
                error,
                after_ms,
            } if n <= count => Action::FailAfter(error, Duration::from_millis(after_ms)),
            NodeBehavior::FailFirst { .. } => serve(req),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> ChunkRequest {
        ChunkRequest {
            content: ContentId::parse("movie0000000000000000001").unwrap(),
            slice_id: 1,
            offset: 10,
            size: 5,
        }
    }

    #[test]
    fn served_bytes_match_slice_contents() {
        let r = req();
        let all = slice_bytes(&r.content, 1, 20);
        let Action::Reply(payload) = NodeBehavior::Serve.action(1, &r) else {
            panic!("expected reply");
        };
        let resp = ChunkResponse::decode(payload).unwrap();
        assert_eq!(resp.header, r);
        assert_eq!(&resp.data[..], &all[10..15]);
    }

    #[test]
    fn scripted_counts() {
        let r = req();
        assert_eq!(NodeBehavior::SilentFirst(1).action(1, &r), Action::Hold);
        assert!(matches!(NodeBehavior::SilentFirst(1).action(2, &r), Action::Reply(_)));
        assert!(matches!(NodeBehavior::ResetAfter(1).action(1, &r), Action::Reply(_)));
        assert_eq!(
            NodeBehavior::ResetAfter(1).action(2, &r),
            Action::Fail(ConnError::Reset)
        );
        let busy = NodeBehavior::BusyFirst {
            count: 1,
            hint_ms: 30,
        };
        let Action::Reply(payload) = busy.action(1, &r) else {
            panic!("expected reply");
        };
        assert_eq!(ChunkResponse::decode(payload).unwrap().busy_hint(), Some(30));

        let fail = NodeBehavior::FailFirst {
            count: 1,
            error: ConnError::Timeout,
            after_ms: 800,
        };
        assert_eq!(
            fail.action(1, &r),
            Action::FailAfter(ConnError::Timeout, Duration::from_millis(800))
        );
        assert!(matches!(fail.action(2, &r), Action::Reply(_)));
    }
}
