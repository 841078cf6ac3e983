//! Events consumed by a session task.

use crate::node_pool::NodeKey;
use crate::slot::RequestId;
use crate::transport::{ConnError, Message};

/// What a timer was armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTag {
    /// Global deadline of the slice.
    Deadline,
    /// Per-chunk timeout of one request.
    Chunk { node: NodeKey, request: RequestId },
    /// A busy node's backoff has run out.
    Wakeup,
    /// Fallback nodes become eligible.
    FallbackWindow,
}

/// One inbound event. Each is applied as a single state transition.
#[derive(Debug)]
pub enum SessionEvent {
    Response {
        node: NodeKey,
        request: RequestId,
        message: Message,
    },
    Error {
        node: NodeKey,
        request: RequestId,
        error: ConnError,
    },
    Timer(TimerTag),
    Cancel,
}
