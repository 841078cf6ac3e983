//! Collaborator contracts consumed by the slice downloader.
//!
//! Node discovery, slice storage, the connection framework and timers live
//! outside this crate. They are reached through the traits below so the
//! session can be driven by the real framework or by [`crate::sim`].
//!
//! Callbacks never run session logic: a [`ReplyHook`] or [`TimerHook`] only
//! pushes one event onto the owning session's queue.

mod conn;
mod hook;
mod timer;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::ContentId;

pub use conn::{ConnError, ConnectionHandle, Message, StorageError, TimerError, TimerHandle};
pub use hook::{EventSink, ReplyHook, TimerHook};
pub use timer::TokioTimers;

/// Identity of a node in the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One slice of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slice {
    /// Identifies the slice within its content.
    pub id: u16,
    /// Size of the slice in bytes.
    pub size: u32,
}

/// Information about the overall download job a slice belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportContext {
    pub content: ContentId,
}

impl TransportContext {
    pub fn new(content: ContentId) -> Self {
        Self { content }
    }
}

/// Returns candidate nodes holding a slice.
pub trait Discovery: Send + Sync {
    /// Regular peer nodes having the slice. May be empty.
    fn node_list(&self, ctx: &TransportContext, slice: &Slice) -> Vec<NodeId>;
    /// Server-operated fallback nodes having the slice. May be empty.
    fn fallback_node_list(&self, ctx: &TransportContext, slice: &Slice) -> Vec<NodeId>;
}

/// Storage area reserved for slice data.
pub trait SliceStore: Send + Sync {
    /// Store `buf` at `offset` within the slice.
    fn store_slice_data(
        &self,
        ctx: &TransportContext,
        slice: &Slice,
        buf: &[u8],
        offset: u32,
    ) -> Result<(), StorageError>;

    /// Copy the stored slice into `out`, which holds exactly `slice.size` bytes.
    fn slice_data(
        &self,
        ctx: &TransportContext,
        slice: &Slice,
        out: &mut [u8],
    ) -> Result<(), StorageError>;
}

/// Connection framework. At most one message may be outstanding per
/// connection; the framework does not enforce this itself.
pub trait Transport: Send + Sync {
    /// Create and establish a connection to `node`.
    fn connect(&self, node: &NodeId) -> Result<ConnectionHandle, ConnError>;

    /// Close a connection created with [`Transport::connect`]. An outstanding
    /// message may still be answered with [`ConnError::Destroy`].
    fn destroy(&self, conn: ConnectionHandle);

    /// Send `message`; exactly one of `hook.respond` / `hook.fail` is called later.
    fn send(&self, conn: ConnectionHandle, message: Message, hook: ReplyHook)
        -> Result<(), ConnError>;
}

/// One-shot millisecond timers.
pub trait Timers: Send + Sync {
    fn start(&self, delay: Duration, hook: TimerHook) -> Result<TimerHandle, TimerError>;
    /// Stop and destroy a timer. Unknown or already fired handles are ignored.
    fn cancel(&self, timer: TimerHandle);
}

/// The external collaborators a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub discovery: Arc<dyn Discovery>,
    pub store: Arc<dyn SliceStore>,
    pub timers: Arc<dyn Timers>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
