//! In-process simulated network.
//!
//! [`SimNetwork`] plays transport, discovery and slice store at once. Each
//! node follows a scripted [`NodeBehavior`] and answers after its latency on
//! a tokio task, so sessions see replies out of order exactly as they would
//! from real peers. Used by the integration tests and by `vnet fetch`.

mod behavior;
mod stats;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use crate::node_pool::NodeClass;
use crate::protocol::{ChunkRequest, FILE_FEED_REQUEST, FILE_FEED_RESPONSE};
use crate::storage::MemoryStore;
use crate::transport::{
    Collaborators, ConnError, ConnectionHandle, Discovery, Message, NodeId, ReplyHook, Slice,
    SliceStore, StorageError, TokioTimers, Transport, TransportContext,
};

pub use behavior::{slice_byte, slice_bytes, NodeBehavior, SimNode};
pub use stats::{RequestRecord, SimStats};

use behavior::Action;

struct SimConn {
    node: usize,
    outstanding: u32,
    /// Hooks of requests the node never answers.
    held: Vec<ReplyHook>,
}

#[derive(Default)]
struct SimState {
    next_conn: i64,
    conns: HashMap<i64, SimConn>,
    requests: HashMap<usize, u32>,
    stats: SimStats,
}

struct Inner {
    nodes: Vec<SimNode>,
    state: Mutex<SimState>,
    store: MemoryStore,
    started: Instant,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reply is due on `conn`. False if the connection is gone.
    fn settle(&self, conn: i64) -> bool {
        match self.state().conns.get_mut(&conn) {
            Some(c) => {
                c.outstanding = c.outstanding.saturating_sub(1);
                true
            }
            None => false,
        }
    }
}

/// Simulated nodes plus the in-memory slice store. Cheap to clone.
#[derive(Clone)]
pub struct SimNetwork {
    inner: Arc<Inner>,
}

impl SimNetwork {
    pub fn new(nodes: Vec<SimNode>) -> Self {
        Self {
            inner: Arc::new(Inner {
                nodes,
                state: Mutex::new(SimState::default()),
                store: MemoryStore::new(),
                started: Instant::now(),
            }),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.inner.store
    }

    pub fn stats(&self) -> SimStats {
        self.inner.state().stats.clone()
    }

    /// Connections created and not yet destroyed.
    pub fn open_connections(&self) -> usize {
        self.inner.state().conns.len()
    }

    /// What a complete download of `slice` must produce.
    pub fn expected_slice(&self, ctx: &TransportContext, slice: &Slice) -> Vec<u8> {
        slice_bytes(&ctx.content, slice.id, slice.size)
    }

    /// This network as every collaborator, with tokio timers.
    pub fn collaborators(&self) -> Collaborators {
        let me = Arc::new(self.clone());
        Collaborators {
            transport: me.clone(),
            discovery: me.clone(),
            store: me,
            timers: Arc::new(TokioTimers::new()),
        }
    }

    fn ids(&self, class: NodeClass) -> Vec<NodeId> {
        self.inner
            .nodes
            .iter()
            .filter(|n| n.class == class)
            .map(|n| n.id.clone())
            .collect()
    }
}

impl std::fmt::Debug for SimNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimNetwork")
            .field("nodes", &self.inner.nodes)
            .finish_non_exhaustive()
    }
}

impl Discovery for SimNetwork {
    fn node_list(&self, _ctx: &TransportContext, _slice: &Slice) -> Vec<NodeId> {
        self.ids(NodeClass::Regular)
    }

    fn fallback_node_list(&self, _ctx: &TransportContext, _slice: &Slice) -> Vec<NodeId> {
        self.ids(NodeClass::Fallback)
    }
}

impl SliceStore for SimNetwork {
    fn store_slice_data(
        &self,
        ctx: &TransportContext,
        slice: &Slice,
        buf: &[u8],
        offset: u32,
    ) -> Result<(), StorageError> {
        self.inner.store.store_slice_data(ctx, slice, buf, offset)
    }

    fn slice_data(
        &self,
        ctx: &TransportContext,
        slice: &Slice,
        out: &mut [u8],
    ) -> Result<(), StorageError> {
        self.inner.store.slice_data(ctx, slice, out)
    }
}

impl Transport for SimNetwork {
    fn connect(&self, node: &NodeId) -> Result<ConnectionHandle, ConnError> {
        let index = self
            .inner
            .nodes
            .iter()
            .position(|n| &n.id == node)
            .ok_or(ConnError::CantConnect)?;
        let mut state = self.inner.state();
        if self.inner.nodes[index].behavior == NodeBehavior::RefuseConnect {
            state.stats.refused_connects += 1;
            return Err(ConnError::CantConnect);
        }
        state.next_conn += 1;
        let handle = state.next_conn;
        state.conns.insert(
            handle,
            SimConn {
                node: index,
                outstanding: 0,
                held: Vec::new(),
            },
        );
        state.stats.connects += 1;
        Ok(ConnectionHandle(handle))
    }

    fn destroy(&self, conn: ConnectionHandle) {
        let held = {
            let mut state = self.inner.state();
            let Some(c) = state.conns.remove(&conn.0) else {
                return;
            };
            state.stats.destroys += 1;
            c.held
        };
        for hook in held {
            hook.fail(ConnError::Destroy);
        }
    }

    fn send(
        &self,
        conn: ConnectionHandle,
        message: Message,
        hook: ReplyHook,
    ) -> Result<(), ConnError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConnError::Reset)?;
        if message.msg_type != FILE_FEED_REQUEST {
            return Err(ConnError::Protocol);
        }
        let req = ChunkRequest::decode(&mut message.payload.clone())
            .map_err(|_| ConnError::Protocol)?;

        let mut guard = self.inner.state();
        let state = &mut *guard;
        let c = state.conns.get_mut(&conn.0).ok_or(ConnError::BadHandle)?;
        c.outstanding += 1;
        if c.outstanding > 1 {
            state.stats.violations += 1;
        }
        state.stats.max_outstanding = state.stats.max_outstanding.max(c.outstanding);

        let node = &self.inner.nodes[c.node];
        let n = state.requests.entry(c.node).or_insert(0);
        *n += 1;
        let action = node.behavior.action(*n, &req);

        state.stats.requests += 1;
        *state
            .stats
            .requests_per_node
            .entry(node.id.to_string())
            .or_insert(0) += 1;
        state.stats.log.push(RequestRecord {
            node: node.id.to_string(),
            offset: req.offset,
            size: req.size,
            at_ms: self.inner.started.elapsed().as_millis() as u64,
        });

        if action == Action::Hold {
            c.held.push(hook);
            return Ok(());
        }
        drop(guard);

        let inner = Arc::clone(&self.inner);
        let delay = match &action {
            Action::FailAfter(_, after) => *after,
            _ => node.latency,
        };
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !inner.settle(conn.0) {
                hook.fail(ConnError::Destroy);
                return;
            }
            match action {
                Action::Reply(payload) => hook.respond(Message::new(FILE_FEED_RESPONSE, payload)),
                Action::Fail(e) | Action::FailAfter(e, _) => hook.fail(e),
                Action::Hold => {}
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::node_pool::NodeKey;
    use crate::protocol::{ChunkResponse, ContentId};
    use crate::session::SessionEvent;
    use crate::slot::RequestId;
    use crate::transport::EventSink;

    fn request(offset: u32, size: u32) -> Message {
        let req = ChunkRequest {
            content: ContentId::parse("movie0000000000000000001").unwrap(),
            slice_id: 0,
            offset,
            size,
        };
        Message::new(FILE_FEED_REQUEST, req.encode())
    }

    #[tokio::test(start_paused = true)]
    async fn serves_after_latency_and_counts_outstanding() {
        let net = SimNetwork::new(vec![SimNode::regular("a").latency_ms(50)]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let conn = net.connect(&"a".into()).unwrap();
        net.send(conn, request(0, 8), sink.reply_hook(NodeKey(0), RequestId(1)))
            .unwrap();
        net.send(conn, request(8, 8), sink.reply_hook(NodeKey(0), RequestId(2)))
            .unwrap();

        let start = Instant::now();
        let Some(SessionEvent::Response { message, .. }) = rx.recv().await else {
            panic!("expected response");
        };
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        let resp = ChunkResponse::decode(message.payload).unwrap();
        assert_eq!(resp.data.len(), 8);

        let stats = net.stats();
        assert_eq!(stats.violations, 1);
        assert_eq!(stats.max_outstanding, 2);
        assert_eq!(stats.requests_to("a"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_fails_held_requests() {
        let net = SimNetwork::new(vec![
            SimNode::regular("a").behavior(NodeBehavior::SilentFirst(5))
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let conn = net.connect(&"a".into()).unwrap();
        net.send(conn, request(0, 8), sink.reply_hook(NodeKey(0), RequestId(1)))
            .unwrap();
        assert_eq!(net.open_connections(), 1);
        net.destroy(conn);
        assert_eq!(net.open_connections(), 0);
        match rx.recv().await {
            Some(SessionEvent::Error { error, .. }) => assert_eq!(error, ConnError::Destroy),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            net.send(conn, request(0, 8), sink.reply_hook(NodeKey(0), RequestId(2))),
            Err(ConnError::BadHandle)
        );
    }

    #[test]
    fn refusing_node_and_unknown_node() {
        let net = SimNetwork::new(vec![
            SimNode::fallback("s").behavior(NodeBehavior::RefuseConnect)
        ]);
        assert_eq!(net.connect(&"s".into()), Err(ConnError::CantConnect));
        assert_eq!(net.connect(&"zz".into()), Err(ConnError::CantConnect));
        assert_eq!(net.stats().refused_connects, 1);
    }
}
