//! Connection slots: one lazily created connection per node, carrying at
//! most one outstanding chunk request.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::chunk_plan::ChunkId;
use crate::node_pool::NodeKey;
use crate::protocol::{ChunkRequest, FILE_FEED_REQUEST};
use crate::transport::{
    ConnError, ConnectionHandle, EventSink, Message, NodeId, TimerHandle, Timers, Transport,
};

/// Per-session request number. Replies and timers carry it so stale events
/// can be told apart from the current request on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// The request currently outstanding on a slot.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub request: RequestId,
    pub chunk: ChunkId,
    pub header: ChunkRequest,
    pub timer: Option<TimerHandle>,
    pub issued_at: Instant,
    /// The per-chunk timer fired and the chunk was re-queued elsewhere.
    /// The transport still owes a reply, so the slot stays occupied.
    pub abandoned: bool,
}

#[derive(Debug)]
pub struct ConnectionSlot {
    pub node: NodeKey,
    pub conn: ConnectionHandle,
    inflight: Option<InFlight>,
}

impl ConnectionSlot {
    pub fn in_flight(&self) -> Option<&InFlight> {
        self.inflight.as_ref()
    }

    pub fn is_free(&self) -> bool {
        self.inflight.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("connect to {node} failed: {source}")]
    ConnectFailure { node: NodeId, source: ConnError },
    #[error("slot of node {0:?} already has a request outstanding")]
    SlotOccupied(NodeKey),
    #[error("no connection for node {0:?}")]
    NotConnected(NodeKey),
    #[error("send failed: {0}")]
    Send(ConnError),
}

/// Connection slots of one session, keyed by node.
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: HashMap<NodeKey, ConnectionSlot>,
    next_request: u64,
    opened: usize,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeKey) -> Option<&ConnectionSlot> {
        self.slots.get(&node)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Connections created so far, including ones already destroyed.
    pub fn opened(&self) -> usize {
        self.opened
    }

    /// Connection for `node`, created on first use.
    pub fn acquire_for(
        &mut self,
        transport: &dyn Transport,
        node: NodeKey,
        id: &NodeId,
    ) -> Result<ConnectionHandle, SlotError> {
        if let Some(slot) = self.slots.get(&node) {
            return Ok(slot.conn);
        }
        let conn = transport
            .connect(id)
            .map_err(|source| SlotError::ConnectFailure {
                node: id.clone(),
                source,
            })?;
        self.opened += 1;
        tracing::debug!(node = %id, conn = conn.0, "connection created");
        self.slots.insert(
            node,
            ConnectionSlot {
                node,
                conn,
                inflight: None,
            },
        );
        Ok(conn)
    }

    /// Send `header` as a FILE_FEED request on the node's connection.
    /// Refuses when a request (live or abandoned) is still outstanding.
    pub fn issue_request(
        &mut self,
        transport: &dyn Transport,
        sink: &EventSink,
        node: NodeKey,
        chunk: ChunkId,
        header: ChunkRequest,
    ) -> Result<RequestId, SlotError> {
        let slot = self
            .slots
            .get_mut(&node)
            .ok_or(SlotError::NotConnected(node))?;
        if slot.inflight.is_some() {
            return Err(SlotError::SlotOccupied(node));
        }
        self.next_request += 1;
        let request = RequestId(self.next_request);
        let message = Message::new(FILE_FEED_REQUEST, header.encode());
        transport
            .send(slot.conn, message, sink.reply_hook(node, request))
            .map_err(SlotError::Send)?;
        slot.inflight = Some(InFlight {
            request,
            chunk,
            header,
            timer: None,
            issued_at: Instant::now(),
            abandoned: false,
        });
        Ok(request)
    }

    /// Attach the per-chunk timer to the request it guards.
    pub fn set_timer(&mut self, node: NodeKey, request: RequestId, timer: TimerHandle) -> bool {
        match self.current_mut(node, request) {
            Some(inflight) => {
                inflight.timer = Some(timer);
                true
            }
            None => false,
        }
    }

    fn current_mut(&mut self, node: NodeKey, request: RequestId) -> Option<&mut InFlight> {
        self.slots
            .get_mut(&node)
            .and_then(|slot| slot.inflight.as_mut())
            .filter(|inflight| inflight.request == request)
    }

    /// Take the outstanding request if it is `request`, freeing the slot.
    /// `None` means the event is stale.
    pub fn take_matching(&mut self, node: NodeKey, request: RequestId) -> Option<InFlight> {
        let slot = self.slots.get_mut(&node)?;
        if slot.inflight.as_ref()?.request != request {
            return None;
        }
        slot.inflight.take()
    }

    /// Mark the outstanding `request` abandoned after its chunk timeout.
    /// Returns the chunk to re-queue, or `None` if stale or already abandoned.
    pub fn abandon(&mut self, node: NodeKey, request: RequestId) -> Option<ChunkId> {
        let inflight = self.current_mut(node, request)?;
        if inflight.abandoned {
            return None;
        }
        inflight.abandoned = true;
        inflight.timer = None;
        Some(inflight.chunk)
    }

    /// Destroy the node's connection and stop its chunk timer.
    /// Returns the request that was outstanding, if any.
    pub fn remove(
        &mut self,
        node: NodeKey,
        transport: &dyn Transport,
        timers: &dyn Timers,
    ) -> Option<InFlight> {
        let slot = self.slots.remove(&node)?;
        Self::teardown(&slot, transport, timers);
        slot.inflight
    }

    /// Destroy every connection and stop every chunk timer. Returns how many
    /// connections were destroyed.
    pub fn release_all(&mut self, transport: &dyn Transport, timers: &dyn Timers) -> usize {
        let count = self.slots.len();
        for (_, slot) in self.slots.drain() {
            Self::teardown(&slot, transport, timers);
        }
        count
    }

    fn teardown(slot: &ConnectionSlot, transport: &dyn Transport, timers: &dyn Timers) {
        if let Some(timer) = slot.inflight.as_ref().and_then(|i| i.timer) {
            timers.cancel(timer);
        }
        transport.destroy(slot.conn);
        tracing::debug!(conn = slot.conn.0, "connection destroyed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::protocol::ContentId;
    use crate::session::SessionEvent;
    use crate::transport::{ReplyHook, TimerError, TimerHook};

    #[derive(Default)]
    struct Recorder {
        next: AtomicI64,
        refuse: bool,
        sent: Mutex<Vec<(ConnectionHandle, ReplyHook)>>,
        destroyed: Mutex<Vec<ConnectionHandle>>,
        cancelled: Mutex<Vec<TimerHandle>>,
    }

    impl Transport for Recorder {
        fn connect(&self, _node: &NodeId) -> Result<ConnectionHandle, ConnError> {
            if self.refuse {
                return Err(ConnError::CantConnect);
            }
            Ok(ConnectionHandle(self.next.fetch_add(1, Ordering::Relaxed) + 1))
        }

        fn destroy(&self, conn: ConnectionHandle) {
            self.destroyed.lock().unwrap().push(conn);
        }

        fn send(
            &self,
            conn: ConnectionHandle,
            _message: Message,
            hook: ReplyHook,
        ) -> Result<(), ConnError> {
            self.sent.lock().unwrap().push((conn, hook));
            Ok(())
        }
    }

    impl Timers for Recorder {
        fn start(&self, _delay: Duration, _hook: TimerHook) -> Result<TimerHandle, TimerError> {
            Err(TimerError::OutOfResource)
        }

        fn cancel(&self, timer: TimerHandle) {
            self.cancelled.lock().unwrap().push(timer);
        }
    }

    fn header(offset: u32) -> ChunkRequest {
        ChunkRequest {
            content: ContentId::parse("movie0000000000000000001").unwrap(),
            slice_id: 0,
            offset,
            size: 100,
        }
    }

    fn sink() -> (EventSink, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::new(tx), rx)
    }

    #[test]
    fn connection_created_once_and_reused() {
        let t = Recorder::default();
        let mut slots = SlotTable::new();
        let a = slots.acquire_for(&t, NodeKey(0), &"a".into()).unwrap();
        let again = slots.acquire_for(&t, NodeKey(0), &"a".into()).unwrap();
        assert_eq!(a, again);
        assert_eq!(slots.opened(), 1);
    }

    #[test]
    fn connect_failure_reported() {
        let t = Recorder {
            refuse: true,
            ..Recorder::default()
        };
        let mut slots = SlotTable::new();
        let err = slots.acquire_for(&t, NodeKey(0), &"a".into()).unwrap_err();
        assert!(matches!(
            err,
            SlotError::ConnectFailure {
                source: ConnError::CantConnect,
                ..
            }
        ));
        assert!(slots.is_empty());
    }

    #[test]
    fn second_request_on_busy_slot_refused() {
        let t = Recorder::default();
        let (sink, _rx) = sink();
        let mut slots = SlotTable::new();
        slots.acquire_for(&t, NodeKey(0), &"a".into()).unwrap();
        let first = slots
            .issue_request(&t, &sink, NodeKey(0), ChunkId(0), header(0))
            .unwrap();
        let err = slots
            .issue_request(&t, &sink, NodeKey(0), ChunkId(1), header(100))
            .unwrap_err();
        assert!(matches!(err, SlotError::SlotOccupied(NodeKey(0))));
        assert_eq!(t.sent.lock().unwrap().len(), 1);

        let done = slots.take_matching(NodeKey(0), first).unwrap();
        assert_eq!(done.chunk, ChunkId(0));
        assert!(slots.get(NodeKey(0)).unwrap().is_free());
        slots
            .issue_request(&t, &sink, NodeKey(0), ChunkId(1), header(100))
            .unwrap();
    }

    #[test]
    fn reply_hook_carries_request_id() {
        let t = Recorder::default();
        let (sink, mut rx) = sink();
        let mut slots = SlotTable::new();
        slots.acquire_for(&t, NodeKey(3), &"a".into()).unwrap();
        let id = slots
            .issue_request(&t, &sink, NodeKey(3), ChunkId(0), header(0))
            .unwrap();
        let (_, hook) = t.sent.lock().unwrap().pop().unwrap();
        assert_eq!(hook.request(), id);
        hook.fail(ConnError::Reset);
        match rx.try_recv().unwrap() {
            SessionEvent::Error {
                node,
                request,
                error,
            } => {
                assert_eq!(node, NodeKey(3));
                assert_eq!(request, id);
                assert_eq!(error, ConnError::Reset);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn abandoned_request_keeps_slot_until_reply() {
        let t = Recorder::default();
        let (sink, _rx) = sink();
        let mut slots = SlotTable::new();
        slots.acquire_for(&t, NodeKey(0), &"a".into()).unwrap();
        let id = slots
            .issue_request(&t, &sink, NodeKey(0), ChunkId(4), header(0))
            .unwrap();
        assert_eq!(slots.abandon(NodeKey(0), id), Some(ChunkId(4)));
        assert_eq!(slots.abandon(NodeKey(0), id), None);
        assert!(!slots.get(NodeKey(0)).unwrap().is_free());
        assert!(slots.take_matching(NodeKey(0), RequestId(99)).is_none());
        let late = slots.take_matching(NodeKey(0), id).unwrap();
        assert!(late.abandoned);
        assert!(slots.get(NodeKey(0)).unwrap().is_free());
    }

    #[test]
    fn release_all_destroys_connections_and_timers() {
        let t = Recorder::default();
        let (sink, _rx) = sink();
        let mut slots = SlotTable::new();
        slots.acquire_for(&t, NodeKey(0), &"a".into()).unwrap();
        slots.acquire_for(&t, NodeKey(1), &"b".into()).unwrap();
        let id = slots
            .issue_request(&t, &sink, NodeKey(1), ChunkId(0), header(0))
            .unwrap();
        assert!(slots.set_timer(NodeKey(1), id, TimerHandle(42)));
        assert_eq!(slots.release_all(&t, &t), 2);
        assert_eq!(t.destroyed.lock().unwrap().len(), 2);
        assert_eq!(*t.cancelled.lock().unwrap(), vec![TimerHandle(42)]);
        assert!(slots.is_empty());
    }
}
