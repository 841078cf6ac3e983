//! Pairing pending chunks with free nodes.

use tokio::time::Instant;

use crate::chunk_plan::ChunkId;
use crate::node_pool::{NodeClass, NodeKey};
use crate::protocol::ChunkRequest;
use crate::retry::ErrorKind;

use super::state::{Session, SessionState};
use super::{DownloadResult, TimerTag};

impl Session {
    /// Bring the session forward after an event: complete, schedule more
    /// requests, or detect that no node is left.
    pub(super) fn advance(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.plan.is_complete() {
            self.complete();
            return;
        }

        let now = Instant::now();
        self.schedule(now);
        if self.state.is_terminal() {
            return;
        }
        if self.pool.live_count(NodeClass::Regular) + self.pool.live_count(NodeClass::Fallback) == 0
        {
            self.finish(DownloadResult::NoNodesAvailable);
            return;
        }
        self.arm_wakeup(now);
        self.state = if self.plan.in_flight_count() > 0 {
            SessionState::AwaitingResponses
        } else {
            SessionState::Scheduling
        };
    }

    /// Fallback nodes may be used only once no regular node is left or the
    /// deadline has reached the fallback reserve.
    pub(super) fn allow_fallback(&self, now: Instant) -> bool {
        self.pool.live_count(NodeClass::Regular) == 0 || self.budget.has_fallback_budget(now)
    }

    fn schedule(&mut self, now: Instant) {
        while let Some(chunk) = self.plan.next_pending_chunk() {
            let allow_fallback = self.allow_fallback(now);
            let Some(node) = self.pool.next_available_node(allow_fallback, now) else {
                break;
            };
            self.dispatch(chunk, node, now);
            if self.state.is_terminal() {
                break;
            }
        }
    }

    /// Send `chunk` to `node`. A node that cannot be connected to or sent to
    /// is dropped; the chunk stays pending.
    fn dispatch(&mut self, chunk: ChunkId, node: NodeKey, now: Instant) {
        let Some((id, class)) = self.pool.get(node).map(|n| (n.id.clone(), n.class)) else {
            return;
        };
        let Some(range) = self.plan.range(chunk) else {
            return;
        };
        if let Err(e) = self
            .slots
            .acquire_for(&*self.collab.transport, node, &id)
        {
            tracing::warn!(node = %id, "{}", e);
            self.kill_node(node, ErrorKind::Connection);
            return;
        }

        let header = ChunkRequest {
            content: self.ctx.content,
            slice_id: self.slice.id,
            offset: range.offset,
            size: range.length,
        };
        let request = match self.slots.issue_request(
            &*self.collab.transport,
            &self.sink,
            node,
            chunk,
            header,
        ) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(node = %id, "{}", e);
                self.kill_node(node, ErrorKind::Connection);
                return;
            }
        };

        let timeout = self.budget.chunk_timeout(now);
        if let Err(e) = self.plan.mark_in_flight(chunk, node, now + timeout) {
            tracing::warn!(?chunk, "{}", e);
        }
        self.pool.occupy(node);
        self.stats.requests_issued += 1;
        if class == NodeClass::Fallback {
            self.stats.fallback_requests += 1;
        }
        if let Some(timer) = self.arm(timeout, TimerTag::Chunk { node, request }) {
            self.slots.set_timer(node, request, timer);
        }
        tracing::debug!(
            node = %id,
            ?class,
            ?request,
            offset = range.offset,
            len = range.length,
            timeout_ms = timeout.as_millis() as u64,
            "chunk requested"
        );
    }

    /// Pending chunks but no free node: wake up when the earliest busy
    /// backoff ends.
    fn arm_wakeup(&mut self, now: Instant) {
        if self.plan.pending_count() == 0 {
            return;
        }
        let Some(at) = self.pool.earliest_backoff(self.allow_fallback(now), now) else {
            return;
        };
        if let Some((armed_at, timer)) = self.timers.wakeup {
            if armed_at <= at {
                return;
            }
            self.collab.timers.cancel(timer);
            self.timers.wakeup = None;
        }
        if let Some(timer) = self.arm(at - now, TimerTag::Wakeup) {
            self.timers.wakeup = Some((at, timer));
        }
    }
}
