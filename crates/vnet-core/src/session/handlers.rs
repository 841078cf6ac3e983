//! Per-event transitions: replies, connection errors, chunk timeouts.

use std::time::Duration;

use tokio::time::Instant;

use crate::chunk_plan::{ChunkId, ChunkPlanError};
use crate::node_pool::NodeKey;
use crate::retry::{classify_conn_error, classify_reply, ErrorKind, Reply, RetryDecision};
use crate::slot::RequestId;
use crate::transport::{ConnError, Message};

use super::state::Session;
use super::DownloadResult;

impl Session {
    pub(super) fn on_response(&mut self, node: NodeKey, request: RequestId, message: Message) {
        let Some(inflight) = self.slots.take_matching(node, request) else {
            tracing::trace!(?node, ?request, "stale reply dropped");
            return;
        };
        if let Some(timer) = inflight.timer {
            self.collab.timers.cancel(timer);
        }
        self.pool.release_node(node);
        if inflight.abandoned {
            // The chunk went back to pending when its timer fired.
            tracing::debug!(?node, ?request, "late reply discarded");
            return;
        }

        let chunk = inflight.chunk;
        match classify_reply(&message, &inflight.header) {
            Ok(Reply::Chunk(data)) => {
                match self.plan.mark_complete(chunk, &data, &self.writer) {
                    Ok(()) => tracing::debug!(
                        ?node,
                        offset = inflight.header.offset,
                        len = data.len(),
                        rtt_ms = inflight.issued_at.elapsed().as_millis() as u64,
                        "chunk stored"
                    ),
                    Err(ChunkPlanError::Storage(e)) => {
                        tracing::warn!(slice = self.slice.id, "store rejected chunk: {}", e);
                        self.finish(DownloadResult::StorageFailure);
                    }
                    Err(e) => {
                        tracing::warn!(?node, "chunk not accepted: {}", e);
                        self.requeue(chunk);
                        self.kill_node(node, ErrorKind::Protocol);
                    }
                }
            }
            Ok(Reply::Busy(hint)) => {
                self.requeue(chunk);
                self.on_busy(node, hint);
            }
            Ok(Reply::NoSlice) => {
                self.requeue(chunk);
                self.kill_node(node, ErrorKind::NoSlice);
            }
            Err(kind) => {
                self.requeue(chunk);
                self.kill_node(node, kind);
            }
        }
    }

    pub(super) fn on_error(&mut self, node: NodeKey, request: RequestId, error: ConnError) {
        let Some(inflight) = self.slots.take_matching(node, request) else {
            tracing::trace!(?node, ?request, %error, "stale error dropped");
            return;
        };
        if let Some(timer) = inflight.timer {
            self.collab.timers.cancel(timer);
        }
        self.pool.release_node(node);
        if !inflight.abandoned {
            self.requeue(inflight.chunk);
        }
        let kind = classify_conn_error(error);
        tracing::debug!(?node, ?request, %error, ?kind, "request failed");
        if !kind.keeps_node() {
            self.kill_node(node, kind);
        } else if !inflight.abandoned {
            // An abandoned request already took its strike when its timer fired.
            self.strike(node);
        }
    }

    pub(super) fn on_chunk_timeout(&mut self, node: NodeKey, request: RequestId) {
        let Some(chunk) = self.slots.abandon(node, request) else {
            return;
        };
        self.stats.chunk_timeouts += 1;
        tracing::debug!(?node, ?request, ?chunk, "chunk timed out, re-queued");
        self.requeue(chunk);
        self.strike(node);
    }

    fn on_busy(&mut self, node: NodeKey, hint: Duration) {
        self.stats.busy_replies += 1;
        let attempt = self.pool.record_busy(node);
        match self.busy_policy.busy_backoff(attempt, hint) {
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(?node, attempt, delay_ms = delay.as_millis() as u64, "node busy");
                self.pool.back_off(node, Instant::now() + delay);
            }
            RetryDecision::NoRetry => self.kill_node(node, ErrorKind::Busy),
        }
    }

    fn requeue(&mut self, chunk: ChunkId) {
        if let Err(e) = self.plan.mark_failed(chunk) {
            tracing::warn!(?chunk, "re-queue refused: {}", e);
        }
    }

    /// Count a timeout against `node`; too many and it is dropped.
    fn strike(&mut self, node: NodeKey) {
        if self.pool.record_timeout(node) >= self.cfg.max_node_timeouts {
            self.kill_node(node, ErrorKind::Timeout);
        }
    }

    /// Exclude `node` for the rest of the session and destroy its connection.
    pub(super) fn kill_node(&mut self, node: NodeKey, kind: ErrorKind) {
        if !self.pool.mark_node_dead(node) {
            return;
        }
        let id = self.pool.get(node).map(|n| n.id.to_string()).unwrap_or_default();
        tracing::warn!(node = %id, ?kind, slice = self.slice.id, "node dropped");
        if let Some(inflight) =
            self.slots
                .remove(node, &*self.collab.transport, &*self.collab.timers)
        {
            if !inflight.abandoned {
                self.requeue(inflight.chunk);
            }
        }
    }
}
