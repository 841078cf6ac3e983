//! Session aggregate and its event loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use crate::chunk_plan::ChunkPlan;
use crate::config::VnetConfig;
use crate::deadline::DeadlineBudget;
use crate::node_pool::{NodeClass, NodePool};
use crate::retry::RetryPolicy;
use crate::slot::SlotTable;
use crate::storage::SliceWriter;
use crate::transport::{Collaborators, EventSink, Slice, TimerHandle, TransportContext};

use super::{DoneCallback, DownloadResult, SessionEvent, SessionSummary, TimerTag};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Scheduling,
    AwaitingResponses,
    Complete,
    Timeout,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Complete | SessionState::Timeout | SessionState::Failed
        )
    }

    pub(super) fn for_result(result: DownloadResult) -> Self {
        match result {
            DownloadResult::Success => SessionState::Complete,
            DownloadResult::DeadlineExceeded => SessionState::Timeout,
            _ => SessionState::Failed,
        }
    }
}

/// Counters reported in the summary.
#[derive(Debug, Default)]
pub(super) struct SessionStats {
    pub requests_issued: u64,
    pub chunk_timeouts: u64,
    pub busy_replies: u64,
    pub fallback_requests: u64,
}

/// Session-level timers (per-chunk timers live in the slots).
#[derive(Debug, Default)]
pub(super) struct SessionTimers {
    pub deadline: Option<TimerHandle>,
    pub fallback_window: Option<TimerHandle>,
    pub wakeup: Option<(Instant, TimerHandle)>,
}

/// One slice download. Owned and driven by a single task; nothing in here
/// is shared or locked.
pub(super) struct Session {
    pub cfg: VnetConfig,
    pub busy_policy: RetryPolicy,
    pub collab: Collaborators,
    pub ctx: Arc<TransportContext>,
    pub slice: Slice,
    pub writer: SliceWriter,
    pub plan: ChunkPlan,
    pub pool: NodePool,
    pub slots: SlotTable,
    pub budget: DeadlineBudget,
    pub sink: EventSink,
    pub state: SessionState,
    pub timers: SessionTimers,
    pub stats: SessionStats,
    pub done: Option<DoneCallback>,
    pub result: Option<DownloadResult>,
    pub digest: Option<String>,
}

impl Session {
    /// Fix the absolute deadline at `now`; nothing is contacted yet.
    pub fn new(
        cfg: VnetConfig,
        collab: Collaborators,
        ctx: Arc<TransportContext>,
        slice: Slice,
        relative: Duration,
        sink: EventSink,
        done: DoneCallback,
    ) -> Self {
        let now = Instant::now();
        let writer = SliceWriter::new(Arc::clone(&collab.store), Arc::clone(&ctx), slice);
        Self {
            busy_policy: cfg.busy_retry().policy(),
            budget: DeadlineBudget::new(now, relative, &cfg),
            plan: ChunkPlan::create(&slice, cfg.max_chunk_size),
            pool: NodePool::default(),
            slots: SlotTable::new(),
            cfg,
            collab,
            ctx,
            slice,
            writer,
            sink,
            state: SessionState::Initializing,
            timers: SessionTimers::default(),
            stats: SessionStats::default(),
            done: Some(done),
            result: None,
            digest: None,
        }
    }

    /// Run to a terminal state, then report.
    pub async fn run(mut self, mut rx: UnboundedReceiver<SessionEvent>) -> SessionSummary {
        self.initialize();
        while !self.state.is_terminal() {
            let event = if self.timers.deadline.is_some() {
                rx.recv().await
            } else {
                // No deadline timer could be armed; enforce it here instead.
                tokio::time::timeout_at(self.budget.deadline(), rx.recv())
                    .await
                    .unwrap_or(Some(SessionEvent::Timer(TimerTag::Deadline)))
            };
            match event {
                Some(event) => self.handle_event(event),
                None => self.finish(DownloadResult::Cancelled),
            }
        }
        rx.close();
        self.summary()
    }

    fn initialize(&mut self) {
        self.pool = NodePool::populate(&*self.collab.discovery, &self.ctx, &self.slice);
        tracing::debug!(
            content = %self.ctx.content,
            slice = self.slice.id,
            size = self.slice.size,
            chunks = self.plan.len(),
            regular = self.pool.live_count(NodeClass::Regular),
            fallback = self.pool.live_count(NodeClass::Fallback),
            "slice download starting"
        );
        if self.pool.is_empty() {
            self.finish(DownloadResult::NoNodesAvailable);
            return;
        }

        let now = Instant::now();
        self.timers.deadline = self.arm(self.budget.remaining(now), TimerTag::Deadline);
        if self.pool.live_count(NodeClass::Fallback) > 0 {
            let opens_at = self.budget.fallback_window_opens_at();
            if opens_at > now {
                self.timers.fallback_window = self.arm(opens_at - now, TimerTag::FallbackWindow);
            }
        }
        self.state = SessionState::Scheduling;
        self.advance();
    }

    fn handle_event(&mut self, event: SessionEvent) {
        if self.budget.is_expired(Instant::now()) {
            self.finish(DownloadResult::DeadlineExceeded);
            return;
        }
        match event {
            SessionEvent::Response {
                node,
                request,
                message,
            } => self.on_response(node, request, message),
            SessionEvent::Error {
                node,
                request,
                error,
            } => self.on_error(node, request, error),
            SessionEvent::Timer(TimerTag::Deadline) => {
                self.timers.deadline = None;
                self.finish(DownloadResult::DeadlineExceeded);
            }
            SessionEvent::Timer(TimerTag::Chunk { node, request }) => {
                self.on_chunk_timeout(node, request)
            }
            SessionEvent::Timer(TimerTag::Wakeup) => self.timers.wakeup = None,
            SessionEvent::Timer(TimerTag::FallbackWindow) => {
                self.timers.fallback_window = None;
                tracing::debug!(slice = self.slice.id, "fallback window open");
            }
            SessionEvent::Cancel => self.finish(DownloadResult::Cancelled),
        }
        self.advance();
    }

    /// Start a session timer; failures are logged and leave it unarmed.
    pub(super) fn arm(&self, delay: Duration, tag: TimerTag) -> Option<TimerHandle> {
        match self.collab.timers.start(delay, self.sink.timer_hook(tag)) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(?tag, "timer not armed: {}", e);
                None
            }
        }
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            result: self.result.unwrap_or(DownloadResult::Cancelled),
            slice_id: self.slice.id,
            slice_size: self.slice.size,
            bytes: self.plan.completed_bytes(),
            chunks_total: self.plan.len(),
            chunks_completed: self.plan.completed_count(),
            requests_issued: self.stats.requests_issued,
            chunk_timeouts: self.stats.chunk_timeouts,
            busy_replies: self.stats.busy_replies,
            dead_nodes: self.pool.dead_count(),
            fallback_requests: self.stats.fallback_requests,
            connections_opened: self.slots.opened(),
            elapsed_ms: self.budget.elapsed(Instant::now()).as_millis() as u64,
            sha256: self.digest.clone(),
        }
    }
}
