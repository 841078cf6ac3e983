//! Terminal transition.

use crate::checksum::sha256_bytes;

use super::state::{Session, SessionState};
use super::DownloadResult;

impl Session {
    /// All chunks stored: read the slice back and digest it.
    pub(super) fn complete(&mut self) {
        match self.writer.read_all() {
            Ok(bytes) => {
                self.digest = Some(sha256_bytes(&bytes));
                self.finish(DownloadResult::Success);
            }
            Err(e) => {
                tracing::warn!(slice = self.slice.id, "read-back of assembled slice failed: {}", e);
                self.finish(DownloadResult::StorageFailure);
            }
        }
    }

    /// Enter the terminal state exactly once: stop every timer, destroy every
    /// connection this session created, then invoke the callback.
    pub(super) fn finish(&mut self, result: DownloadResult) {
        if self.state.is_terminal() {
            return;
        }
        self.state = SessionState::for_result(result);
        self.result = Some(result);

        let timers = &*self.collab.timers;
        for timer in [self.timers.deadline.take(), self.timers.fallback_window.take()]
            .into_iter()
            .flatten()
            .chain(self.timers.wakeup.take().map(|(_, timer)| timer))
        {
            timers.cancel(timer);
        }
        let destroyed = self.slots.release_all(&*self.collab.transport, timers);

        if let Some(done) = self.done.take() {
            done(result, &self.ctx, &self.slice);
        }
        tracing::info!(
            content = %self.ctx.content,
            slice = self.slice.id,
            %result,
            chunks = self.plan.completed_count(),
            of = self.plan.len(),
            requests = self.stats.requests_issued,
            connections = destroyed,
            elapsed_ms = self.budget.elapsed(tokio::time::Instant::now()).as_millis() as u64,
            "slice download finished"
        );
    }
}
