//! Slice download sessions.
//!
//! [`SliceDownloader::download_slice`] validates the request, then spawns one
//! tokio task per slice. The task is the only consumer of the session's event
//! queue: transport replies and errors, timer expiries, and cancellation all
//! arrive as [`SessionEvent`]s and are applied one at a time, so the session
//! state needs no locking. The completion callback runs on that task exactly
//! once, after every timer was stopped and every connection the session
//! created was destroyed.

mod error;
mod event;
mod finish;
mod handlers;
mod result;
mod schedule;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, VnetConfig};
use crate::transport::{Collaborators, EventSink, Slice, TransportContext};

pub use error::SessionError;
pub use event::{SessionEvent, TimerTag};
pub use result::{DownloadResult, SessionSummary};
pub use state::SessionState;

use state::Session;

/// Completion callback: result, the caller's context, and the slice.
pub type DoneCallback = Box<dyn FnOnce(DownloadResult, &TransportContext, &Slice) + Send>;

/// Starts slice downloads against one set of collaborators.
#[derive(Debug, Clone)]
pub struct SliceDownloader {
    cfg: VnetConfig,
    collab: Collaborators,
}

impl SliceDownloader {
    pub fn new(cfg: VnetConfig, collab: Collaborators) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self { cfg, collab })
    }

    pub fn config(&self) -> &VnetConfig {
        &self.cfg
    }

    /// Download `slice` within `relative_deadline_ms` milliseconds.
    ///
    /// Invalid input is rejected here and `done` is dropped uncalled. On
    /// success the session runs on its own task and `done` is invoked from
    /// there with the terminal result.
    pub fn download_slice(
        &self,
        ctx: Arc<TransportContext>,
        slice: Slice,
        done: DoneCallback,
        relative_deadline_ms: i64,
    ) -> Result<SessionHandle, SessionError> {
        if slice.size == 0 {
            return Err(SessionError::ZeroSizeSlice(slice.id));
        }
        if relative_deadline_ms <= 0 {
            return Err(SessionError::NonPositiveDeadline(relative_deadline_ms));
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        let session = Session::new(
            self.cfg.clone(),
            self.collab.clone(),
            ctx,
            slice,
            Duration::from_millis(relative_deadline_ms as u64),
            sink.clone(),
            done,
        );
        let join = runtime.spawn(session.run(rx));
        Ok(SessionHandle { sink, join })
    }
}

/// Handle to a running session.
#[derive(Debug)]
pub struct SessionHandle {
    sink: EventSink,
    join: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    /// Ask the session to stop with [`DownloadResult::Cancelled`]. No effect
    /// once it has reached a terminal state.
    pub fn cancel(&self) {
        self.sink.push(SessionEvent::Cancel);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the session task and return its report.
    pub async fn finished(self) -> Result<SessionSummary, SessionError> {
        Ok(self.join.await?)
    }
}
