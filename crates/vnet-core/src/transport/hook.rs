//! Callback hooks handed to collaborators.

use tokio::sync::mpsc;

use crate::node_pool::NodeKey;
use crate::session::{SessionEvent, TimerTag};
use crate::slot::RequestId;

use super::{ConnError, Message};

/// Sending half of a session's event queue. Sending never blocks; events for
/// a session that already finished are dropped.
#[derive(Debug, Clone)]
pub struct EventSink(mpsc::UnboundedSender<SessionEvent>);

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self(tx)
    }

    pub(crate) fn push(&self, event: SessionEvent) -> bool {
        self.0.send(event).is_ok()
    }

    pub(crate) fn reply_hook(&self, node: NodeKey, request: RequestId) -> ReplyHook {
        ReplyHook {
            sink: self.clone(),
            node,
            request,
        }
    }

    pub(crate) fn timer_hook(&self, tag: TimerTag) -> TimerHook {
        TimerHook {
            sink: self.clone(),
            tag,
        }
    }
}

/// Response/error handler pair for one sent message.
#[derive(Debug)]
pub struct ReplyHook {
    sink: EventSink,
    node: NodeKey,
    request: RequestId,
}

impl ReplyHook {
    pub fn request(&self) -> RequestId {
        self.request
    }

    /// Deliver the response message.
    pub fn respond(self, message: Message) {
        self.sink.push(SessionEvent::Response {
            node: self.node,
            request: self.request,
            message,
        });
    }

    /// Deliver a connection error for the message.
    pub fn fail(self, error: ConnError) {
        self.sink.push(SessionEvent::Error {
            node: self.node,
            request: self.request,
            error,
        });
    }
}

/// Expiry handler for one timer.
#[derive(Debug)]
pub struct TimerHook {
    sink: EventSink,
    tag: TimerTag,
}

impl TimerHook {
    pub fn fire(self) {
        self.sink.push(SessionEvent::Timer(self.tag));
    }
}
