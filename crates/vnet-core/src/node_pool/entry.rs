//! Per-node entry and state types.

use tokio::time::Instant;

use crate::transport::NodeId;

/// Where a node came from. Regular peers are always preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Regular,
    Fallback,
}

/// Connection/usage state of a node within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No connection created yet.
    Unconnected,
    /// Connected, no request outstanding.
    Idle,
    /// A request is outstanding (possibly abandoned after a chunk timeout).
    Occupied,
    /// Never selected again in this session.
    Dead,
}

/// A candidate node and what this session has observed about it.
#[derive(Debug, Clone)]
pub struct NodeCandidate {
    pub id: NodeId,
    pub class: NodeClass,
    pub state: NodeState,
    /// Not selectable before this instant (busy backoff).
    pub backoff_until: Option<Instant>,
    /// Per-chunk timeouts so far.
    pub timeouts: u32,
    /// Busy replies so far.
    pub busy_replies: u32,
}

impl NodeCandidate {
    pub(super) fn new(id: NodeId, class: NodeClass) -> Self {
        Self {
            id,
            class,
            state: NodeState::Unconnected,
            backoff_until: None,
            timeouts: 0,
            busy_replies: 0,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.state == NodeState::Dead
    }

    /// Free for a new request at `now`, ignoring class.
    pub(super) fn is_selectable(&self, now: Instant) -> bool {
        matches!(self.state, NodeState::Unconnected | NodeState::Idle)
            && self.backoff_until.map_or(true, |until| until <= now)
    }
}
