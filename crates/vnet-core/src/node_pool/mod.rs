//! Ordered candidate nodes for one slice download.
//!
//! The pool is filled once from discovery: regular peers first, then
//! fallback nodes, each node id at most once. Nodes are addressed by
//! [`NodeKey`], their index in the pool, so session tables never hold
//! collaborator handles as identities.

mod entry;

use std::collections::HashSet;

use tokio::time::Instant;

use crate::transport::{Discovery, NodeId, Slice, TransportContext};

pub use entry::{NodeCandidate, NodeClass, NodeState};

/// Index of a node within its session's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub usize);

#[derive(Debug, Default)]
pub struct NodePool {
    nodes: Vec<NodeCandidate>,
}

impl NodePool {
    /// Query discovery for regular and fallback nodes of `slice`.
    pub fn populate(discovery: &dyn Discovery, ctx: &TransportContext, slice: &Slice) -> Self {
        Self::from_lists(
            discovery.node_list(ctx, slice),
            discovery.fallback_node_list(ctx, slice),
        )
    }

    /// Build from explicit lists. A node listed as both regular and fallback
    /// is kept once, as regular; later duplicates are dropped.
    pub fn from_lists(regular: Vec<NodeId>, fallback: Vec<NodeId>) -> Self {
        let mut seen = HashSet::new();
        let nodes = regular
            .into_iter()
            .map(|id| (id, NodeClass::Regular))
            .chain(fallback.into_iter().map(|id| (id, NodeClass::Fallback)))
            .filter(|(id, _)| seen.insert(id.clone()))
            .map(|(id, class)| NodeCandidate::new(id, class))
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: NodeKey) -> Option<&NodeCandidate> {
        self.nodes.get(key.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &NodeCandidate)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeKey(i), n))
    }

    /// First node, in pool order, that is not dead, not occupied, not backing
    /// off, and regular (or fallback when `allow_fallback`).
    pub fn next_available_node(&self, allow_fallback: bool, now: Instant) -> Option<NodeKey> {
        self.iter()
            .find(|(_, n)| {
                (n.class == NodeClass::Regular || allow_fallback) && n.is_selectable(now)
            })
            .map(|(key, _)| key)
    }

    /// Mark a node as having a request outstanding.
    pub fn occupy(&mut self, key: NodeKey) {
        if let Some(node) = self.nodes.get_mut(key.0) {
            if !node.is_dead() {
                node.state = NodeState::Occupied;
            }
        }
    }

    /// The node's slot is idle again. Dead nodes stay dead.
    pub fn release_node(&mut self, key: NodeKey) {
        if let Some(node) = self.nodes.get_mut(key.0) {
            if node.state == NodeState::Occupied {
                node.state = NodeState::Idle;
            }
        }
    }

    /// Exclude a node for the rest of the session. Returns false if it was already dead.
    pub fn mark_node_dead(&mut self, key: NodeKey) -> bool {
        match self.nodes.get_mut(key.0) {
            Some(node) if !node.is_dead() => {
                node.state = NodeState::Dead;
                node.backoff_until = None;
                true
            }
            _ => false,
        }
    }

    /// Keep the node out of selection until `until`.
    pub fn back_off(&mut self, key: NodeKey, until: Instant) {
        if let Some(node) = self.nodes.get_mut(key.0) {
            node.backoff_until = Some(until);
        }
    }

    /// Count a per-chunk timeout; returns the node's total.
    pub fn record_timeout(&mut self, key: NodeKey) -> u32 {
        self.nodes.get_mut(key.0).map_or(0, |node| {
            node.timeouts += 1;
            node.timeouts
        })
    }

    /// Count a busy reply; returns the node's total.
    pub fn record_busy(&mut self, key: NodeKey) -> u32 {
        self.nodes.get_mut(key.0).map_or(0, |node| {
            node.busy_replies += 1;
            node.busy_replies
        })
    }

    /// Nodes of `class` that are not dead.
    pub fn live_count(&self, class: NodeClass) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.class == class && !n.is_dead())
            .count()
    }

    pub fn dead_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_dead()).count()
    }

    /// Earliest future instant at which a backed-off, otherwise free node of
    /// an allowed class becomes selectable.
    pub fn earliest_backoff(&self, allow_fallback: bool, now: Instant) -> Option<Instant> {
        self.nodes
            .iter()
            .filter(|n| n.class == NodeClass::Regular || allow_fallback)
            .filter(|n| matches!(n.state, NodeState::Unconnected | NodeState::Idle))
            .filter_map(|n| n.backoff_until)
            .filter(|until| *until > now)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::from(*n)).collect()
    }

    #[test]
    fn regular_before_fallback_and_deduplicated() {
        let pool = NodePool::from_lists(ids(&["a", "b", "a"]), ids(&["s1", "b", "s2"]));
        let order: Vec<_> = pool
            .iter()
            .map(|(_, n)| (n.id.as_str().to_string(), n.class))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), NodeClass::Regular),
                ("b".to_string(), NodeClass::Regular),
                ("s1".to_string(), NodeClass::Fallback),
                ("s2".to_string(), NodeClass::Fallback),
            ]
        );
    }

    #[test]
    fn fallback_only_when_allowed() {
        let mut pool = NodePool::from_lists(ids(&["a"]), ids(&["s"]));
        let now = Instant::now();
        assert_eq!(pool.next_available_node(false, now), Some(NodeKey(0)));
        pool.occupy(NodeKey(0));
        assert_eq!(pool.next_available_node(false, now), None);
        assert_eq!(pool.next_available_node(true, now), Some(NodeKey(1)));
        pool.release_node(NodeKey(0));
        assert_eq!(pool.get(NodeKey(0)).unwrap().state, NodeState::Idle);
        assert_eq!(pool.next_available_node(true, now), Some(NodeKey(0)));
    }

    #[test]
    fn dead_node_never_selected_again() {
        let mut pool = NodePool::from_lists(ids(&["a", "b"]), Vec::new());
        let now = Instant::now();
        assert!(pool.mark_node_dead(NodeKey(0)));
        assert!(!pool.mark_node_dead(NodeKey(0)));
        pool.release_node(NodeKey(0));
        assert_eq!(pool.next_available_node(true, now), Some(NodeKey(1)));
        assert_eq!(pool.live_count(NodeClass::Regular), 1);
        assert_eq!(pool.dead_count(), 1);
        pool.mark_node_dead(NodeKey(1));
        assert_eq!(pool.next_available_node(true, now), None);
    }

    #[test]
    fn backoff_hides_node_until_expiry() {
        let mut pool = NodePool::from_lists(ids(&["a"]), Vec::new());
        let now = Instant::now();
        let until = now + Duration::from_millis(100);
        pool.back_off(NodeKey(0), until);
        assert_eq!(pool.next_available_node(false, now), None);
        assert_eq!(pool.earliest_backoff(false, now), Some(until));
        assert_eq!(pool.next_available_node(false, until), Some(NodeKey(0)));
        assert_eq!(pool.earliest_backoff(false, until), None);
    }

    #[test]
    fn strike_counters() {
        let mut pool = NodePool::from_lists(ids(&["a"]), Vec::new());
        assert_eq!(pool.record_timeout(NodeKey(0)), 1);
        assert_eq!(pool.record_timeout(NodeKey(0)), 2);
        assert_eq!(pool.record_busy(NodeKey(0)), 1);
        assert_eq!(pool.record_busy(NodeKey(7)), 0);
    }
}
