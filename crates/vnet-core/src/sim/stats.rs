//! Instrumentation collected by the simulated network.

use std::collections::BTreeMap;

use serde::Serialize;

/// One request as seen by a node.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub node: String,
    pub offset: u32,
    pub size: u32,
    /// Milliseconds since the network was created.
    pub at_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimStats {
    pub connects: u64,
    pub refused_connects: u64,
    pub destroys: u64,
    pub requests: u64,
    /// Highest number of unanswered requests seen on any one connection.
    pub max_outstanding: u32,
    /// Requests sent while another was still unanswered on the same connection.
    pub violations: u64,
    pub requests_per_node: BTreeMap<String, u64>,
    pub log: Vec<RequestRecord>,
}

impl SimStats {
    pub fn requests_to(&self, node: &str) -> u64 {
        self.requests_per_node.get(node).copied().unwrap_or(0)
    }

    /// Time of the last request, if any.
    pub fn last_request_ms(&self) -> Option<u64> {
        self.log.iter().map(|r| r.at_ms).max()
    }
}
