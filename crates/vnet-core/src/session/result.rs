//! Terminal results and the per-session report.

use std::fmt;

use serde::Serialize;

/// Outcome passed to the completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadResult {
    Success,
    DeadlineExceeded,
    NoNodesAvailable,
    StorageFailure,
    InvalidInput,
    Cancelled,
}

impl DownloadResult {
    /// Integer form: 0 for success, negative for failures.
    pub fn code(self) -> i32 {
        match self {
            DownloadResult::Success => 0,
            DownloadResult::DeadlineExceeded => -1,
            DownloadResult::NoNodesAvailable => -2,
            DownloadResult::StorageFailure => -3,
            DownloadResult::InvalidInput => -4,
            DownloadResult::Cancelled => -5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DownloadResult::Success => "success",
            DownloadResult::DeadlineExceeded => "deadline_exceeded",
            DownloadResult::NoNodesAvailable => "no_nodes_available",
            DownloadResult::StorageFailure => "storage_failure",
            DownloadResult::InvalidInput => "invalid_input",
            DownloadResult::Cancelled => "cancelled",
        }
    }

    pub fn is_success(self) -> bool {
        self == DownloadResult::Success
    }
}

impl fmt::Display for DownloadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report returned by [`super::SessionHandle::finished`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub result: DownloadResult,
    pub slice_id: u16,
    pub slice_size: u32,
    /// Bytes stored from completed chunks.
    pub bytes: u64,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub requests_issued: u64,
    pub chunk_timeouts: u64,
    pub busy_replies: u64,
    pub dead_nodes: usize,
    pub fallback_requests: u64,
    pub connections_opened: usize,
    pub elapsed_ms: u64,
    /// SHA-256 of the assembled slice, on success.
    pub sha256: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_zero_only_for_success() {
        assert_eq!(DownloadResult::Success.code(), 0);
        for r in [
            DownloadResult::DeadlineExceeded,
            DownloadResult::NoNodesAvailable,
            DownloadResult::StorageFailure,
            DownloadResult::InvalidInput,
            DownloadResult::Cancelled,
        ] {
            assert!(r.code() < 0, "{r}");
            assert!(!r.is_success());
        }
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DownloadResult::NoNodesAvailable).unwrap(),
            "\"no_nodes_available\""
        );
    }
}
