use super::DownloadResult;

/// A download request rejected before a session was started, or a session
/// task that died.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("slice {0} has zero size")]
    ZeroSizeSlice(u16),
    #[error("relative deadline must be positive, got {0} ms")]
    NonPositiveDeadline(i64),
    #[error("download_slice must be called from within a tokio runtime")]
    NoRuntime,
    #[error("session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SessionError {
    /// Result code a caller of the integer contract would see.
    pub fn result(&self) -> DownloadResult {
        match self {
            SessionError::Join(_) => DownloadResult::Cancelled,
            _ => DownloadResult::InvalidInput,
        }
    }
}
