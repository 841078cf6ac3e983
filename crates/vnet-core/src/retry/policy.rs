use std::time::Duration;

/// High-level classification of a failed chunk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Per-chunk timer fired, or the transport reported a timeout.
    Timeout,
    /// Node answered "node busy".
    Busy,
    /// Node answered "no slice available".
    NoSlice,
    /// Connection could not be made or broke.
    Connection,
    /// Reply could not be decoded or did not match the request.
    Protocol,
    /// The connection was destroyed with the request outstanding.
    Destroyed,
}

impl ErrorKind {
    /// Whether the node may still serve other chunks after this failure.
    /// Timeouts are counted separately against `max_node_timeouts`.
    pub fn keeps_node(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Busy)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop using the node.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with caps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Compute the next backoff delay for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first failure). Returns `RetryDecision::NoRetry`
    /// when we should stop retrying.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::NoSlice
            | ErrorKind::Connection
            | ErrorKind::Protocol
            | ErrorKind::Destroyed => RetryDecision::NoRetry,
            ErrorKind::Timeout | ErrorKind::Busy => {
                // base * 2^(attempt-1), capped.
                let exp = 1u32 << attempt.saturating_sub(1).min(8);
                let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
                RetryDecision::RetryAfter(delay)
            }
        }
    }

    /// Backoff for a busy reply: the policy delay, stretched to the node's own
    /// hint when that is longer, never beyond `max_delay`.
    pub fn busy_backoff(&self, attempt: u32, hint: Duration) -> RetryDecision {
        match self.decide(attempt, ErrorKind::Busy) {
            RetryDecision::RetryAfter(d) => {
                RetryDecision::RetryAfter(d.max(hint).min(self.max_delay))
            }
            RetryDecision::NoRetry => RetryDecision::NoRetry,
        }
    }
}
