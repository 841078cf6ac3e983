//! Time budget of one slice download.
//!
//! All arithmetic uses `tokio::time::Instant` so sessions can be driven by a
//! paused clock in tests.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::VnetConfig;

/// Absolute deadline plus the derived per-chunk and fallback thresholds.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineBudget {
    started: Instant,
    deadline: Instant,
    total: Duration,
    min_chunk_timeout: Duration,
    chunk_timeout_fraction: f64,
    fallback_reserve: Duration,
}

impl DeadlineBudget {
    /// Budget of `relative` starting at `now`.
    pub fn new(now: Instant, relative: Duration, cfg: &VnetConfig) -> Self {
        let round_trip = cfg.round_trip_estimate();
        Self {
            started: now,
            deadline: now + relative,
            total: relative,
            min_chunk_timeout: cfg.min_chunk_timeout(),
            chunk_timeout_fraction: cfg.chunk_timeout_fraction,
            fallback_reserve: relative
                .mul_f64(cfg.fallback_reserve_fraction)
                .max(round_trip),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Remaining time has fallen to the fallback reserve.
    pub fn has_fallback_budget(&self, now: Instant) -> bool {
        self.remaining(now) <= self.fallback_reserve
    }

    /// Instant from which [`Self::has_fallback_budget`] holds.
    pub fn fallback_window_opens_at(&self) -> Instant {
        self.deadline
            .checked_sub(self.fallback_reserve)
            .map_or(self.started, |at| at.max(self.started))
    }

    /// Timeout for a chunk request issued at `now`.
    pub fn chunk_timeout(&self, now: Instant) -> Duration {
        self.remaining(now)
            .mul_f64(self.chunk_timeout_fraction)
            .max(self.min_chunk_timeout)
    }
}
