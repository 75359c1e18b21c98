//! Self-imposed pacing for the Idena API.
//!
//! The API publishes no rate-limit headers, so pacing is a set of fixed
//! pauses (between pages, between detail lookups, and backoff after a
//! transient failure). Every pause goes through the throttle so the run
//! summary can report how long we spent waiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Why the caller is pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Between list pages
    Page,
    /// Between per-flip detail requests
    Item,
    /// After a transient failure
    Backoff,
}

/// Fixed-delay throttle with request accounting.
#[derive(Debug, Default)]
pub struct Throttle {
    total_requests: AtomicU64,
    total_429s: AtomicU64,
    total_retries: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `duration`, recording the wait. A backoff counts as a retry
    /// even when its duration is zero.
    pub async fn pause(&self, duration: Duration, reason: PauseReason) {
        if reason == PauseReason::Backoff {
            self.total_retries.fetch_add(1, Ordering::Relaxed);
        }
        if duration.is_zero() {
            return;
        }
        debug!(?reason, wait_ms = duration.as_millis() as u64, "Pausing");
        self.total_wait_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        tokio::time::sleep(duration).await;
    }

    /// Record that a response (or a failure to get one) came back.
    pub fn record_response(&self, status: Option<u16>) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if status == Some(429) {
            let n = self.total_429s.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(total_429s = n, "Rate limited (429)");
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> ThrottleStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_429s = self.total_429s.load(Ordering::Relaxed);

        ThrottleStats {
            total_requests,
            total_429s,
            total_retries: self.total_retries.load(Ordering::Relaxed),
            total_wait_secs: self.total_wait_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            rate_limit_ratio: if total_requests > 0 {
                total_429s as f64 / total_requests as f64
            } else {
                0.0
            },
        }
    }
}

/// Throttle statistics.
#[derive(Debug, Clone, Default)]
pub struct ThrottleStats {
    pub total_requests: u64,
    pub total_429s: u64,
    pub total_retries: u64,
    pub total_wait_secs: f64,
    pub rate_limit_ratio: f64,
}
