use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Thread-safe counters describing analysis traffic.
#[derive(Default)]
pub struct AnalysisMetrics {
    requests_received: AtomicU64,
    summaries_completed: AtomicU64,
    requests_rejected: AtomicU64,
    requests_failed: AtomicU64,
    last_success_at: Mutex<Option<String>>,
}

impl AnalysisMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an incoming analysis request before validation.
    pub fn record_request(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a summary returned to a caller.
    pub fn record_success(&self) {
        self.summaries_completed.fetch_add(1, Ordering::Relaxed);
        let now = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        if let Ok(mut guard) = self.last_success_at.lock() {
            *guard = now;
        }
    }

    /// Record a request turned away with a client error.
    pub fn record_rejection(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that failed with a server-side or upstream error.
    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            summaries_completed: self.summaries_completed.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            last_success_at: self
                .last_success_at
                .lock()
                .ok()
                .and_then(|guard| guard.clone()),
        }
    }
}

/// Immutable view of analysis counters used for reporting.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of analysis requests received since startup.
    pub requests_received: u64,
    /// Number of summaries successfully returned.
    pub summaries_completed: u64,
    /// Requests rejected with a 4xx status.
    pub requests_rejected: u64,
    /// Requests that ended in a 5xx status.
    pub requests_failed: u64,
    /// RFC3339 timestamp of the most recent success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<String>,
}
