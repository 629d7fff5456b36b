use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe counters describing task activity.
pub struct TaskMetrics {
    started_at: Instant,
    requests_total: AtomicU64,
    requests_succeeded: AtomicU64,
    requests_failed: AtomicU64,
    model_calls: AtomicU64,
    chunks_processed: AtomicU64,
}

impl TaskMetrics {
    /// Create an empty metrics accumulator anchored at the current instant.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: AtomicU64::new(0),
            requests_succeeded: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            model_calls: AtomicU64::new(0),
            chunks_processed: AtomicU64::new(0),
        }
    }

    /// Record a finished request and whether it succeeded.
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one completion issued to the model gateway (retries included).
    pub fn record_model_call(&self) {
        self.model_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the chunk count produced for a document.
    pub fn record_chunks(&self, chunk_count: u64) {
        self.chunks_processed
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            model_calls: self.model_calls.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
        }
    }
}

impl Default for TaskMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of task counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the counters were created.
    pub uptime_secs: f64,
    /// Requests that reached a terminal state.
    pub requests_total: u64,
    /// Requests that completed successfully.
    pub requests_succeeded: u64,
    /// Requests that ended in an error.
    pub requests_failed: u64,
    /// Completions issued to the model gateway.
    pub model_calls: u64,
    /// Chunks produced across all documents.
    pub chunks_processed: u64,
}
