//! Request latency and error counters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use persona_types::status::PerformanceSnapshot;

/// Number of most recent latencies kept for average/p95.
const LATENCY_WINDOW: usize = 1000;

/// Tracks request counts, errors, in-flight requests, and recent latencies.
#[derive(Debug)]
pub struct PerformanceMonitor {
    started_at: Instant,
    total_requests: AtomicU64,
    error_count: AtomicU64,
    in_flight: AtomicU64,
    latencies_ms: Mutex<VecDeque<f64>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            latencies_ms: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW)),
        }
    }

    /// Mark a request as started. Dropping the guard without calling
    /// [`RequestGuard::finish`] records the request as failed.
    pub fn start(self: &Arc<Self>) -> RequestGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        RequestGuard {
            monitor: Arc::clone(self),
            started: Instant::now(),
            finished: false,
        }
    }

    /// Record a completed request.
    pub fn record(&self, elapsed: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }

        let mut window = self
            .latencies_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if window.len() == LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let error_count = self.error_count.load(Ordering::Relaxed);

        let mut sorted: Vec<f64> = self
            .latencies_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        sorted.sort_by(f64::total_cmp);

        let (avg_response_ms, p95_response_ms) = if sorted.is_empty() {
            (0.0, 0.0)
        } else {
            let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;
            let idx = ((sorted.len() as f64) * 0.95).ceil() as usize;
            let p95 = sorted[idx.saturating_sub(1).min(sorted.len() - 1)];
            (round2(avg), round2(p95))
        };

        let error_rate_percent = if total_requests == 0 {
            0.0
        } else {
            round2(error_count as f64 / total_requests as f64 * 100.0)
        };

        PerformanceSnapshot {
            total_requests,
            error_count,
            error_rate_percent,
            in_flight_requests: self.in_flight.load(Ordering::Relaxed),
            avg_response_ms,
            p95_response_ms,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// In-flight marker for one request.
pub struct RequestGuard {
    monitor: Arc<PerformanceMonitor>,
    started: Instant,
    finished: bool,
}

impl RequestGuard {
    /// Record the request outcome and release the in-flight slot.
    pub fn finish(mut self, success: bool) {
        self.complete(success);
    }

    fn complete(&mut self, success: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.monitor.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.monitor.record(self.started.elapsed(), success);
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.complete(false);
    }
}
