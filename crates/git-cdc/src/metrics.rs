//! Pipeline metrics: counters plus a windowed latency average.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const LATENCY_WINDOW: usize = 1000;

/// Counters and a windowed latency sample exposed by a running pipeline.
/// Counters use relaxed atomics since they're monotonic and only read for
/// reporting; the latency window needs a lock since it's a bounded
/// ring buffer.
#[derive(Default)]
pub struct Metrics {
    events_processed: AtomicU64,
    batches_generated: AtomicU64,
    bytes_written: AtomicU64,
    errors: AtomicU64,
    latencies_ms: Mutex<VecDeque<f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch(&self, event_count: u64, bytes: u64) {
        self.events_processed.fetch_add(event_count, Ordering::Relaxed);
        self.batches_generated.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency_ms(&self, latency_ms: f64) {
        let mut window = self.latencies_ms.lock().unwrap();
        window.push_back(latency_ms);
        if window.len() > LATENCY_WINDOW {
            window.pop_front();
        }
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    pub fn batches_generated(&self) -> u64 {
        self.batches_generated.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Average of the last (up to) 1000 recorded latencies, or `0.0` if
    /// none have been recorded yet.
    pub fn avg_processing_latency_ms(&self) -> f64 {
        let window = self.latencies_ms.lock().unwrap();
        if window.is_empty() {
            return 0.0;
        }
        window.iter().sum::<f64>() / window.len() as f64
    }
}
