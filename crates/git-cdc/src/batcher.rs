//! Count/time-flush batching of CDC events.

use crate::event::CdcEvent;

/// Collects events and flushes a batch when either `batch_size` is reached
/// or `flush_interval_ms` has elapsed since the first event in the current
/// batch was queued. Time is supplied by the caller (`now_ms`) rather than
/// read from the system clock, so flush timing stays deterministic under
/// test; a real pipeline drives this with a periodic tick.
pub struct Batcher {
    batch_size: usize,
    flush_interval_ms: u64,
    pending: Vec<CdcEvent>,
    first_queued_at: Option<u64>,
}

impl Batcher {
    pub fn new(batch_size: usize, flush_interval_ms: u64) -> Self {
        Self {
            batch_size,
            flush_interval_ms,
            pending: Vec::new(),
            first_queued_at: None,
        }
    }

    /// Queue an event. Returns `Some(batch)` if `batch_size` was reached by
    /// this push, draining the pending queue.
    pub fn push(&mut self, event: CdcEvent, now_ms: u64) -> Option<Vec<CdcEvent>> {
        if self.pending.is_empty() {
            self.first_queued_at = Some(now_ms);
        }
        self.pending.push(event);
        if self.pending.len() >= self.batch_size {
            Some(self.drain())
        } else {
            None
        }
    }

    /// Check whether `flush_interval_ms` has elapsed since the oldest
    /// pending event; if so, drain and return the batch.
    pub fn check_timeout(&mut self, now_ms: u64) -> Option<Vec<CdcEvent>> {
        let first = self.first_queued_at?;
        if now_ms.saturating_sub(first) >= self.flush_interval_ms {
            Some(self.drain())
        } else {
            None
        }
    }

    /// Flush whatever is pending, regardless of count or elapsed time.
    /// Returns an empty vec if nothing is queued.
    pub fn flush(&mut self) -> Vec<CdcEvent> {
        self.drain()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn drain(&mut self) -> Vec<CdcEvent> {
        self.first_queued_at = None;
        std::mem::take(&mut self.pending)
    }
}
