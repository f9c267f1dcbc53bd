//! Wires batching, transform, retry, and dead-letter handling into a single
//! running pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::batcher::Batcher;
use crate::event::CdcEvent;
use crate::metrics::Metrics;
use crate::retry::RetryPolicy;
use crate::sink::{CdcSink, DeadLetterRegistry};
use crate::transform::Transformer;
use crate::CdcError;

/// Capture-side handoff of an event into a pipeline, kept synchronous so a
/// non-async call site (a ref-store transaction commit, say) can emit
/// without awaiting the pipeline's batching/retry machinery.
pub trait CdcEmitter: Send + Sync {
    fn emit(&self, event: CdcEvent);
}

/// A [`CdcEmitter`] backed by an unbounded channel. The paired
/// [`UnboundedReceiver`] is drained by [`forward_into`], which is typically
/// spawned once alongside the pipeline it feeds.
#[derive(Clone)]
pub struct ChannelEmitter {
    sender: UnboundedSender<CdcEvent>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, UnboundedReceiver<CdcEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl CdcEmitter for ChannelEmitter {
    /// Capture never blocks on delivery: if the receiving end (and thus the
    /// pipeline) is gone, the event is dropped rather than erroring out the
    /// caller's ref update or pack upload.
    fn emit(&self, event: CdcEvent) {
        let _ = self.sender.send(event);
    }
}

/// Drains events off `rx` into `pipeline`, one `Pipeline::process` call per
/// event, until the sending half is dropped. `now_ms` supplies the batching
/// timestamp for each event as it's forwarded.
pub async fn forward_into<S: CdcSink>(
    mut rx: UnboundedReceiver<CdcEvent>,
    pipeline: Arc<Pipeline<S>>,
    now_ms: impl Fn() -> u64,
) {
    while let Some(event) = rx.recv().await {
        let _ = pipeline.process(event, now_ms()).await;
    }
}

/// `{batch_size, flush_interval_ms, retry, stop_deadline_ms}`. Mirrors the
/// knobs `Batcher` and `RetryPolicy` already expose, plus the soft deadline
/// `stop()` gives a final in-flight flush before giving up and routing to
/// the dead-letter registry.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub retry: RetryPolicy,
    pub stop_deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            flush_interval_ms: 5_000,
            retry: RetryPolicy::default(),
            stop_deadline_ms: 30_000,
        }
    }
}

/// The running pipeline. `stopped -> running -> stopped`; `stop` is
/// idempotent, `start` rejects a pipeline that's already running, and
/// `process` rejects events while stopped.
pub struct Pipeline<S: CdcSink> {
    config: PipelineConfig,
    running: AtomicBool,
    batcher: Mutex<Batcher>,
    transformer: Transformer,
    sink: Arc<S>,
    dead_letters: DeadLetterRegistry,
    metrics: Arc<Metrics>,
}

impl<S: CdcSink> Pipeline<S> {
    pub fn new(config: PipelineConfig, sink: Arc<S>, dead_letters: DeadLetterRegistry) -> Self {
        Self {
            batcher: Mutex::new(Batcher::new(config.batch_size, config.flush_interval_ms)),
            transformer: Transformer::new(),
            sink,
            dead_letters,
            metrics: Arc::new(Metrics::new()),
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the pipeline. Rejects a second start on an already-running
    /// pipeline rather than silently resetting its state.
    pub fn start(&self) -> Result<(), CdcError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CdcError::AlreadyRunning);
        }
        Ok(())
    }

    /// Queue an event, flushing (with retry, falling back to dead-letter
    /// handling on exhaustion) if the batch fills. Rejected while stopped.
    pub async fn process(&self, event: CdcEvent, now_ms: u64) -> Result<(), CdcError> {
        if !self.is_running() {
            return Err(CdcError::NotRunning);
        }
        let batch = {
            let mut batcher = self.batcher.lock().await;
            batcher.push(event, now_ms)
        };
        if let Some(batch) = batch {
            self.emit(batch).await;
        }
        Ok(())
    }

    /// Flush the current batch if its oldest event has been pending longer
    /// than `flush_interval_ms`. Callers drive this with a periodic tick;
    /// a no-op while stopped.
    pub async fn tick(&self, now_ms: u64) {
        if !self.is_running() {
            return;
        }
        let batch = {
            let mut batcher = self.batcher.lock().await;
            batcher.check_timeout(now_ms)
        };
        if let Some(batch) = batch {
            self.emit(batch).await;
        }
    }

    /// Idempotent: stopping an already-stopped pipeline is a no-op.
    /// Flushes whatever is pending before fully transitioning to stopped,
    /// best-effort within `stop_deadline_ms` — events that can't be
    /// delivered in time are routed to the dead-letter registry rather
    /// than dropped.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let batch = {
            let mut batcher = self.batcher.lock().await;
            batcher.flush()
        };
        if batch.is_empty() {
            return;
        }
        let deadline = Duration::from_millis(self.config.stop_deadline_ms);
        if tokio::time::timeout(deadline, self.emit(batch.clone())).await.is_err() {
            self.metrics.record_error();
            self.dead_letters
                .dispatch(&batch, &CdcError::TimeoutError(self.config.stop_deadline_ms))
                .await;
        }
    }

    async fn emit(&self, batch: Vec<CdcEvent>) {
        let started_at = std::time::Instant::now();
        let rows = match self.transformer.transform_batch(&batch) {
            Ok(rows) => rows,
            Err(e) => {
                self.metrics.record_error();
                self.dead_letters
                    .dispatch(&batch, &CdcError::ProcessingError(e.to_string()))
                    .await;
                return;
            }
        };
        let bytes = match serde_json::to_vec(&rows) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.record_error();
                self.dead_letters
                    .dispatch(&batch, &CdcError::SerializationError(e.to_string()))
                    .await;
                return;
            }
        };
        let batch_id = uuid::Uuid::new_v4().to_string();

        let mut last_err = None;
        for attempt in 0..=self.config.retry.max_retries {
            match self.sink.write_batch(&batch_id, &batch, &bytes).await {
                Ok(()) => {
                    self.metrics.record_batch(batch.len() as u64, bytes.len() as u64);
                    self.metrics.record_latency_ms(started_at.elapsed().as_secs_f64() * 1000.0);
                    return;
                }
                Err(e) => {
                    last_err = Some(e);
                    if attempt < self.config.retry.max_retries {
                        let delay = self.config.retry.delay_ms(attempt, batch.len() as u64);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }
        self.metrics.record_error();
        self.metrics.record_latency_ms(started_at.elapsed().as_secs_f64() * 1000.0);
        let err = last_err.unwrap_or_else(|| CdcError::SinkFailed("unknown".into()));
        self.dead_letters.dispatch(&batch, &err).await;
    }
}
