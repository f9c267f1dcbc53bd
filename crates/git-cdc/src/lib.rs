//! Change-data-capture pipeline for repository events.
//!
//! Events flow `capture -> batch -> transform -> sink`, with retry and
//! dead-letter handling between the transform and sink stages. This crate
//! owns that pipeline; it does not own event capture itself (that's the
//! caller's responsibility — e.g. a ref-update hook or pack-receive
//! callback constructing `CdcEvent`s as things happen).

pub mod batcher;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod sink;
pub mod transform;

pub use batcher::Batcher;
pub use event::{CdcEvent, EventType, SequenceCounter};
pub use metrics::Metrics;
pub use pipeline::{forward_into, CdcEmitter, ChannelEmitter, Pipeline, PipelineConfig};
pub use retry::RetryPolicy;
pub use sink::{CdcSink, DeadLetterHandler, DeadLetterRegistry};
pub use transform::{CdcRow, Transformer};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdcError {
    #[error("event transform failed: {0}")]
    Transform(String),

    #[error("sink write failed: {0}")]
    SinkFailed(String),

    #[error("pipeline is not running")]
    NotRunning,

    #[error("pipeline is already running")]
    AlreadyRunning,

    /// An event failed shape/field validation before it could be batched.
    #[error("event validation failed: {0}")]
    ValidationError(String),

    /// A batch failed during transform/encode; eligible for the retry policy.
    #[error("event processing failed: {0}")]
    ProcessingError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The sink rejected a write for reasons other than a transient failure.
    #[error("storage error: {0}")]
    StorageError(String),

    #[error("operation timed out after {0}ms")]
    TimeoutError(u64),

    /// The batcher's internal queue exceeded its configured capacity.
    #[error("buffer overflow: {pending} events pending, capacity {capacity}")]
    BufferOverflow { pending: usize, capacity: usize },
}
