//! Output and dead-letter sink traits.

use async_trait::async_trait;

use crate::event::CdcEvent;
use crate::CdcError;

/// The output handler a batch is finally handed to: `(batch_id, events,
/// transformed_bytes) -> Result`. `transformed_bytes` is whatever the
/// transformer produced for the batch (Parquet bytes in the full system;
/// this crate only guarantees the row shape, treating serialization to a
/// concrete columnar format as the sink's concern).
#[async_trait]
pub trait CdcSink: Send + Sync {
    async fn write_batch(
        &self,
        batch_id: &str,
        events: &[CdcEvent],
        transformed_bytes: &[u8],
    ) -> Result<(), CdcError>;
}

/// Handles events a batch could not deliver after retry exhaustion.
#[async_trait]
pub trait DeadLetterHandler: Send + Sync {
    async fn handle(&self, events: &[CdcEvent], error: &CdcError);
}

/// A registry of dead-letter handlers. Every registered handler is invoked
/// on retry exhaustion; a handler failing does not prevent the others from
/// running.
#[derive(Default)]
pub struct DeadLetterRegistry {
    handlers: Vec<Box<dyn DeadLetterHandler>>,
}

impl DeadLetterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn DeadLetterHandler>) {
        self.handlers.push(handler);
    }

    pub async fn dispatch(&self, events: &[CdcEvent], error: &CdcError) {
        for handler in &self.handlers {
            handler.handle(events, error).await;
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
