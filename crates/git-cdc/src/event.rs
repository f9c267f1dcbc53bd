//! CDC event model.

use serde::{Deserialize, Serialize};

/// The closed set of observable git operations a capture session emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ObjectCreated,
    ObjectDeleted,
    RefUpdated,
    PackReceived,
    CommitCreated,
    TreeModified,
    BranchCreated,
    BranchDeleted,
    TagCreated,
    MergeCompleted,
}

/// `(id, type, source, timestamp_ms, sequence, schema_version, payload)`.
///
/// Sequence numbers are strictly increasing within one capture session;
/// assignment is the capture session's responsibility, not this type's —
/// `CdcEvent::new` takes `sequence` and `timestamp_ms` as parameters so
/// event construction stays deterministic under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdcEvent {
    pub id: String,
    pub event_type: EventType,
    pub source: String,
    pub timestamp_ms: u64,
    pub sequence: u64,
    pub schema_version: u32,
    pub payload: serde_json::Value,
}

impl CdcEvent {
    pub fn new(
        id: impl Into<String>,
        event_type: EventType,
        source: impl Into<String>,
        timestamp_ms: u64,
        sequence: u64,
        schema_version: u32,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            event_type,
            source: source.into(),
            timestamp_ms,
            sequence,
            schema_version,
            payload,
        }
    }

    /// The object/commit sha carried in the payload, if the payload shape
    /// has a `"sha"` field. Extracted eagerly by the transformer for
    /// push-down filter efficiency.
    pub fn sha(&self) -> Option<&str> {
        self.payload.get("sha").and_then(|v| v.as_str())
    }
}

/// A monotonic sequence counter scoped to one capture session.
#[derive(Debug, Default)]
pub struct SequenceCounter(u64);

impl SequenceCounter {
    pub fn new() -> Self {
        Self(0)
    }

    /// Returns the next sequence number, starting at 0.
    pub fn next(&mut self) -> u64 {
        let n = self.0;
        self.0 += 1;
        n
    }
}
