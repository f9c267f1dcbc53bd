//! Maps CDC events to the row shape a columnar sink expects.

use serde::{Deserialize, Serialize};

use crate::event::{CdcEvent, EventType};
use crate::CdcError;

/// One row of the transformed batch: `(event_id, event_type, source,
/// timestamp, sequence, version, payload_json, sha)`. `sha` is pulled out
/// of the payload ahead of time so a sink can push down filters on it
/// without parsing `payload_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdcRow {
    pub event_id: String,
    pub event_type: EventType,
    pub source: String,
    pub timestamp: u64,
    pub sequence: u64,
    pub version: u32,
    pub payload_json: String,
    pub sha: Option<String>,
}

/// Transforms events into rows. Stateless; exists as a type (rather than a
/// bare function) so it can carry configuration in the future without
/// breaking callers, matching this codebase's preference for named
/// collaborators over free functions at component boundaries.
#[derive(Debug, Default)]
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    pub fn transform(&self, event: &CdcEvent) -> Result<CdcRow, CdcError> {
        let payload_json = serde_json::to_string(&event.payload)
            .map_err(|e| CdcError::Transform(e.to_string()))?;
        Ok(CdcRow {
            event_id: event.id.clone(),
            event_type: event.event_type,
            source: event.source.clone(),
            timestamp: event.timestamp_ms,
            sequence: event.sequence,
            version: event.schema_version,
            payload_json,
            sha: event.sha().map(str::to_string),
        })
    }

    pub fn transform_batch(&self, events: &[CdcEvent]) -> Result<Vec<CdcRow>, CdcError> {
        events.iter().map(|e| self.transform(e)).collect()
    }
}
