//! Wire types shared across the Helix pipeline: trace events, chart and
//! diagram specs, media classification, and common id aliases.

mod backend;
mod chart;
mod media;

pub use backend::{
    AttachmentRef, BackendError, Embedder, ReasonChunk, ReasonRequest, ReasonStream, Reasoner,
};
pub use chart::{ChartKind, ChartSpec, Diagram, DiagramKind};
pub use media::MimeClass;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
pub type SessionId = Uuid;
/// Unique identifier for a memory record.
pub type RecordId = Uuid;
/// Unique identifier for an ingested attachment.
pub type DocumentId = Uuid;
/// Unique identifier for one analyze request.
pub type RequestId = Uuid;

/// Wrapper for trace events emitted during an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEvent {
    /// Unique id for the event.
    pub id: Uuid,
    /// Session id associated with the event.
    pub session_id: SessionId,
    /// Timestamp when the event was created.
    pub created_at: DateTime<Utc>,
    /// Event payload content.
    pub payload: TracePayload,
}

impl TraceEvent {
    /// Wrap a payload in a freshly stamped envelope.
    pub fn new(session_id: SessionId, payload: TracePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            created_at: Utc::now(),
            payload,
        }
    }
}

/// All trace event payloads a caller can observe while an analysis runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type", content = "content")]
pub enum TracePayload {
    /// One intermediate reasoning step from the backend.
    Thinking(String),
    /// A fragment of the final answer text.
    Response(String),
    /// A chart spec extracted from the finished answer.
    Chart(ChartSpec),
    /// Terminal marker: the analysis finished and was committed.
    Complete(CompleteInfo),
    /// Terminal marker: the analysis failed with a taxonomy code.
    Error(ErrorInfo),
}

/// Payload for the terminal `complete` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompleteInfo {
    /// Session the analysis ran in.
    pub session_id: SessionId,
    /// Soft warning set when the result could not be persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Payload for the terminal `error` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    /// Stable taxonomy code for the failure.
    pub code: String,
    /// Human-readable failure description.
    pub message: String,
    /// Whether the caller may retry without changing input.
    pub retryable: bool,
}

/// Sink receiving trace events as they are produced.
pub trait TraceSink: Send + Sync {
    /// Deliver one event; implementations must not block.
    fn emit(&self, event: TraceEvent);
}

/// Origin kind for a stored memory record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Committed answer for a past query.
    QueryResult,
    /// Chunk produced by ingesting an attachment.
    IngestedChunk,
}

impl RecordKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::QueryResult => "query_result",
            RecordKind::IngestedChunk => "ingested_chunk",
        }
    }
}

/// Summary view of a memory record for listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemorySummary {
    /// Record identifier.
    pub id: RecordId,
    /// Origin kind for the record.
    pub kind: RecordKind,
    /// Truncated content preview.
    pub preview: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{CompleteInfo, RecordKind, TraceEvent, TracePayload};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn trace_payload_serializes_with_type_and_content() {
        let value =
            serde_json::to_value(TracePayload::Thinking("step one".to_string())).expect("json");
        assert_eq!(value["type"], "thinking");
        assert_eq!(value["content"], "step one");
    }

    #[test]
    fn complete_event_carries_session_id() {
        let session_id = Uuid::new_v4();
        let event = TraceEvent::new(
            session_id,
            TracePayload::Complete(CompleteInfo {
                session_id,
                warning: None,
            }),
        );
        let value = serde_json::to_value(&event.payload).expect("json");
        assert_eq!(value["type"], "complete");
        assert_eq!(value["content"]["session_id"], session_id.to_string());
        assert_eq!(value["content"].get("warning"), None);
    }

    #[test]
    fn record_kind_round_trips() {
        assert_eq!(RecordKind::QueryResult.as_str(), "query_result");
        let kind: RecordKind = serde_json::from_str("\"ingested_chunk\"").expect("kind");
        assert_eq!(kind, RecordKind::IngestedChunk);
    }
}
