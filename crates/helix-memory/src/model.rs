//! Memory record model shared by the index and the store.

use chrono::{DateTime, Utc};
use helix_protocol::{DocumentId, MemorySummary, RecordId, RecordKind, SessionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted memory record. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Record identifier.
    pub id: RecordId,
    /// Owning session; records are never shared across sessions.
    pub session_id: SessionId,
    /// Origin kind for the record.
    pub kind: RecordKind,
    /// Record content (plain text or serialized JSON).
    pub content: String,
    /// Embedding vector produced by the embedding backend.
    pub embedding: Vec<f32>,
    /// Attachment this record was chunked from, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Build a new record stamped with a fresh id and the current time.
    pub fn new(
        session_id: SessionId,
        kind: RecordKind,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            kind,
            content: content.into(),
            embedding,
            document_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the originating document id.
    pub fn with_document(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }

    /// Build a listing summary with a bounded content preview.
    pub fn summary(&self, preview_chars: usize) -> MemorySummary {
        MemorySummary {
            id: self.id,
            kind: self.kind,
            preview: truncate_chars(&self.content, preview_chars),
            created_at: self.created_at,
        }
    }
}

/// Truncate a string to a maximum character count.
pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::MemoryRecord;
    use helix_protocol::RecordKind;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn summary_truncates_long_content() {
        let record = MemoryRecord::new(
            Uuid::new_v4(),
            RecordKind::IngestedChunk,
            "x".repeat(500),
            vec![0.1, 0.2],
        );
        let summary = record.summary(100);
        assert_eq!(summary.preview.chars().count(), 100);
        assert_eq!(summary.kind, RecordKind::IngestedChunk);
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = MemoryRecord::new(
            Uuid::new_v4(),
            RecordKind::QueryResult,
            "answer",
            vec![0.5; 4],
        )
        .with_document(Uuid::new_v4());
        let json = serde_json::to_string(&record).expect("json");
        let parsed: MemoryRecord = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, record);
    }
}
