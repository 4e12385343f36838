//! Attachment ingestion: classification, text extraction, chunking,
//! embedding, and all-or-nothing memory writes.

use crate::error::HelixCoreError;
use helix_config::IngestConfig;
use helix_memory::{MemoryRecord, MemoryStore};
use helix_protocol::{DocumentId, Embedder, MimeClass, Reasoner, RecordId, RecordKind, SessionId};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Raw uploaded attachment, before classification.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Original filename of the upload.
    pub filename: String,
    /// Declared content type.
    pub content_type: String,
    /// Raw payload bytes.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Build an attachment from its parts.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Receipt for one ingested attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedAttachment {
    /// Document id minted for the attachment.
    pub document_id: DocumentId,
    /// Session the chunks were stored under.
    pub session_id: SessionId,
    /// Original filename.
    pub filename: String,
    /// Classified media class.
    pub mime_class: MimeClass,
    /// Ids of the memory records written for the attachment.
    pub chunk_ids: Vec<RecordId>,
}

/// Turns uploads into embedded memory records.
///
/// Each attachment either lands completely or not at all: extraction,
/// chunking, and embedding all finish before the first record is written,
/// and the store's batch append is itself atomic.
pub struct Ingestor {
    config: IngestConfig,
    embedder: Arc<dyn Embedder>,
    reasoner: Arc<dyn Reasoner>,
    store: Arc<MemoryStore>,
    /// Chunk ids ingested since each session's last analysis. The next
    /// analysis drains these and includes them as context unconditionally,
    /// so a fresh upload is in scope even when retrieval would rank it out.
    recent_chunks: Mutex<HashMap<SessionId, Vec<RecordId>>>,
}

impl Ingestor {
    /// Create an ingestor over the given backends and store.
    pub fn new(
        config: IngestConfig,
        embedder: Arc<dyn Embedder>,
        reasoner: Arc<dyn Reasoner>,
        store: Arc<MemoryStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            reasoner,
            store,
            recent_chunks: Mutex::new(HashMap::new()),
        }
    }

    /// Drain the chunk ids ingested into a session since its last analysis.
    pub fn take_recent_chunks(&self, session_id: SessionId) -> Vec<RecordId> {
        self.recent_chunks
            .lock()
            .remove(&session_id)
            .unwrap_or_default()
    }

    /// Ingest one attachment into a session's memory.
    pub async fn ingest(
        &self,
        session_id: SessionId,
        attachment: &Attachment,
    ) -> Result<IngestedAttachment, HelixCoreError> {
        let mime_class = MimeClass::classify(&attachment.content_type, &attachment.filename)
            .ok_or_else(|| HelixCoreError::UnsupportedMedia {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
            })?;
        if attachment.bytes.len() > self.config.max_upload_bytes {
            return Err(HelixCoreError::PayloadTooLarge {
                filename: attachment.filename.clone(),
                size: attachment.bytes.len(),
                limit: self.config.max_upload_bytes,
            });
        }

        let chunks = self.extract_chunks(mime_class, attachment).await?;
        let document_id = Uuid::new_v4();
        let contents = label_chunks(&attachment.filename, &chunks);
        let embeddings = self.embedder.embed(contents.clone()).await?;

        let records: Vec<MemoryRecord> = contents
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| {
                MemoryRecord::new(session_id, RecordKind::IngestedChunk, content, embedding)
                    .with_document(document_id)
            })
            .collect();
        let chunk_ids: Vec<RecordId> = records.iter().map(|record| record.id).collect();
        self.store.append_batch(records)?;
        self.recent_chunks
            .lock()
            .entry(session_id)
            .or_default()
            .extend(chunk_ids.iter().copied());

        info!(
            "ingested attachment (session_id={}, filename={}, class={}, chunks={})",
            session_id,
            attachment.filename,
            mime_class.as_str(),
            chunk_ids.len()
        );
        Ok(IngestedAttachment {
            document_id,
            session_id,
            filename: attachment.filename.clone(),
            mime_class,
            chunk_ids,
        })
    }

    /// Reduce an attachment to its text chunks, per media class.
    async fn extract_chunks(
        &self,
        mime_class: MimeClass,
        attachment: &Attachment,
    ) -> Result<Vec<String>, HelixCoreError> {
        let chunks = match mime_class {
            MimeClass::Text | MimeClass::Sequence => {
                let text = String::from_utf8_lossy(&attachment.bytes);
                chunk_text(&text, self.config.chunk_size, self.config.chunk_overlap)
            }
            MimeClass::Pdf => {
                let pages = self
                    .reasoner
                    .extract_pdf_text(&attachment.filename, &attachment.bytes)
                    .await?;
                chunk_text(
                    &pages.join("\n"),
                    self.config.chunk_size,
                    self.config.chunk_overlap,
                )
            }
            MimeClass::Image | MimeClass::Video => {
                let description = self
                    .reasoner
                    .describe_media(&attachment.filename, mime_class, &attachment.bytes)
                    .await?;
                vec![description]
            }
        };
        debug!(
            "extracted chunks (filename={}, count={})",
            attachment.filename,
            chunks.len()
        );
        Ok(chunks)
    }
}

/// Prefix each chunk with its source document and position.
fn label_chunks(filename: &str, chunks: &[String]) -> Vec<String> {
    let total = chunks.len();
    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            format!(
                "[Document: {filename}] (Part {part}/{total})\n{chunk}",
                part = index + 1
            )
        })
        .collect()
}

/// Split text into sliding windows of `size` characters, stepping by
/// `size - overlap` so adjacent chunks share context.
fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= size {
        return vec![text.to_string()];
    }
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
