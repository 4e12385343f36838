//! Capability interfaces for the embedding and reasoning backends.
//!
//! The pipeline never talks to a concrete model provider; it goes through
//! these traits so the core can be exercised with deterministic fakes.

use crate::{DiagramKind, MimeClass};
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by backend capabilities.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The embedding call failed.
    #[error("embedding failed: {0}")]
    Embedding(String),
    /// The reasoning call failed or returned malformed output.
    #[error("reasoning failed: {0}")]
    Reasoning(String),
    /// A multimodal summarization or extraction call failed.
    #[error("media processing failed: {0}")]
    Media(String),
}

/// Reference to a raw attachment passed alongside a reasoning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Original filename of the upload.
    pub filename: String,
    /// Classified media class.
    pub mime_class: MimeClass,
}

/// Context bundle for one reasoning invocation.
#[derive(Debug, Clone, Default)]
pub struct ReasonRequest {
    /// The caller's query text.
    pub query: String,
    /// Past-session context entries, most relevant first.
    pub memory_context: Vec<String>,
    /// Retrieved document chunks, most relevant first.
    pub document_context: Vec<String>,
    /// References to attachments uploaded with this request.
    pub attachments: Vec<AttachmentRef>,
}

/// One unit of streamed reasoning output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonChunk {
    /// An intermediate reasoning step.
    Thinking(String),
    /// A fragment of the final answer text.
    Answer(String),
}

/// Live stream of reasoning output.
pub type ReasonStream = Pin<Box<dyn Stream<Item = Result<ReasonChunk, BackendError>> + Send>>;

#[async_trait]
/// Embedding capability turning text into fixed-dimension vectors.
pub trait Embedder: Send + Sync {
    /// Dimension of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a batch of inputs, one vector per input, in order.
    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, BackendError>;
}

#[async_trait]
/// Reasoning capability producing a streamed trace and answer.
pub trait Reasoner: Send + Sync {
    /// Run a reasoning call, yielding thinking steps and answer fragments
    /// as they are produced.
    async fn reason(&self, request: ReasonRequest) -> Result<ReasonStream, BackendError>;

    /// Summarize an image or video attachment into descriptive text.
    async fn describe_media(
        &self,
        filename: &str,
        mime_class: MimeClass,
        bytes: &[u8],
    ) -> Result<String, BackendError>;

    /// Reduce a PDF to plain text, one entry per page.
    async fn extract_pdf_text(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Vec<String>, BackendError>;

    /// Draft diagram source from a description, when the backend supports
    /// it. Callers fall back to built-in templates on `None`.
    async fn draft_diagram(
        &self,
        _description: &str,
        _kind: DiagramKind,
    ) -> Result<Option<String>, BackendError> {
        Ok(None)
    }
}
