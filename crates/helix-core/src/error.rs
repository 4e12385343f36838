//! Error taxonomy for the analysis pipeline.

use helix_protocol::{BackendError, SessionId};
use thiserror::Error;

/// Errors returned by pipeline operations.
///
/// `code()` values are stable and surface in terminal trace events;
/// `retryable()` tells callers whether retrying without changing input is
/// worthwhile.
#[derive(Debug, Error)]
pub enum HelixCoreError {
    /// The request carried neither query text nor attachments.
    #[error("empty request: provide query text or at least one attachment")]
    EmptyRequest,
    /// Attachment media class is outside the allow-list.
    #[error("unsupported media for {filename}: {content_type}")]
    UnsupportedMedia {
        filename: String,
        content_type: String,
    },
    /// Attachment exceeds the upload size ceiling.
    #[error("payload too large for {filename}: {size} bytes (limit {limit})")]
    PayloadTooLarge {
        filename: String,
        size: usize,
        limit: usize,
    },
    /// The embedding backend call failed.
    #[error("embedding failure: {0}")]
    Embedding(String),
    /// The reasoning backend call failed or returned malformed output.
    #[error("reasoning backend error: {0}")]
    ReasoningBackend(String),
    /// Session id is unknown or expired.
    #[error("unknown session: {0}")]
    NotFound(SessionId),
    /// The end-to-end analyze ceiling was exceeded.
    #[error("analysis timed out after {seconds}s")]
    Timeout { seconds: u64 },
    /// Memory store or index failure before the answer existed.
    #[error("memory error: {0}")]
    Memory(String),
    /// A spawned pipeline task failed to run to completion.
    #[error("task error: {0}")]
    Task(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HelixCoreError {
    /// Stable taxonomy code carried by terminal trace events.
    pub fn code(&self) -> &'static str {
        match self {
            HelixCoreError::EmptyRequest => "empty_request",
            HelixCoreError::UnsupportedMedia { .. } => "unsupported_media",
            HelixCoreError::PayloadTooLarge { .. } => "payload_too_large",
            HelixCoreError::Embedding(_) => "embedding_failure",
            HelixCoreError::ReasoningBackend(_) => "reasoning_backend_error",
            HelixCoreError::NotFound(_) => "not_found",
            HelixCoreError::Timeout { .. } => "timeout",
            HelixCoreError::Memory(_) => "memory_error",
            HelixCoreError::Task(_) => "internal_error",
            HelixCoreError::Io(_) => "io_error",
        }
    }

    /// Whether retrying without changing input may succeed.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            HelixCoreError::Timeout { .. } | HelixCoreError::ReasoningBackend(_)
        )
    }
}

impl From<helix_memory::MemoryError> for HelixCoreError {
    fn from(err: helix_memory::MemoryError) -> Self {
        HelixCoreError::Memory(err.to_string())
    }
}

impl From<BackendError> for HelixCoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Embedding(message) => HelixCoreError::Embedding(message),
            BackendError::Reasoning(message) => HelixCoreError::ReasoningBackend(message),
            BackendError::Media(message) => HelixCoreError::ReasoningBackend(message),
        }
    }
}
