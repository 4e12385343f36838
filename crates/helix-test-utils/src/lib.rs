//! Deterministic fakes for exercising the pipeline without real model
//! backends: hash-based and keyword-axis embedders, a scripted reasoner,
//! failing variants, and an event-collecting trace sink.

use async_trait::async_trait;
use futures_util::stream;
use helix_protocol::{
    BackendError, DiagramKind, Embedder, MimeClass, ReasonChunk, ReasonRequest, ReasonStream,
    Reasoner, TraceEvent, TraceSink,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// Embedder producing stable pseudo-embeddings from a SHA-256 digest.
///
/// Identical inputs always embed to identical vectors, so similarity
/// assertions in tests are exact.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder with an explicit vector dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimension: 16 }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, BackendError> {
        Ok(inputs
            .iter()
            .map(|input| {
                let digest = Sha256::digest(input.as_bytes());
                digest
                    .iter()
                    .cycle()
                    .take(self.dimension)
                    .map(|byte| f32::from(*byte) / 255.0)
                    .collect()
            })
            .collect())
    }
}

/// Embedder that maps inputs onto one of two orthogonal axes.
///
/// Inputs containing the needle embed to `[1, 0]`, everything else to
/// `[0, 1]`, so tests can place records exactly on or off a query's
/// similarity axis.
pub struct KeywordEmbedder {
    needle: String,
}

impl KeywordEmbedder {
    /// Create an embedder splitting on the given needle.
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        2
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, BackendError> {
        Ok(inputs
            .iter()
            .map(|input| {
                if input.contains(&self.needle) {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect())
    }
}

/// Embedder that fails every call with a fixed message.
pub struct FailingEmbedder {
    message: String,
}

impl FailingEmbedder {
    /// Create a failing embedder with the given error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    fn dimension(&self) -> usize {
        16
    }

    async fn embed(&self, _inputs: Vec<String>) -> Result<Vec<Vec<f32>>, BackendError> {
        Err(BackendError::Embedding(self.message.clone()))
    }
}

/// Reasoner replaying a scripted trace and answer.
///
/// Every capability has a sensible default so tests only configure what
/// they assert on. Requests are recorded for inspection.
#[derive(Default)]
pub struct ScriptedReasoner {
    thinking: Vec<String>,
    answer: Option<String>,
    media_description: Option<String>,
    pdf_pages: Option<Vec<String>>,
    diagram_source: Option<String>,
    requests: Mutex<Vec<ReasonRequest>>,
}

impl ScriptedReasoner {
    /// Script the intermediate thinking steps.
    pub fn with_thinking(mut self, thinking: Vec<String>) -> Self {
        self.thinking = thinking;
        self
    }

    /// Script the final answer text.
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    /// Script the description returned for image and video uploads.
    pub fn with_media_description(mut self, description: impl Into<String>) -> Self {
        self.media_description = Some(description.into());
        self
    }

    /// Script the per-page text returned for PDF uploads.
    pub fn with_pdf_pages(mut self, pages: Vec<String>) -> Self {
        self.pdf_pages = Some(pages);
        self
    }

    /// Script a drafted diagram source instead of the template fallback.
    pub fn with_diagram_source(mut self, source: impl Into<String>) -> Self {
        self.diagram_source = Some(source.into());
        self
    }

    /// The most recent reasoning request, if any call was made.
    pub fn last_request(&self) -> Option<ReasonRequest> {
        self.requests.lock().last().cloned()
    }

    /// Number of reasoning calls made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn reason(&self, request: ReasonRequest) -> Result<ReasonStream, BackendError> {
        self.requests.lock().push(request);
        let answer = self
            .answer
            .clone()
            .unwrap_or_else(|| "Analysis complete.".to_string());
        let chunks: Vec<Result<ReasonChunk, BackendError>> = self
            .thinking
            .iter()
            .cloned()
            .map(|step| Ok(ReasonChunk::Thinking(step)))
            .chain(std::iter::once(Ok(ReasonChunk::Answer(answer))))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn describe_media(
        &self,
        filename: &str,
        _mime_class: MimeClass,
        _bytes: &[u8],
    ) -> Result<String, BackendError> {
        Ok(self
            .media_description
            .clone()
            .unwrap_or_else(|| format!("Visual summary of {filename}")))
    }

    async fn extract_pdf_text(
        &self,
        filename: &str,
        _bytes: &[u8],
    ) -> Result<Vec<String>, BackendError> {
        Ok(self
            .pdf_pages
            .clone()
            .unwrap_or_else(|| vec![format!("Extracted text from {filename}")]))
    }

    async fn draft_diagram(
        &self,
        _description: &str,
        _kind: DiagramKind,
    ) -> Result<Option<String>, BackendError> {
        Ok(self.diagram_source.clone())
    }
}

/// Reasoner that fails every call with a fixed message.
pub struct FailingReasoner {
    message: String,
}

impl FailingReasoner {
    /// Create a failing reasoner with the given error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Reasoner for FailingReasoner {
    async fn reason(&self, _request: ReasonRequest) -> Result<ReasonStream, BackendError> {
        Err(BackendError::Reasoning(self.message.clone()))
    }

    async fn describe_media(
        &self,
        _filename: &str,
        _mime_class: MimeClass,
        _bytes: &[u8],
    ) -> Result<String, BackendError> {
        Err(BackendError::Media(self.message.clone()))
    }

    async fn extract_pdf_text(
        &self,
        _filename: &str,
        _bytes: &[u8],
    ) -> Result<Vec<String>, BackendError> {
        Err(BackendError::Media(self.message.clone()))
    }
}

/// Trace sink that buffers every emitted event.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl CollectingSink {
    /// Snapshot of the events emitted so far, in order.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }
}

impl TraceSink for CollectingSink {
    fn emit(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}
