//! Analysis coordination: drives one request through ingestion,
//! retrieval, reasoning, streaming, and the memory commit.

use crate::charts::extract_charts;
use crate::error::HelixCoreError;
use crate::ingest::{Attachment, Ingestor};
use crate::retrieval::RetrievalOrchestrator;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use helix_config::AnalyzeConfig;
use helix_memory::{MemoryRecord, MemoryStore};
use helix_protocol::{
    AttachmentRef, ChartSpec, CompleteInfo, Embedder, ReasonChunk, ReasonRequest, Reasoner,
    RecordId, RecordKind, SessionId, TraceEvent, TracePayload, TraceSink,
};
use log::{debug, info, warn};
use serde_json::json;
use std::sync::Arc;

/// One analyze request, before session resolution.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// Session to run in; a fresh session is minted when absent.
    pub session_id: Option<SessionId>,
    /// The caller's query text.
    pub query_text: String,
    /// Attachments uploaded with the request.
    pub attachments: Vec<Attachment>,
}

impl AnalysisRequest {
    /// Build a bare query request.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            query_text: text.into(),
            ..Self::default()
        }
    }

    /// Pin the request to an existing session.
    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Add an attachment to the request.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Whether the request carries neither text nor attachments.
    pub fn is_empty(&self) -> bool {
        self.query_text.trim().is_empty() && self.attachments.is_empty()
    }
}

/// Completed analysis output.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Session the analysis ran in.
    pub session_id: SessionId,
    /// Final answer text, chart blocks included.
    pub answer_text: String,
    /// Intermediate reasoning steps, in emission order.
    pub thinking_trace: Vec<String>,
    /// Charts extracted from the answer.
    pub chart_specs: Vec<ChartSpec>,
    /// Ids of the memory records supplied as context.
    pub memory_context_used: Vec<RecordId>,
    /// Soft warning set when the result could not be persisted.
    pub warning: Option<String>,
    /// Completion timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Pipeline phases, in order. An analysis either reaches `Done` or stops
/// at the phase that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Received,
    Ingesting,
    Retrieving,
    Reasoning,
    Streaming,
    Committing,
    Done,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Received => "received",
            Phase::Ingesting => "ingesting",
            Phase::Retrieving => "retrieving",
            Phase::Reasoning => "reasoning",
            Phase::Streaming => "streaming",
            Phase::Committing => "committing",
            Phase::Done => "done",
        }
    }
}

/// Drives one analysis end to end inside an already-resolved session.
pub struct AnalysisCoordinator {
    config: AnalyzeConfig,
    ingestor: Arc<Ingestor>,
    retrieval: Arc<RetrievalOrchestrator>,
    embedder: Arc<dyn Embedder>,
    reasoner: Arc<dyn Reasoner>,
    store: Arc<MemoryStore>,
}

impl AnalysisCoordinator {
    /// Assemble a coordinator over the pipeline components.
    pub fn new(
        config: AnalyzeConfig,
        ingestor: Arc<Ingestor>,
        retrieval: Arc<RetrievalOrchestrator>,
        embedder: Arc<dyn Embedder>,
        reasoner: Arc<dyn Reasoner>,
        store: Arc<MemoryStore>,
    ) -> Self {
        Self {
            config,
            ingestor,
            retrieval,
            embedder,
            reasoner,
            store,
        }
    }

    /// Run one analysis, emitting trace events as phases progress.
    ///
    /// The caller must already hold the session's execution lock; the
    /// commit at the end assumes no concurrent writer in the session.
    pub async fn run(
        &self,
        session_id: SessionId,
        request: &AnalysisRequest,
        sink: &dyn TraceSink,
    ) -> Result<AnalysisResult, HelixCoreError> {
        self.enter(session_id, Phase::Received);
        if request.is_empty() {
            return Err(HelixCoreError::EmptyRequest);
        }

        // Attachments land before retrieval so fresh chunks are visible
        // as context for this same request.
        self.enter(session_id, Phase::Ingesting);
        let mut attachment_refs: Vec<AttachmentRef> = Vec::new();
        for attachment in &request.attachments {
            let receipt = self.ingestor.ingest(session_id, attachment).await?;
            attachment_refs.push(AttachmentRef {
                filename: receipt.filename.clone(),
                mime_class: receipt.mime_class,
            });
        }
        // Everything ingested since the last analysis counts as fresh,
        // including uploads vectorized between requests, not just the
        // attachments on this one.
        let fresh_chunk_ids = self.ingestor.take_recent_chunks(session_id);

        self.enter(session_id, Phase::Retrieving);
        let hits = self
            .retrieval
            .retrieve(session_id, &request.query_text, self.config.retrieval_k)
            .await?;

        let mut memory_context: Vec<String> = Vec::new();
        let mut document_context: Vec<String> = Vec::new();
        let mut context_ids: Vec<RecordId> = Vec::new();
        let index = self.store.index();
        for id in &fresh_chunk_ids {
            if let Some(record) = index.get(*id) {
                document_context.push(record.content);
                context_ids.push(*id);
            }
        }
        for hit in hits {
            if context_ids.contains(&hit.record.id) {
                continue;
            }
            context_ids.push(hit.record.id);
            match hit.record.kind {
                RecordKind::QueryResult => {
                    memory_context.push(query_result_context(&hit.record.content))
                }
                RecordKind::IngestedChunk => document_context.push(hit.record.content),
            }
        }

        self.enter(session_id, Phase::Reasoning);
        let reason_request = ReasonRequest {
            query: request.query_text.clone(),
            memory_context,
            document_context,
            attachments: attachment_refs,
        };
        let mut stream = self.reasoner.reason(reason_request).await?;

        self.enter(session_id, Phase::Streaming);
        let mut thinking_trace: Vec<String> = Vec::new();
        let mut answer_text = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk? {
                ReasonChunk::Thinking(step) => {
                    sink.emit(TraceEvent::new(
                        session_id,
                        TracePayload::Thinking(step.clone()),
                    ));
                    thinking_trace.push(step);
                }
                ReasonChunk::Answer(fragment) => {
                    sink.emit(TraceEvent::new(
                        session_id,
                        TracePayload::Response(fragment.clone()),
                    ));
                    answer_text.push_str(&fragment);
                }
            }
        }

        let chart_specs = extract_charts(&answer_text);
        for spec in &chart_specs {
            sink.emit(TraceEvent::new(
                session_id,
                TracePayload::Chart(spec.clone()),
            ));
        }

        // The answer already exists here, so a persistence failure is a
        // warning on the result rather than a hard error.
        self.enter(session_id, Phase::Committing);
        let timestamp = Utc::now();
        let warning = match self
            .commit(session_id, request, &answer_text, timestamp)
            .await
        {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    "analysis commit failed (session_id={}, error={})",
                    session_id, err
                );
                Some(format!("result not persisted to memory: {err}"))
            }
        };

        sink.emit(TraceEvent::new(
            session_id,
            TracePayload::Complete(CompleteInfo {
                session_id,
                warning: warning.clone(),
            }),
        ));
        self.enter(session_id, Phase::Done);
        info!(
            "analysis complete (session_id={}, thinking_steps={}, charts={}, context={})",
            session_id,
            thinking_trace.len(),
            chart_specs.len(),
            context_ids.len()
        );

        Ok(AnalysisResult {
            session_id,
            answer_text,
            thinking_trace,
            chart_specs,
            memory_context_used: context_ids,
            warning,
            timestamp,
        })
    }

    /// Persist the finished query and answer as one memory record.
    async fn commit(
        &self,
        session_id: SessionId,
        request: &AnalysisRequest,
        answer_text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), HelixCoreError> {
        let embed_text = format!("Query: {}\nResult: {}", request.query_text, answer_text);
        let mut embeddings = self.embedder.embed(vec![embed_text]).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| HelixCoreError::Embedding("empty embedding batch".to_string()))?;
        let files: Vec<&str> = request
            .attachments
            .iter()
            .map(|attachment| attachment.filename.as_str())
            .collect();
        let content = json!({
            "query": request.query_text,
            "result": answer_text,
            "files": files,
            "timestamp": timestamp.to_rfc3339(),
        })
        .to_string();
        self.store.append(MemoryRecord::new(
            session_id,
            RecordKind::QueryResult,
            content,
            embedding,
        ))?;
        Ok(())
    }

    fn enter(&self, session_id: SessionId, phase: Phase) {
        debug!(
            "analysis phase (session_id={}, phase={})",
            session_id,
            phase.as_str()
        );
    }
}

/// Render a committed query-result record as reasoning context.
///
/// Stored content is structured JSON; the backend gets the readable
/// query/answer pair. Unparseable content passes through as-is.
fn query_result_context(content: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return content.to_string();
    };
    match (
        value.get("query").and_then(|v| v.as_str()),
        value.get("result").and_then(|v| v.as_str()),
    ) {
        (Some(query), Some(result)) => format!("Query: {query}\nResult: {result}"),
        _ => content.to_string(),
    }
}
