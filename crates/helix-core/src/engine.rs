//! The engine: owns the session registry, memory store, and backend
//! handles, and exposes the public pipeline operations.

use crate::charts;
use crate::coordinator::{AnalysisCoordinator, AnalysisRequest, AnalysisResult};
use crate::error::HelixCoreError;
use crate::ingest::{Attachment, Ingestor};
use crate::retrieval::RetrievalOrchestrator;
use crate::sessions::{Session, SessionRegistry};
use helix_config::HelixConfig;
use helix_memory::{EvictionPolicy, IndexStats, MemoryStore, SearchHit, SessionMemorySummary, VectorIndex};
use helix_protocol::{
    ChartKind, ChartSpec, Diagram, DiagramKind, DocumentId, Embedder, ErrorInfo, MemorySummary,
    Reasoner, RequestId, SessionId, TraceEvent, TracePayload, TraceSink,
};
use log::{error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

const EVENT_BUS_CAPACITY: usize = 256;

/// Receipt returned by [`HelixEngine::vectorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorizeReceipt {
    /// Document id minted for the attachment.
    pub document_id: DocumentId,
    /// Session the chunks were stored under.
    pub session_id: SessionId,
    /// Number of memory records written.
    pub chunk_count: usize,
    /// Total characters stored across those records.
    pub total_chars: usize,
}

/// Session memory and retrieval-augmented analysis engine.
pub struct HelixEngine {
    config: HelixConfig,
    registry: Arc<SessionRegistry>,
    store: Arc<MemoryStore>,
    ingestor: Arc<Ingestor>,
    coordinator: Arc<AnalysisCoordinator>,
    retrieval: Arc<RetrievalOrchestrator>,
    reasoner: Arc<dyn Reasoner>,
}

impl HelixEngine {
    /// Build an engine from config and backend handles.
    ///
    /// Storage paths default to `data/memory` and `data/index.json` when
    /// the config leaves them unset.
    pub fn new(
        config: HelixConfig,
        embedder: Arc<dyn Embedder>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Result<Self, HelixCoreError> {
        let memory_path = config
            .memory
            .path
            .clone()
            .unwrap_or_else(|| "data/memory".to_string());
        let index_path = config
            .memory
            .index_path
            .clone()
            .unwrap_or_else(|| "data/index.json".to_string());
        let index = Arc::new(VectorIndex::open(index_path)?);
        let store = Arc::new(MemoryStore::new(
            memory_path,
            index.clone(),
            EvictionPolicy::with_max_items(config.memory.max_items),
        )?);
        let registry = Arc::new(SessionRegistry::new(
            config.sessions.expiry_hours,
            store.clone(),
        ));
        let ingestor = Arc::new(Ingestor::new(
            config.ingest.clone(),
            embedder.clone(),
            reasoner.clone(),
            store.clone(),
        ));
        let retrieval = Arc::new(RetrievalOrchestrator::new(embedder.clone(), index));
        let coordinator = Arc::new(AnalysisCoordinator::new(
            config.analyze.clone(),
            ingestor.clone(),
            retrieval.clone(),
            embedder,
            reasoner.clone(),
            store.clone(),
        ));
        info!(
            "engine ready (expiry_hours={}, max_items={})",
            config.sessions.expiry_hours, config.memory.max_items
        );
        Ok(Self {
            config,
            registry,
            store,
            ingestor,
            coordinator,
            retrieval,
            reasoner,
        })
    }

    /// Shared handle to the session registry.
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Mint a fresh session.
    pub fn create_session(&self) -> Result<Session, HelixCoreError> {
        self.registry.get_or_create(None, false)
    }

    /// Resume a session by id, optionally recreating an expired one
    /// under the same id.
    pub fn resume_session(
        &self,
        id: SessionId,
        reuse_expired: bool,
    ) -> Result<Session, HelixCoreError> {
        self.registry.get_or_create(Some(id), reuse_expired)
    }

    /// Run one analysis to completion, discarding intermediate events.
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, HelixCoreError> {
        if request.is_empty() {
            return Err(HelixCoreError::EmptyRequest);
        }
        let session = self.registry.get_or_create(request.session_id, false)?;
        self.run_locked(session.id, request, Arc::new(NullSink))
            .await
    }

    /// Run one analysis, streaming trace events as they are produced.
    ///
    /// Validation and session resolution happen before the task spawns,
    /// so an empty request or unknown session fails immediately.
    pub fn analyze_stream(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalyzeStream, HelixCoreError> {
        if request.is_empty() {
            return Err(HelixCoreError::EmptyRequest);
        }
        let session = self.registry.get_or_create(request.session_id, false)?;
        let session_id = session.id;
        let request_id = Uuid::new_v4();

        let (sender, receiver) = broadcast::channel(EVENT_BUS_CAPACITY);
        let sink = Arc::new(BusSink {
            sender: sender.clone(),
        });
        let registry = self.registry.clone();
        let coordinator = self.coordinator.clone();
        let timeout_secs = self.config.analyze.timeout_secs;

        let handle = tokio::spawn(async move {
            let outcome = run_analysis(
                registry,
                coordinator,
                session_id,
                request,
                sink.clone(),
                timeout_secs,
            )
            .await;
            if let Err(err) = &outcome {
                error!(
                    "streamed analysis failed (session_id={}, request_id={}, code={})",
                    session_id,
                    request_id,
                    err.code()
                );
                sink.emit(TraceEvent::new(
                    session_id,
                    TracePayload::Error(ErrorInfo {
                        code: err.code().to_string(),
                        message: err.to_string(),
                        retryable: err.retryable(),
                    }),
                ));
            }
            outcome
        });

        Ok(AnalyzeStream {
            session_id,
            request_id,
            events: BroadcastStream::new(receiver),
            handle: Some(handle),
        })
    }

    /// List a session's memory as previews, newest first.
    ///
    /// An expired session is purged on access and reported as not found;
    /// an untracked session simply has no memory.
    pub fn get_memory(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<MemorySummary>, HelixCoreError> {
        if let Some(session) = self.registry.get(session_id) {
            if session.is_expired() {
                self.registry.purge(session_id)?;
                return Err(HelixCoreError::NotFound(session_id));
            }
        }
        let records = self.store.list(session_id, limit)?;
        Ok(records
            .iter()
            .map(|record| record.summary(self.config.analyze.preview_chars))
            .collect())
    }

    /// Erase a session's memory while keeping the session alive.
    /// Idempotent.
    pub fn clear_memory(&self, session_id: SessionId) -> Result<(), HelixCoreError> {
        self.store.clear(session_id)?;
        Ok(())
    }

    /// Ingest one attachment outside of an analysis.
    pub async fn vectorize(
        &self,
        session_id: Option<SessionId>,
        attachment: Attachment,
    ) -> Result<VectorizeReceipt, HelixCoreError> {
        let session = self.registry.get_or_create(session_id, false)?;
        let lock = self.registry.lock_for(session.id);
        let _guard = lock.lock().await;
        let receipt = self.ingestor.ingest(session.id, &attachment).await?;
        let index = self.store.index();
        let total_chars = receipt
            .chunk_ids
            .iter()
            .filter_map(|id| index.get(*id))
            .map(|record| record.content.chars().count())
            .sum();
        Ok(VectorizeReceipt {
            document_id: receipt.document_id,
            session_id: session.id,
            chunk_count: receipt.chunk_ids.len(),
            total_chars,
        })
    }

    /// Search stored memory across all sessions.
    pub async fn vector_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, HelixCoreError> {
        self.retrieval.search(None, query, k).await
    }

    /// Search one session's stored memory.
    pub async fn search_memory(
        &self,
        session_id: SessionId,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, HelixCoreError> {
        self.retrieval.retrieve(session_id, query, k).await
    }

    /// Normalize data into a renderable chart spec.
    pub fn generate_chart(&self, kind: ChartKind, title: &str, data: &Value) -> ChartSpec {
        charts::generate_chart(kind, title, data)
    }

    /// Generate a mermaid diagram from a description.
    pub async fn generate_diagram(&self, description: &str, kind: DiagramKind) -> Diagram {
        charts::generate_diagram(self.reasoner.as_ref(), description, kind).await
    }

    /// Aggregate statistics for the vector index.
    pub fn stats(&self) -> IndexStats {
        self.store.index().stats()
    }

    /// Summarize every session with stored memory.
    pub fn list_sessions(&self) -> Result<Vec<SessionMemorySummary>, HelixCoreError> {
        Ok(self.store.list_sessions()?)
    }

    /// Purge expired sessions now, skipping any with an analysis in
    /// flight. Returns the purged session ids.
    pub fn sweep_sessions(&self) -> Result<Vec<SessionId>, HelixCoreError> {
        self.registry.sweep()
    }

    /// Spawn the periodic expiry sweeper.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = self.clone();
        let period = Duration::from_secs(self.config.sessions.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = engine.sweep_sessions() {
                    warn!("session sweep failed ({err})");
                }
            }
        })
    }

    async fn run_locked(
        &self,
        session_id: SessionId,
        request: AnalysisRequest,
        sink: Arc<dyn TraceSink>,
    ) -> Result<AnalysisResult, HelixCoreError> {
        run_analysis(
            self.registry.clone(),
            self.coordinator.clone(),
            session_id,
            request,
            sink,
            self.config.analyze.timeout_secs,
        )
        .await
    }
}

/// Acquire the session lock and run the coordinator under the timeout.
///
/// Lock acquisition counts against the timeout so a request queued
/// behind a slow analysis cannot wait forever.
async fn run_analysis(
    registry: Arc<SessionRegistry>,
    coordinator: Arc<AnalysisCoordinator>,
    session_id: SessionId,
    request: AnalysisRequest,
    sink: Arc<dyn TraceSink>,
    timeout_secs: u64,
) -> Result<AnalysisResult, HelixCoreError> {
    let lock = registry.lock_for(session_id);
    let work = async move {
        let _guard = lock.lock().await;
        coordinator.run(session_id, &request, sink.as_ref()).await
    };
    match tokio::time::timeout(Duration::from_secs(timeout_secs), work).await {
        Ok(result) => result,
        Err(_) => Err(HelixCoreError::Timeout {
            seconds: timeout_secs,
        }),
    }
}

/// Live event stream for one analysis.
///
/// Dropping the stream aborts the analysis; call [`AnalyzeStream::finish`]
/// to let it run to completion and collect the result.
pub struct AnalyzeStream {
    session_id: SessionId,
    request_id: RequestId,
    events: BroadcastStream<TraceEvent>,
    handle: Option<JoinHandle<Result<AnalysisResult, HelixCoreError>>>,
}

impl std::fmt::Debug for AnalyzeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzeStream")
            .field("session_id", &self.session_id)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

impl AnalyzeStream {
    /// Session the analysis runs in.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Id assigned to this analyze request.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Next trace event, or `None` once the analysis has finished.
    pub async fn next_event(&mut self) -> Option<TraceEvent> {
        loop {
            match self.events.next().await {
                Some(Ok(event)) => return Some(event),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(
                        "event stream lagged (session_id={}, skipped={})",
                        self.session_id, skipped
                    );
                }
                None => return None,
            }
        }
    }

    /// Wait for the analysis to finish and return its result.
    pub async fn finish(mut self) -> Result<AnalysisResult, HelixCoreError> {
        let Some(handle) = self.handle.take() else {
            return Err(HelixCoreError::Task("analysis already finished".to_string()));
        };
        handle
            .await
            .map_err(|err| HelixCoreError::Task(err.to_string()))?
    }
}

impl Drop for AnalyzeStream {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Sink that discards events, for the non-streaming path.
struct NullSink;

impl TraceSink for NullSink {
    fn emit(&self, _event: TraceEvent) {}
}

/// Sink that fans events out over a broadcast channel.
struct BusSink {
    sender: broadcast::Sender<TraceEvent>,
}

impl TraceSink for BusSink {
    fn emit(&self, event: TraceEvent) {
        // A send error only means no receiver is listening anymore.
        let _ = self.sender.send(event);
    }
}
