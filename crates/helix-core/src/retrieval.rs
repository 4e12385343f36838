//! Memory retrieval: embeds the query and ranks stored records.

use crate::error::HelixCoreError;
use helix_memory::{SearchHit, VectorIndex};
use helix_protocol::{Embedder, SessionId};
use log::debug;
use std::sync::Arc;

/// Embeds queries and searches the vector index for context.
pub struct RetrievalOrchestrator {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
}

impl RetrievalOrchestrator {
    /// Create an orchestrator over the given embedder and index.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Retrieve the k most relevant records for a session's query.
    ///
    /// Only records tagged with the session are considered.
    pub async fn retrieve(
        &self,
        session_id: SessionId,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, HelixCoreError> {
        self.search(Some(session_id), query, k).await
    }

    /// Search the index for a query, optionally scoped to one session.
    pub async fn search(
        &self,
        session_id: Option<SessionId>,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, HelixCoreError> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut embeddings = self.embedder.embed(vec![query.to_string()]).await?;
        let Some(query_embedding) = embeddings.pop() else {
            return Ok(Vec::new());
        };
        let hits = self.index.search(session_id, &query_embedding, k);
        debug!(
            "retrieved context (query_chars={}, hits={})",
            query.chars().count(),
            hits.len()
        );
        Ok(hits)
    }
}
