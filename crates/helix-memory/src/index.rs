//! Session-tagged vector index with cosine similarity search.
//!
//! Records live in memory and are mirrored to an optional JSON snapshot so
//! the index survives restarts. Batch inserts are all-or-nothing: either
//! every record of an attachment lands in the index or none do.

use crate::error::MemoryError;
use crate::model::MemoryRecord;
use helix_protocol::{RecordId, SessionId};
use log::{debug, info};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Matched record.
    pub record: MemoryRecord,
    /// Cosine similarity against the query embedding.
    pub score: f32,
}

/// Aggregate index statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Records currently indexed across all sessions.
    pub total_records: usize,
    /// Embedding dimension, once the first record has been written.
    pub embedding_dimension: Option<usize>,
}

struct IndexInner {
    records: HashMap<RecordId, MemoryRecord>,
    dimension: Option<usize>,
}

/// Nearest-neighbor store keyed by embedding vector and tagged by session.
pub struct VectorIndex {
    inner: RwLock<IndexInner>,
    snapshot_path: Option<PathBuf>,
}

impl VectorIndex {
    /// Create an index without snapshot persistence.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(IndexInner {
                records: HashMap::new(),
                dimension: None,
            }),
            snapshot_path: None,
        }
    }

    /// Open an index backed by a JSON snapshot file, loading it if present.
    pub fn open(snapshot_path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let snapshot_path = snapshot_path.as_ref().to_path_buf();
        if let Some(parent) = snapshot_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut records = HashMap::new();
        let mut dimension = None;
        if snapshot_path.exists() {
            let raw = std::fs::read_to_string(&snapshot_path)?;
            let loaded: Vec<MemoryRecord> = serde_json::from_str(&raw)?;
            for record in loaded {
                dimension.get_or_insert(record.embedding.len());
                records.insert(record.id, record);
            }
        }
        info!(
            "opened vector index (path={}, records={})",
            snapshot_path.display(),
            records.len()
        );
        Ok(Self {
            inner: RwLock::new(IndexInner { records, dimension }),
            snapshot_path: Some(snapshot_path),
        })
    }

    /// Insert a single record.
    pub fn insert(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        self.insert_batch(vec![record])
    }

    /// Insert a batch of records atomically.
    ///
    /// Every embedding is validated against the index dimension before any
    /// record is written; a snapshot failure rolls the batch back so no
    /// partial attachment is left indexed.
    pub fn insert_batch(&self, records: Vec<MemoryRecord>) -> Result<(), MemoryError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write();
        let prior_dimension = inner.dimension;
        let mut dimension = inner.dimension;
        for record in &records {
            if record.embedding.is_empty() {
                return Err(MemoryError::EmptyEmbedding(record.id));
            }
            match dimension {
                Some(expected) if expected != record.embedding.len() => {
                    return Err(MemoryError::DimensionMismatch {
                        expected,
                        actual: record.embedding.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(record.embedding.len()),
            }
        }

        let ids: Vec<RecordId> = records.iter().map(|record| record.id).collect();
        for record in records {
            inner.records.insert(record.id, record);
        }
        inner.dimension = dimension;
        if let Err(err) = self.persist(&inner) {
            for id in &ids {
                inner.records.remove(id);
            }
            inner.dimension = prior_dimension;
            return Err(err);
        }
        debug!("indexed records (count={})", ids.len());
        Ok(())
    }

    /// Remove records by id, returning how many were present.
    pub fn remove(&self, ids: &[RecordId]) -> Result<usize, MemoryError> {
        let mut inner = self.inner.write();
        let mut removed = 0;
        for id in ids {
            if inner.records.remove(id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.persist(&inner)?;
        }
        Ok(removed)
    }

    /// Drop every record tagged with the session, returning the count.
    pub fn purge_session(&self, session_id: SessionId) -> Result<usize, MemoryError> {
        let mut inner = self.inner.write();
        let before = inner.records.len();
        inner.records.retain(|_, record| record.session_id != session_id);
        let removed = before - inner.records.len();
        if removed > 0 {
            self.persist(&inner)?;
            info!(
                "purged session vectors (session_id={}, removed={})",
                session_id, removed
            );
        }
        Ok(removed)
    }

    /// Fetch a record by id.
    pub fn get(&self, id: RecordId) -> Option<MemoryRecord> {
        self.inner.read().records.get(&id).cloned()
    }

    /// Count records tagged with a session.
    pub fn count_session(&self, session_id: SessionId) -> usize {
        self.inner
            .read()
            .records
            .values()
            .filter(|record| record.session_id == session_id)
            .count()
    }

    /// Rank the k nearest records by cosine similarity, most similar first.
    ///
    /// When `session_id` is set, the search is restricted to that session's
    /// records. Exact score ties are broken by recency.
    pub fn search(
        &self,
        session_id: Option<SessionId>,
        query_embedding: &[f32],
        k: usize,
    ) -> Vec<SearchHit> {
        let inner = self.inner.read();
        let mut hits: Vec<SearchHit> = inner
            .records
            .values()
            .filter(|record| session_id.is_none_or(|session| record.session_id == session))
            .map(|record| SearchHit {
                score: cosine_similarity(query_embedding, &record.embedding),
                record: record.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        });
        hits.truncate(k);
        hits
    }

    /// Return aggregate statistics for the index.
    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        IndexStats {
            total_records: inner.records.len(),
            embedding_dimension: inner.dimension,
        }
    }

    /// Write the snapshot atomically via a temp file.
    fn persist(&self, inner: &IndexInner) -> Result<(), MemoryError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let records: Vec<&MemoryRecord> = inner.records.values().collect();
        let payload = serde_json::to_string(&records)?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, payload)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }
}

/// Cosine similarity between two vectors; zero when either has no norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::{VectorIndex, cosine_similarity};
    use crate::model::MemoryRecord;
    use helix_protocol::RecordKind;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn record(session_id: Uuid, content: &str, embedding: Vec<f32>) -> MemoryRecord {
        MemoryRecord::new(session_id, RecordKind::IngestedChunk, content, embedding)
    }

    #[test]
    fn cosine_similarity_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_is_scoped_to_the_session_tag() {
        let index = VectorIndex::in_memory();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        index.insert(record(mine, "mine", vec![1.0, 0.0])).expect("insert");
        index
            .insert(record(theirs, "theirs", vec![1.0, 0.0]))
            .expect("insert");

        let hits = index.search(Some(mine), &[1.0, 0.0], 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.session_id, mine);
    }

    #[test]
    fn search_ranks_by_similarity_then_recency() {
        let index = VectorIndex::in_memory();
        let session = Uuid::new_v4();
        let far = record(session, "far", vec![0.0, 1.0]);
        let near_old = record(session, "near old", vec![1.0, 0.0]);
        let mut near_new = record(session, "near new", vec![1.0, 0.0]);
        near_new.created_at = near_old.created_at + chrono::Duration::seconds(5);
        index.insert(far).expect("insert");
        index.insert(near_old).expect("insert");
        index.insert(near_new).expect("insert");

        let hits = index.search(Some(session), &[1.0, 0.0], 3);
        assert_eq!(hits[0].record.content, "near new");
        assert_eq!(hits[1].record.content, "near old");
        assert_eq!(hits[2].record.content, "far");
    }

    #[test]
    fn batch_insert_rejects_dimension_mismatch_without_partial_writes() {
        let index = VectorIndex::in_memory();
        let session = Uuid::new_v4();
        index
            .insert(record(session, "seed", vec![1.0, 0.0]))
            .expect("seed");

        let batch = vec![
            record(session, "ok", vec![0.5, 0.5]),
            record(session, "bad", vec![0.5, 0.5, 0.5]),
        ];
        index.insert_batch(batch).expect_err("mismatch");
        assert_eq!(index.count_session(session), 1);
    }

    #[test]
    fn failed_snapshot_rolls_back_records_and_dimension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("index.json");
        let index = VectorIndex::open(&path).expect("open");
        // A directory squatting on the temp file path makes the snapshot
        // write fail after the in-memory insert.
        std::fs::create_dir(dir.path().join("index.json.tmp")).expect("squat");

        let session = Uuid::new_v4();
        index
            .insert(record(session, "doomed", vec![1.0, 0.0, 0.0]))
            .expect_err("snapshot fails");

        let stats = index.stats();
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.embedding_dimension, None);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("index.json");
        let session = Uuid::new_v4();
        {
            let index = VectorIndex::open(&path).expect("open");
            index
                .insert(record(session, "persisted", vec![0.2, 0.8]))
                .expect("insert");
        }
        let index = VectorIndex::open(&path).expect("reopen");
        let stats = index.stats();
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.embedding_dimension, Some(2));
    }

    #[test]
    fn purge_session_removes_only_that_session() {
        let index = VectorIndex::in_memory();
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        index.insert(record(keep, "keep", vec![1.0])).expect("insert");
        index.insert(record(drop, "drop", vec![1.0])).expect("insert");
        assert_eq!(index.purge_session(drop).expect("purge"), 1);
        assert_eq!(index.count_session(keep), 1);
        assert_eq!(index.count_session(drop), 0);
    }
}
