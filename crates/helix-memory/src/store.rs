//! Per-session memory store: JSONL chronological log plus vector mirror.
//!
//! Every record appended here is also inserted into the vector index, and
//! eviction keeps the two in step so a session never holds more than the
//! configured number of records in either place.

use crate::error::MemoryError;
use crate::index::VectorIndex;
use crate::model::MemoryRecord;
use crate::policy::EvictionPolicy;
use chrono::{DateTime, Utc};
use helix_protocol::{RecordId, SessionId};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Summary of one session's stored memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMemorySummary {
    /// Session identifier.
    pub session_id: SessionId,
    /// Records currently stored for the session.
    pub record_count: usize,
    /// Timestamp of the newest record, if any.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Append-only per-session record log with FIFO eviction.
pub struct MemoryStore {
    /// Root directory holding one JSONL file per session.
    root: PathBuf,
    /// Vector index mirroring every stored record.
    index: Arc<VectorIndex>,
    /// Eviction bound applied after each append.
    policy: EvictionPolicy,
}

impl MemoryStore {
    /// Create a store rooted at the given directory.
    pub fn new(
        root: impl AsRef<Path>,
        index: Arc<VectorIndex>,
        policy: EvictionPolicy,
    ) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        info!("initialized memory store (root={})", root.display());
        Ok(Self {
            root,
            index,
            policy,
        })
    }

    /// Shared handle to the backing vector index.
    pub fn index(&self) -> Arc<VectorIndex> {
        self.index.clone()
    }

    /// Append a single record, evicting the oldest past the bound.
    ///
    /// Returns the ids of any evicted records.
    pub fn append(&self, record: MemoryRecord) -> Result<Vec<RecordId>, MemoryError> {
        self.append_batch(vec![record])
    }

    /// Append a batch of records for one session atomically.
    ///
    /// The batch lands in the vector index all-or-nothing; a failure while
    /// writing the log rolls the index back so no partial attachment
    /// remains visible. Eviction runs once after the batch.
    pub fn append_batch(&self, records: Vec<MemoryRecord>) -> Result<Vec<RecordId>, MemoryError> {
        let Some(first) = records.first() else {
            return Ok(Vec::new());
        };
        let session_id = first.session_id;
        debug_assert!(records.iter().all(|r| r.session_id == session_id));

        let ids: Vec<RecordId> = records.iter().map(|record| record.id).collect();
        self.index.insert_batch(records.clone())?;

        if let Err(err) = self.append_lines(session_id, &records) {
            self.index.remove(&ids)?;
            return Err(err);
        }
        debug!(
            "appended memory records (session_id={}, count={})",
            session_id,
            ids.len()
        );
        self.enforce_bound(session_id)
    }

    /// List records for a session, newest first, up to `limit`.
    pub fn list(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut records = self.load_records(session_id)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    /// Count stored records for a session.
    pub fn count(&self, session_id: SessionId) -> Result<usize, MemoryError> {
        Ok(self.load_records(session_id)?.len())
    }

    /// Remove all records and vectors for a session. Idempotent.
    pub fn clear(&self, session_id: SessionId) -> Result<(), MemoryError> {
        let path = self.session_path(session_id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        self.index.purge_session(session_id)?;
        info!("cleared session memory (session_id={})", session_id);
        Ok(())
    }

    /// Summarize every session with stored memory.
    pub fn list_sessions(&self) -> Result<Vec<SessionMemorySummary>, MemoryError> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let Ok(session_id) = Uuid::parse_str(stem) else {
                continue;
            };
            let records = self.load_records(session_id)?;
            summaries.push(SessionMemorySummary {
                session_id,
                record_count: records.len(),
                last_updated: records.iter().map(|record| record.created_at).max(),
            });
        }
        summaries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(summaries)
    }

    /// Path to the session JSONL file.
    fn session_path(&self, session_id: SessionId) -> PathBuf {
        self.root.join(format!("{session_id}.jsonl"))
    }

    /// Load all records for a session.
    fn load_records(&self, session_id: SessionId) -> Result<Vec<MemoryRecord>, MemoryError> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: MemoryRecord = serde_json::from_str(&line)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Append records to the session file.
    fn append_lines(
        &self,
        session_id: SessionId,
        records: &[MemoryRecord],
    ) -> Result<(), MemoryError> {
        let path = self.session_path(session_id);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for record in records {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Rewrite a session's records atomically.
    fn write_records(
        &self,
        session_id: SessionId,
        records: &[MemoryRecord],
    ) -> Result<(), MemoryError> {
        let path = self.session_path(session_id);
        let temp_path = self.root.join(format!("{session_id}.jsonl.tmp"));
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                writeln!(file, "{line}")?;
            }
        }
        std::fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Drop the oldest records past the configured bound.
    fn enforce_bound(&self, session_id: SessionId) -> Result<Vec<RecordId>, MemoryError> {
        let mut records = self.load_records(session_id)?;
        if records.len() <= self.policy.max_items {
            return Ok(Vec::new());
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let overflow = records.len() - self.policy.max_items;
        let evicted: Vec<MemoryRecord> = records.drain(..overflow).collect();
        let evicted_ids: Vec<RecordId> = evicted.iter().map(|record| record.id).collect();
        self.write_records(session_id, &records)?;
        self.index.remove(&evicted_ids)?;
        info!(
            "evicted memory records (session_id={}, evicted={}, remaining={})",
            session_id,
            evicted_ids.len(),
            records.len()
        );
        Ok(evicted_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::index::VectorIndex;
    use crate::model::MemoryRecord;
    use crate::policy::EvictionPolicy;
    use helix_protocol::RecordKind;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn store(max_items: usize) -> (MemoryStore, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let index = Arc::new(VectorIndex::in_memory());
        let store = MemoryStore::new(
            dir.path(),
            index,
            EvictionPolicy::with_max_items(max_items),
        )
        .expect("store");
        (store, dir)
    }

    fn record_at(session_id: Uuid, content: &str, offset_secs: i64) -> MemoryRecord {
        let mut record =
            MemoryRecord::new(session_id, RecordKind::QueryResult, content, vec![0.5, 0.5]);
        record.created_at += chrono::Duration::seconds(offset_secs);
        record
    }

    #[test]
    fn append_enforces_the_memory_bound_fifo() {
        let (store, _dir) = store(3);
        let session = Uuid::new_v4();
        for (offset, content) in ["first", "second", "third", "fourth"].iter().enumerate() {
            store
                .append(record_at(session, content, offset as i64))
                .expect("append");
        }

        let records = store.list(session, 10).expect("list");
        assert_eq!(records.len(), 3);
        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["fourth", "third", "second"]);
        assert_eq!(store.index().count_session(session), 3);
    }

    #[test]
    fn list_returns_newest_first_up_to_limit() {
        let (store, _dir) = store(10);
        let session = Uuid::new_v4();
        for offset in 0..5 {
            store
                .append(record_at(session, &format!("q{offset}"), offset))
                .expect("append");
        }
        let records = store.list(session, 2).expect("list");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "q4");
        assert_eq!(records[1].content, "q3");
    }

    #[test]
    fn clear_is_idempotent_and_purges_vectors() {
        let (store, _dir) = store(10);
        let session = Uuid::new_v4();
        store
            .append(record_at(session, "entry", 0))
            .expect("append");
        store.clear(session).expect("clear");
        store.clear(session).expect("clear twice");
        assert_eq!(store.count(session).expect("count"), 0);
        assert_eq!(store.index().count_session(session), 0);
    }

    #[test]
    fn list_sessions_reports_counts() {
        let (store, _dir) = store(10);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.append(record_at(a, "a1", 0)).expect("append");
        store.append(record_at(a, "a2", 1)).expect("append");
        store.append(record_at(b, "b1", 2)).expect("append");

        let summaries = store.list_sessions().expect("summaries");
        assert_eq!(summaries.len(), 2);
        let for_a = summaries
            .iter()
            .find(|summary| summary.session_id == a)
            .expect("a");
        assert_eq!(for_a.record_count, 2);
    }

    #[test]
    fn batch_append_is_rolled_back_when_index_rejects_it() {
        let (store, _dir) = store(10);
        let session = Uuid::new_v4();
        store.append(record_at(session, "seed", 0)).expect("seed");

        let mut bad = record_at(session, "bad", 1);
        bad.embedding = vec![0.1, 0.2, 0.3];
        let batch = vec![record_at(session, "ok", 2), bad];
        store.append_batch(batch).expect_err("mismatch");

        assert_eq!(store.count(session).expect("count"), 1);
        assert_eq!(store.index().count_session(session), 1);
    }
}
