//! End-to-end engine integration tests over deterministic fakes.

use helix_config::{HelixConfig, MemoryConfig, SessionsConfig};
use helix_core::{AnalysisRequest, Attachment, HelixCoreError, HelixEngine};
use helix_protocol::RecordKind;
use helix_test_utils::{HashEmbedder, KeywordEmbedder, ScriptedReasoner};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

fn config_in(dir: &tempfile::TempDir) -> HelixConfig {
    HelixConfig::builder()
        .memory(MemoryConfig {
            max_items: 100,
            path: Some(dir.path().join("memory").to_string_lossy().to_string()),
            index_path: Some(dir.path().join("index.json").to_string_lossy().to_string()),
        })
        .build()
}

fn engine_with(config: HelixConfig, reasoner: ScriptedReasoner) -> (HelixEngine, Arc<ScriptedReasoner>) {
    let reasoner = Arc::new(reasoner);
    let engine = HelixEngine::new(
        config,
        Arc::new(HashEmbedder::default()),
        reasoner.clone(),
    )
    .expect("engine");
    (engine, reasoner)
}

#[tokio::test]
async fn analyze_commits_one_record_per_query() {
    let dir = tempdir().expect("tempdir");
    let (engine, _) = engine_with(
        config_in(&dir),
        ScriptedReasoner::default().with_answer("Elevated expression."),
    );

    let result = engine
        .analyze(AnalysisRequest::query("what changed?"))
        .await
        .expect("analyze");
    assert_eq!(result.answer_text, "Elevated expression.");

    let summaries = engine
        .get_memory(result.session_id, 10)
        .expect("get memory");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].kind, RecordKind::QueryResult);
}

#[tokio::test]
async fn retrieval_context_never_crosses_sessions() {
    let dir = tempdir().expect("tempdir");
    let (engine, reasoner) = engine_with(config_in(&dir), ScriptedReasoner::default());

    let first = engine
        .analyze(AnalysisRequest::query("alpha results"))
        .await
        .expect("first");
    // Same query text in a fresh session; nothing from the first session
    // may appear as context.
    engine
        .analyze(AnalysisRequest::query("alpha results"))
        .await
        .expect("second");

    let request = reasoner.last_request().expect("reason called");
    assert_eq!(request.memory_context, Vec::<String>::new());

    // Back in the first session the committed answer is now context.
    engine
        .analyze(AnalysisRequest::query("alpha results").in_session(first.session_id))
        .await
        .expect("third");
    let request = reasoner.last_request().expect("reason called");
    assert!(!request.memory_context.is_empty());
}

#[tokio::test]
async fn memory_bound_is_enforced_across_analyses() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(&dir);
    config.memory.max_items = 3;
    let (engine, _) = engine_with(config, ScriptedReasoner::default());

    let session = engine.create_session().expect("session").id;
    for n in 0..5 {
        engine
            .analyze(AnalysisRequest::query(format!("query {n}")).in_session(session))
            .await
            .expect("analyze");
    }

    let summaries = engine.get_memory(session, 10).expect("get memory");
    assert_eq!(summaries.len(), 3);
    assert!(summaries[0].preview.contains("query 4"));
}

#[tokio::test]
async fn expired_session_memory_is_unreachable() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(&dir);
    config.sessions = SessionsConfig {
        expiry_hours: 0,
        sweep_interval_secs: 300,
    };
    let (engine, _) = engine_with(config, ScriptedReasoner::default());

    let result = engine
        .analyze(AnalysisRequest::query("remember me"))
        .await
        .expect("analyze");
    let err = engine
        .get_memory(result.session_id, 10)
        .expect_err("expired");
    assert!(matches!(err, HelixCoreError::NotFound(id) if id == result.session_id));

    // Purge already happened; a later read of the untracked id is empty.
    let summaries = engine
        .get_memory(result.session_id, 10)
        .expect("untracked is empty");
    assert_eq!(summaries.len(), 0);
}

#[tokio::test]
async fn clear_memory_is_idempotent_and_keeps_the_session() {
    let dir = tempdir().expect("tempdir");
    let (engine, _) = engine_with(config_in(&dir), ScriptedReasoner::default());

    let result = engine
        .analyze(AnalysisRequest::query("note this"))
        .await
        .expect("analyze");
    engine.clear_memory(result.session_id).expect("clear");
    engine.clear_memory(result.session_id).expect("clear again");

    assert_eq!(
        engine
            .get_memory(result.session_id, 10)
            .expect("get memory")
            .len(),
        0
    );
    // The session itself survives the wipe.
    engine
        .resume_session(result.session_id, false)
        .expect("resume");
}

#[tokio::test]
async fn empty_request_fails_fast() {
    let dir = tempdir().expect("tempdir");
    let (engine, _) = engine_with(config_in(&dir), ScriptedReasoner::default());
    let err = engine
        .analyze(AnalysisRequest::query("  "))
        .await
        .expect_err("empty");
    assert_eq!(err.code(), "empty_request");
}

#[tokio::test]
async fn vectorize_returns_a_receipt_and_feeds_search() {
    let dir = tempdir().expect("tempdir");
    let (engine, _) = engine_with(config_in(&dir), ScriptedReasoner::default());

    let receipt = engine
        .vectorize(
            None,
            Attachment::new("notes.txt", "text/plain", b"mitochondrial density".to_vec()),
        )
        .await
        .expect("vectorize");
    assert_eq!(receipt.chunk_count, 1);
    assert!(receipt.total_chars > "mitochondrial density".len());

    let hits = engine
        .vector_search("mitochondrial density", 5)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.document_id, Some(receipt.document_id));

    let scoped = engine
        .search_memory(receipt.session_id, "mitochondrial density", 5)
        .await
        .expect("scoped search");
    assert_eq!(scoped.len(), 1);
}

#[tokio::test]
async fn ingested_chunks_reach_an_unrelated_follow_up_query() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(&dir);
    config.ingest.chunk_size = 12;
    config.ingest.chunk_overlap = 2;
    // Two retrieval slots, so similar history alone would fill them both.
    config.analyze.retrieval_k = 2;
    let reasoner = Arc::new(ScriptedReasoner::default());
    let engine = HelixEngine::new(
        config,
        Arc::new(KeywordEmbedder::new("g")),
        reasoner.clone(),
    )
    .expect("engine");
    let session = engine.create_session().expect("session").id;

    // Three committed answers sit exactly on the query's similarity axis;
    // the upload sits on the orthogonal one and scores zero.
    for n in 0..3 {
        engine
            .analyze(AnalysisRequest::query(format!("earlier run {n}")).in_session(session))
            .await
            .expect("seed analyze");
    }
    let receipt = engine
        .vectorize(
            Some(session),
            Attachment::new("notes.txt", "text/plain", vec![b'g'; 20]),
        )
        .await
        .expect("vectorize");
    assert_eq!(receipt.chunk_count, 2);

    let result = engine
        .analyze(AnalysisRequest::query("unrelated check").in_session(session))
        .await
        .expect("analyze");

    // Both chunks are in scope even though every retrieval slot went to
    // the more similar committed answers.
    let chunk_ids: Vec<_> = engine
        .search_memory(session, "g", 2)
        .await
        .expect("chunk lookup")
        .into_iter()
        .map(|hit| hit.record.id)
        .collect();
    assert_eq!(chunk_ids.len(), 2);
    assert!(chunk_ids
        .iter()
        .all(|id| result.memory_context_used.contains(id)));
    assert_eq!(result.memory_context_used.len(), 4);

    let request = reasoner.last_request().expect("reason called");
    assert_eq!(request.document_context.len(), 2);
    assert!(request
        .document_context
        .iter()
        .all(|chunk| chunk.starts_with("[Document: notes.txt]")));
    assert_eq!(request.memory_context.len(), 2);
}

#[tokio::test]
async fn concurrent_analyses_in_one_session_both_commit() {
    let dir = tempdir().expect("tempdir");
    let (engine, _) = engine_with(config_in(&dir), ScriptedReasoner::default());
    let engine = Arc::new(engine);
    let session = engine.create_session().expect("session").id;

    let a = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .analyze(AnalysisRequest::query("first writer").in_session(session))
                .await
        })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .analyze(AnalysisRequest::query("second writer").in_session(session))
                .await
        })
    };
    a.await.expect("join").expect("first analyze");
    b.await.expect("join").expect("second analyze");

    assert_eq!(engine.get_memory(session, 10).expect("get memory").len(), 2);
}

#[tokio::test]
async fn sweep_purges_expired_sessions_and_their_memory() {
    let dir = tempdir().expect("tempdir");
    let mut config = config_in(&dir);
    config.sessions.expiry_hours = 0;
    let (engine, _) = engine_with(config, ScriptedReasoner::default());

    let result = engine
        .analyze(AnalysisRequest::query("soon gone"))
        .await
        .expect("analyze");
    let purged = engine.sweep_sessions().expect("sweep");
    assert_eq!(purged, vec![result.session_id]);
    assert_eq!(
        engine
            .get_memory(result.session_id, 10)
            .expect("empty after purge")
            .len(),
        0
    );
}

#[tokio::test]
async fn index_stats_track_dimension_and_count() {
    let dir = tempdir().expect("tempdir");
    let reasoner = ScriptedReasoner::default();
    let engine = HelixEngine::new(
        config_in(&dir),
        Arc::new(HashEmbedder::with_dimension(8)),
        Arc::new(reasoner),
    )
    .expect("engine");

    engine
        .analyze(AnalysisRequest::query("measure me"))
        .await
        .expect("analyze");
    let stats = engine.stats();
    assert_eq!(stats.total_records, 1);
    assert_eq!(stats.embedding_dimension, Some(8));

    let sessions = engine.list_sessions().expect("list sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].record_count, 1);
}
