//! Offline end-to-end checks over the pipeline pieces that need no
//! running services: chunking into index documents, query shaping,
//! caching and session memory.

use std::time::Duration;

use ragserve::cache::QueryCache;
use ragserve::guardrails::{Guardrails, Verdict};
use ragserve::ingest::chunking::Chunker;
use ragserve::models::{QueryRequest, QueryResponse, SearchMode};
use ragserve::search::query::build_search_body;
use ragserve::sessions::SessionStore;

fn sample_response(answer: &str, session_id: &str) -> QueryResponse {
    QueryResponse {
        success: true,
        answer: answer.to_string(),
        sources: Vec::new(),
        cached: false,
        reranked: false,
        context_used: true,
        search_mode: "hybrid".to_string(),
        retrieved_count: 2,
        session_id: session_id.to_string(),
        error: None,
    }
}

#[test]
fn chunked_document_is_search_ready() {
    let chunker = Chunker::new(50, 10);
    let text = "Retrieval systems index documents as chunks. Each chunk carries its \
                source metadata. Embeddings give chunks a dense representation. \
                Lexical fields keep exact terms searchable. Hybrid search uses both.";
    let chunks = chunker.chunk_document("file123", "Search Primer", "primer.pdf", "https://x", text);

    assert!(!chunks.is_empty());
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_id, format!("file123_{i}"));
        assert_eq!(chunk.document_title, "Search Primer");
        assert_eq!(chunk.file_name, "primer.pdf");
        assert!(!chunk.chunk_content.trim().is_empty());
    }

    // Chunks serialize with the field names the index mapping expects
    let doc = serde_json::to_value(&chunks[0]).unwrap();
    assert!(doc.get("chunkContent").is_some());
    assert!(doc.get("documentTitle").is_some());
    assert!(doc.get("fileId").is_some());
}

#[test]
fn query_flow_cache_round_trip() {
    let cache = QueryCache::new(Duration::from_secs(60), 10);
    let query = "What is hybrid search?";

    assert!(cache.get(query, "hybrid").is_none());
    cache.set(query, "hybrid", sample_response("both at once", "s1"));

    // Same normalized query hits, regardless of case and padding
    let hit = cache.get("  what is HYBRID search?  ", "hybrid").unwrap();
    assert_eq!(hit.answer, "both at once");

    // A different mode is a different cache entry
    assert!(cache.get(query, "lexical").is_none());

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
}

#[test]
fn session_memory_shapes_follow_up_queries() {
    let sessions = SessionStore::new();
    let guardrails = Guardrails::new(500);

    let first = "Tell me about kubernetes deployment strategies";
    assert!(matches!(guardrails.validate_query(first), Verdict::Valid));
    sessions.record_exchange("s1", first, "Rolling updates and canaries.");

    // A terse follow-up picks up terms from the session
    let enhanced = sessions.enhance_query("s1", "what about rollbacks");
    assert!(enhanced.contains("rollbacks"));
    assert!(enhanced.contains("kubernetes") || enhanced.contains("deployment"));

    // Other sessions stay untouched
    assert_eq!(sessions.enhance_query("s2", "what about rollbacks"), "what about rollbacks");

    let history = sessions.history("s1");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].role, "assistant");
}

#[test]
fn guardrails_reject_then_optimize() {
    let guardrails = Guardrails::new(100);

    assert!(matches!(guardrails.validate_query(""), Verdict::Rejected { .. }));
    assert!(matches!(
        guardrails.validate_query(&"x".repeat(200)),
        Verdict::Rejected { .. }
    ));
    assert!(matches!(
        guardrails.validate_query("how do I hack the admin password"),
        Verdict::Rejected { .. }
    ));

    let optimized = guardrails.optimize_query("What is the deployment process?");
    assert!(optimized.contains("deployment"));
}

#[test]
fn search_bodies_match_request_modes() {
    let embedding = vec![0.1f32; 8];

    let hybrid = build_search_body(SearchMode::Hybrid, "deploy", Some(&embedding), 15);
    assert_eq!(hybrid["size"], 15);
    assert_eq!(hybrid["query"]["bool"]["should"].as_array().unwrap().len(), 2);

    let lexical = build_search_body(SearchMode::Lexical, "deploy", None, 5);
    assert!(lexical["query"]["multi_match"].is_object());

    let semantic = build_search_body(SearchMode::Semantic, "deploy", Some(&embedding), 5);
    assert!(semantic["query"]["script_score"].is_object());
}

#[test]
fn request_defaults_deserialize() {
    let request: QueryRequest = serde_json::from_str(r#"{"query":"hello world"}"#).unwrap();
    assert_eq!(request.session_id, "default");
    assert_eq!(request.search_mode, "hybrid");
    assert_eq!(request.max_results, 5);
    assert!(request.enable_reranking);
    assert_eq!(SearchMode::parse(&request.search_mode), SearchMode::Hybrid);
}
