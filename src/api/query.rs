//! `POST /query`, the retrieval-augmented answer pipeline.

use axum::extract::State;
use axum::Json;

use crate::guardrails::Verdict;
use crate::models::{QueryRequest, QueryResponse, RetrievedChunk, SearchMode, Source};
use crate::state::AppState;

const SNIPPET_CHARS: usize = 200;

/// Over-fetch factor when reranking, so the cross-encoder has candidates
/// beyond the final page to promote.
const RERANK_FETCH_FACTOR: usize = 3;

pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Json<QueryResponse> {
    Json(run_pipeline(&state, request).await)
}

async fn run_pipeline(state: &AppState, request: QueryRequest) -> QueryResponse {
    let mode = SearchMode::parse(&request.search_mode);
    let mode_str = mode.as_str();

    if request.query.trim().is_empty() {
        return QueryResponse::failure(
            "Query cannot be empty",
            "Query cannot be empty",
            &request,
        );
    }

    // ── Step 1: cache ──
    if let Some(mut cached) = state.cache.get(&request.query, mode_str) {
        tracing::debug!(session = %request.session_id, "cache hit");
        cached.cached = true;
        cached.session_id = request.session_id.clone();
        return cached;
    }

    // ── Step 2: input guardrails ──
    if let Verdict::Rejected { reason } = state.guardrails.validate_query(&request.query) {
        tracing::info!(session = %request.session_id, %reason, "query rejected");
        return QueryResponse::failure(reason.clone(), reason, &request);
    }

    // ── Steps 3-4: optimize and add session context ──
    let optimized = state.guardrails.optimize_query(&request.query);
    let enhanced = state
        .sessions
        .enhance_query(&request.session_id, &optimized);

    // ── Step 5: query embedding (vector modes only, degrades to lexical) ──
    let embedding = match mode {
        SearchMode::Lexical => None,
        SearchMode::Hybrid | SearchMode::Semantic => {
            match state.embeddings.embed_query(&enhanced).await {
                Ok(vector) => Some(vector),
                Err(err) => {
                    tracing::warn!(error = %err, "query embedding failed, lexical only");
                    None
                }
            }
        }
    };

    // ── Step 6: retrieval ──
    let page_size = request
        .max_results
        .clamp(1, state.config.retrieval.max_results.max(1));
    let reranker = if request.enable_reranking {
        state.reranker.as_ref()
    } else {
        None
    };
    let fetch_size = if reranker.is_some() {
        page_size * RERANK_FETCH_FACTOR
    } else {
        page_size
    };
    let retrieved = match state
        .search
        .search(mode, &enhanced, embedding.as_deref(), fetch_size)
        .await
    {
        Ok(chunks) => chunks,
        Err(err) => {
            tracing::error!(error = %err, "search failed");
            return QueryResponse::failure(
                err.to_string(),
                "I couldn't search the document index. Please try again later.",
                &request,
            );
        }
    };

    // Nothing retrieved: answer honestly without burning an LLM call,
    // and cache the miss so repeats stay cheap
    if retrieved.is_empty() {
        let response = QueryResponse {
            success: true,
            answer: "I couldn't find anything relevant in the available documents for that question."
                .to_string(),
            sources: Vec::new(),
            cached: false,
            reranked: false,
            context_used: false,
            search_mode: mode_str.to_string(),
            retrieved_count: 0,
            session_id: request.session_id.clone(),
            error: None,
        };
        state.cache.set(&request.query, mode_str, response.clone());
        return response;
    }

    // ── Step 7: re-ranking, keeping engine order on sidecar failure ──
    let mut reranked = false;
    let chunks = match reranker {
        Some(reranker) if retrieved.len() > 1 => {
            match reranker.rerank(&enhanced, retrieved.clone(), page_size).await {
                Ok(chunks) => {
                    reranked = true;
                    chunks
                }
                Err(err) => {
                    tracing::warn!(error = %err, "reranking failed, keeping engine order");
                    let mut chunks = retrieved;
                    chunks.truncate(page_size);
                    chunks
                }
            }
        }
        _ => {
            let mut chunks = retrieved;
            chunks.truncate(page_size);
            chunks
        }
    };

    // ── Step 8: answer generation ──
    let history = state.sessions.recent_for_generation(&request.session_id);
    let answer = match state
        .generator
        .generate_answer(&request.query, &chunks, &history)
        .await
    {
        Ok(answer) => answer,
        Err(err) => {
            tracing::error!(error = %err, "generation failed");
            return QueryResponse::failure(
                err.to_string(),
                "I'm having trouble generating an answer right now. Please try again.",
                &request,
            );
        }
    };

    // ── Step 9: answer guardrails ──
    let answer = state.guardrails.validate_answer(&answer, &chunks);

    // ── Step 10: record the exchange and cache ──
    state
        .sessions
        .record_exchange(&request.session_id, &request.query, &answer);

    let response = QueryResponse {
        success: true,
        answer,
        sources: build_sources(&chunks),
        cached: false,
        reranked,
        context_used: !chunks.is_empty(),
        search_mode: mode_str.to_string(),
        retrieved_count: chunks.len(),
        session_id: request.session_id.clone(),
        error: None,
    };
    state.cache.set(&request.query, mode_str, response.clone());
    response
}

/// One source per document, first (best-ranked) chunk wins.
fn build_sources(chunks: &[RetrievedChunk]) -> Vec<Source> {
    let mut seen = std::collections::HashSet::new();
    chunks
        .iter()
        .filter(|chunk| seen.insert(chunk.file_name.clone()))
        .map(|chunk| Source {
            title: chunk.document_title.clone(),
            filename: chunk.file_name.clone(),
            url: chunk.document_url.clone(),
            snippet: snippet(&chunk.content),
        })
        .collect()
}

fn snippet(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.len() <= SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let mut end = SNIPPET_CHARS;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(file: &str, title: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: format!("{file}_0"),
            content: content.to_string(),
            document_title: title.to_string(),
            file_name: file.to_string(),
            document_url: format!("https://drive.example/{file}"),
            chunk_index: 0,
            score: 1.0,
            rerank_score: None,
        }
    }

    #[test]
    fn test_sources_deduped_by_file() {
        let chunks = vec![
            chunk("a.pdf", "A", "first"),
            chunk("a.pdf", "A", "second"),
            chunk("b.pdf", "B", "third"),
        ];
        let sources = build_sources(&chunks);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].filename, "a.pdf");
        assert_eq!(sources[0].snippet, "first");
        assert_eq!(sources[1].filename, "b.pdf");
    }

    #[test]
    fn test_snippet_truncated_with_ellipsis() {
        let long = "y".repeat(SNIPPET_CHARS * 2);
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.len(), SNIPPET_CHARS + 3);
    }
}
