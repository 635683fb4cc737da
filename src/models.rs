use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How retrieval is performed for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Lexical multi-match + dense cosine similarity in one query
    Hybrid,
    /// Term-based multi-match only
    Lexical,
    /// Dense cosine similarity only
    Semantic,
}

impl SearchMode {
    /// Parse a wire-format mode string. Unknown values fall back to lexical,
    /// matching the original API's behavior for unrecognized modes.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => SearchMode::Hybrid,
            "semantic" | "vector" => SearchMode::Semantic,
            _ => SearchMode::Lexical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Hybrid => "hybrid",
            SearchMode::Lexical => "lexical",
            SearchMode::Semantic => "semantic",
        }
    }
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Hybrid
    }
}

/// POST /query request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default = "default_search_mode")]
    pub search_mode: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_true")]
    pub enable_reranking: bool,
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_search_mode() -> String {
    "hybrid".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// POST /query response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<Source>,
    pub cached: bool,
    pub reranked: bool,
    pub context_used: bool,
    pub search_mode: String,
    pub retrieved_count: usize,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    /// Failure envelope: HTTP 200 with success=false, like the original API.
    /// The reported mode is normalized, matching what the success path says.
    pub fn failure(error: impl Into<String>, answer: impl Into<String>, req: &QueryRequest) -> Self {
        Self {
            success: false,
            answer: answer.into(),
            sources: Vec::new(),
            cached: false,
            reranked: false,
            context_used: false,
            search_mode: SearchMode::parse(&req.search_mode).as_str().to_string(),
            retrieved_count: 0,
            session_id: req.session_id.clone(),
            error: Some(error.into()),
        }
    }
}

/// A citation attached to an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub title: String,
    pub filename: String,
    pub url: String,
    pub snippet: String,
}

/// A retrieved chunk, scored by the search engine (and optionally reranked).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub content: String,
    pub document_title: String,
    pub file_name: String,
    pub document_url: String,
    pub chunk_index: usize,
    pub score: f32,
    pub rerank_score: Option<f32>,
}

/// A single chat turn (user or assistant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A chunk headed for the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub chunk_content: String,
    pub chunk_index: usize,
    pub document_title: String,
    pub file_name: String,
    pub document_url: String,
    pub file_id: String,
    pub created_timestamp: DateTime<Utc>,
}

/// A PDF known to the service, tracked across ingestion runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub name: String,
    pub url: String,
    pub status: DocumentStatus,
    pub chunk_count: usize,
    pub ingested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Downloading,
    Extracting,
    Indexing,
    Ready,
    Error(String),
}

/// Summary of one ingestion run, surfaced via GET /status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub run_id: Option<Uuid>,
    pub running: bool,
    pub total_files: usize,
    pub processed_count: usize,
    pub total_chunks: usize,
    pub failed_files: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// POST /auth/complete request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCompleteRequest {
    pub authorization_code: String,
}

/// POST /ingest request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_parse() {
        assert_eq!(SearchMode::parse("hybrid"), SearchMode::Hybrid);
        assert_eq!(SearchMode::parse("HYBRID"), SearchMode::Hybrid);
        assert_eq!(SearchMode::parse("semantic"), SearchMode::Semantic);
        assert_eq!(SearchMode::parse("vector"), SearchMode::Semantic);
        assert_eq!(SearchMode::parse("lexical"), SearchMode::Lexical);
        // Unknown modes fall back to lexical
        assert_eq!(SearchMode::parse("elser_only"), SearchMode::Lexical);
        assert_eq!(SearchMode::parse(""), SearchMode::Lexical);
    }

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "what is ml?"}"#).unwrap();
        assert_eq!(req.session_id, "default");
        assert_eq!(req.search_mode, "hybrid");
        assert_eq!(req.max_results, 5);
        assert!(req.enable_reranking);
    }

    #[test]
    fn test_query_request_camel_case_fields() {
        let req: QueryRequest = serde_json::from_str(
            r#"{"query": "q", "sessionId": "s1", "searchMode": "lexical", "maxResults": 3, "enableReranking": false}"#,
        )
        .unwrap();
        assert_eq!(req.session_id, "s1");
        assert_eq!(req.search_mode, "lexical");
        assert_eq!(req.max_results, 3);
        assert!(!req.enable_reranking);
    }

    #[test]
    fn test_query_response_serializes_camel_case() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "q"}"#).unwrap();
        let resp = QueryResponse::failure("bad", "sorry", &req);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("sessionId").is_some());
        assert!(json.get("retrievedCount").is_some());
        assert!(json.get("searchMode").is_some());
    }

    #[test]
    fn test_failure_reports_normalized_mode() {
        let req: QueryRequest = serde_json::from_str(
            r#"{"query": "q", "searchMode": "HYBRID"}"#,
        )
        .unwrap();
        let resp = QueryResponse::failure("bad", "sorry", &req);
        assert_eq!(resp.search_mode, "hybrid");

        // Unknown modes report the lexical fallback they actually ran as
        let req: QueryRequest = serde_json::from_str(
            r#"{"query": "q", "searchMode": "elser_only"}"#,
        )
        .unwrap();
        let resp = QueryResponse::failure("bad", "sorry", &req);
        assert_eq!(resp.search_mode, "lexical");
    }

    #[test]
    fn test_document_status_snake_case() {
        let json = serde_json::to_value(DocumentStatus::Ready).unwrap();
        assert_eq!(json, "ready");
        let json = serde_json::to_value(DocumentStatus::Error("boom".into())).unwrap();
        assert_eq!(json["error"], "boom");
    }
}
