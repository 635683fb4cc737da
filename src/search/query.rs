//! Elasticsearch query DSL builders and hit parsing.
//!
//! Hybrid search mirrors the index's dual representation: a lexical
//! multi-match over content/title and a cosine script-score over the dense
//! embedding, combined in one bool/should so the engine fuses the scores.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{RetrievedChunk, SearchMode};

/// Fields pulled back from the index per hit.
pub const SOURCE_FIELDS: &[&str] = &[
    "documentTitle",
    "chunkContent",
    "documentUrl",
    "fileName",
    "chunkIndex",
    "chunkId",
];

/// Build the full search request body for a mode.
pub fn build_search_body(
    mode: SearchMode,
    query_text: &str,
    query_embedding: Option<&[f32]>,
    size: usize,
) -> Value {
    let query = match (mode, query_embedding) {
        (SearchMode::Hybrid, Some(embedding)) => hybrid_query(query_text, embedding),
        (SearchMode::Semantic, Some(embedding)) => semantic_query(embedding),
        // Without an embedding both vector modes degrade to lexical
        _ => lexical_query(query_text),
    };

    json!({
        "query": query,
        "size": size,
        "_source": SOURCE_FIELDS,
    })
}

/// Lexical multi-match with content^2 / title^3 boosts.
fn lexical_query(query_text: &str) -> Value {
    json!({
        "multi_match": {
            "query": query_text,
            "fields": ["chunkContent^2", "documentTitle^3"],
            "type": "best_fields"
        }
    })
}

/// Cosine similarity over the dense embedding (+1.0 keeps scores positive).
fn semantic_query(embedding: &[f32]) -> Value {
    json!({
        "script_score": {
            "query": { "match_all": {} },
            "script": {
                "source": "cosineSimilarity(params.queryVector, 'denseEmbedding') + 1.0",
                "params": { "queryVector": embedding }
            }
        }
    })
}

/// Lexical (boost 1.0) + semantic (boost 2.0) in a single bool/should.
fn hybrid_query(query_text: &str, embedding: &[f32]) -> Value {
    json!({
        "bool": {
            "should": [
                {
                    "multi_match": {
                        "query": query_text,
                        "fields": ["chunkContent^2", "documentTitle^3"],
                        "type": "best_fields",
                        "boost": 1.0
                    }
                },
                {
                    "script_score": {
                        "query": { "match_all": {} },
                        "script": {
                            "source": "cosineSimilarity(params.queryVector, 'denseEmbedding') + 1.0",
                            "params": { "queryVector": embedding }
                        },
                        "boost": 2.0
                    }
                }
            ]
        }
    })
}

/// Index mapping for document chunks.
pub fn index_mapping(embedding_dim: usize) -> Value {
    json!({
        "mappings": {
            "properties": {
                "documentTitle": { "type": "text", "analyzer": "standard" },
                "chunkContent": { "type": "text", "analyzer": "standard" },
                "chunkId": { "type": "keyword" },
                "documentUrl": { "type": "keyword" },
                "fileName": { "type": "keyword" },
                "fileId": { "type": "keyword" },
                "chunkIndex": { "type": "integer" },
                "createdTimestamp": { "type": "date" },
                "denseEmbedding": {
                    "type": "dense_vector",
                    "dims": embedding_dim,
                    "index": true,
                    "similarity": "cosine"
                }
            }
        },
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "analysis": {
                "analyzer": {
                    "standard": { "type": "standard", "stopwords": "_english_" }
                }
            }
        }
    })
}

// ─── Response parsing ────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchResponse {
    pub hits: SearchHits,
}

#[derive(Deserialize)]
pub struct SearchHits {
    pub hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_score")]
    pub score: Option<f32>,
    #[serde(rename = "_source")]
    pub source: HitSource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitSource {
    #[serde(default)]
    pub chunk_id: String,
    #[serde(default)]
    pub chunk_content: String,
    #[serde(default)]
    pub document_title: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub document_url: String,
    #[serde(default)]
    pub chunk_index: usize,
}

impl SearchResponse {
    pub fn into_chunks(self) -> Vec<RetrievedChunk> {
        self.hits
            .hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                chunk_id: hit.source.chunk_id,
                content: hit.source.chunk_content,
                document_title: hit.source.document_title,
                file_name: hit.source.file_name,
                document_url: hit.source.document_url,
                chunk_index: hit.source.chunk_index,
                score: hit.score.unwrap_or(0.0),
                rerank_score: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_body_shape() {
        let body = build_search_body(SearchMode::Lexical, "machine learning", None, 5);
        assert_eq!(body["size"], 5);
        let fields = &body["query"]["multi_match"]["fields"];
        assert_eq!(fields[0], "chunkContent^2");
        assert_eq!(fields[1], "documentTitle^3");
        assert_eq!(body["_source"][0], "documentTitle");
    }

    #[test]
    fn test_hybrid_body_has_both_clauses_with_boosts() {
        let embedding = vec![0.1f32; 4];
        let body = build_search_body(SearchMode::Hybrid, "q", Some(&embedding), 10);
        let should = body["query"]["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 2);
        assert_eq!(should[0]["multi_match"]["boost"], 1.0);
        assert_eq!(should[1]["script_score"]["boost"], 2.0);
        assert!(should[1]["script_score"]["script"]["source"]
            .as_str()
            .unwrap()
            .contains("cosineSimilarity"));
    }

    #[test]
    fn test_semantic_body_has_no_lexical_clause() {
        let embedding = vec![0.5f32; 4];
        let body = build_search_body(SearchMode::Semantic, "q", Some(&embedding), 3);
        assert!(body["query"]["script_score"].is_object());
        assert!(body["query"].get("multi_match").is_none());
    }

    #[test]
    fn test_vector_modes_degrade_to_lexical_without_embedding() {
        let body = build_search_body(SearchMode::Hybrid, "q", None, 5);
        assert!(body["query"]["multi_match"].is_object());
        let body = build_search_body(SearchMode::Semantic, "q", None, 5);
        assert!(body["query"]["multi_match"].is_object());
    }

    #[test]
    fn test_mapping_uses_configured_dims() {
        let mapping = index_mapping(384);
        let dense = &mapping["mappings"]["properties"]["denseEmbedding"];
        assert_eq!(dense["dims"], 384);
        assert_eq!(dense["similarity"], "cosine");
    }

    #[test]
    fn test_parse_search_response() {
        let raw = serde_json::json!({
            "hits": {
                "hits": [
                    {
                        "_score": 3.2,
                        "_source": {
                            "chunkId": "file1_0",
                            "chunkContent": "machine learning is...",
                            "documentTitle": "ML Primer",
                            "fileName": "ml.pdf",
                            "documentUrl": "https://drive.example/ml",
                            "chunkIndex": 0
                        }
                    }
                ]
            }
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        let chunks = parsed.into_chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "file1_0");
        assert_eq!(chunks[0].document_title, "ML Primer");
        assert!((chunks[0].score - 3.2).abs() < 1e-6);
    }

    #[test]
    fn test_parse_hit_with_missing_score() {
        let raw = serde_json::json!({
            "hits": { "hits": [ { "_source": { "chunkId": "x_1" } } ] }
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        let chunks = parsed.into_chunks();
        assert_eq!(chunks[0].score, 0.0);
        assert_eq!(chunks[0].chunk_index, 0);
    }
}
