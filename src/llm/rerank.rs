//! Cross-encoder re-ranking via a `/v1/rerank` sidecar.
//!
//! The sidecar scores (query, passage) pairs jointly and returns raw
//! logits; a sigmoid maps them to [0, 1] so scores are comparable across
//! queries. On any sidecar failure the caller keeps the engine ordering.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;
use crate::models::RetrievedChunk;

#[derive(Clone)]
pub struct RerankClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

impl RerankClient {
    /// Returns `None` when reranking is disabled or not fully configured.
    pub fn from_config(config: &RerankerConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let Some(base_url) = &config.base_url else {
            tracing::warn!("reranking enabled but no endpoint configured, disabling");
            return Ok(None);
        };
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build reranker HTTP client")?;
        Ok(Some(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone().unwrap_or_else(|| "default".to_string()),
        }))
    }

    /// Re-score chunks against the query and return the top `top_n`
    /// best-first. Chunk order in the result reflects the cross-encoder,
    /// not the search engine.
    pub async fn rerank(
        &self,
        query: &str,
        mut chunks: Vec<RetrievedChunk>,
        top_n: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        let documents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
        };

        let url = format!("{}/v1/rerank", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("rerank request failed")?;
        if !response.status().is_success() {
            bail!("rerank endpoint returned {}", response.status());
        }
        let parsed: RerankResponse = response.json().await.context("invalid rerank response")?;

        for result in &parsed.results {
            if let Some(chunk) = chunks.get_mut(result.index) {
                chunk.rerank_score = Some(sigmoid(result.relevance_score));
            }
        }

        chunks.sort_by(|a, b| {
            let score_a = a.rerank_score.unwrap_or(f32::MIN);
            let score_b = b.rerank_score.unwrap_or(f32::MIN);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks.truncate(top_n);
        Ok(chunks)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_range_and_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_rerank_response_parses() {
        let raw = serde_json::json!({
            "results": [
                { "index": 1, "relevance_score": 4.2 },
                { "index": 0, "relevance_score": -1.3 }
            ]
        });
        let parsed: RerankResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].index, 1);
    }
}
