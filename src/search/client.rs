//! Thin Elasticsearch REST client over `reqwest`.
//!
//! Only the handful of endpoints the service needs: index management,
//! bulk NDJSON indexing, search, stats and cluster health.

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::SearchConfig;
use crate::models::{DocumentChunk, RetrievedChunk, SearchMode};
use crate::search::query::{build_search_body, index_mapping, SearchResponse};

#[derive(Clone)]
pub struct SearchClient {
    http: Client,
    base_url: String,
    index: String,
    username: String,
    password: String,
    embedding_dim: usize,
}

/// Point-in-time index figures reported by `/status`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub doc_count: u64,
    pub store_size_bytes: u64,
}

impl SearchClient {
    pub fn new(config: &SearchConfig, embedding_dim: usize) -> Result<Self> {
        let mut builder = Client::builder().timeout(std::time::Duration::from_secs(30));
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().context("failed to build search HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            index: config.index_name.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            embedding_dim,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.username.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.username, Some(&self.password))
        }
    }

    /// True when the cluster answers on the root endpoint.
    pub async fn ping(&self) -> bool {
        let request = self.authed(self.http.get(&self.base_url));
        matches!(request.send().await, Ok(resp) if resp.status().is_success())
    }

    /// Cluster health status string ("green"/"yellow"/"red").
    pub async fn cluster_health(&self) -> Result<String> {
        let url = format!("{}/_cluster/health", self.base_url);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("cluster health request failed")?;
        if !response.status().is_success() {
            bail!("cluster health returned {}", response.status());
        }
        let body: Value = response.json().await.context("invalid health response")?;
        Ok(body["status"].as_str().unwrap_or("unknown").to_string())
    }

    /// Create the chunk index with its mapping if it does not exist yet.
    pub async fn ensure_index(&self) -> Result<()> {
        let url = format!("{}/{}", self.base_url, self.index);
        let head = self
            .authed(self.http.head(&url))
            .send()
            .await
            .context("index existence check failed")?;
        if head.status().is_success() {
            return Ok(());
        }

        let response = self
            .authed(self.http.put(&url))
            .json(&index_mapping(self.embedding_dim))
            .send()
            .await
            .context("index creation request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("index creation failed ({status}): {body}");
        }
        tracing::info!(index = %self.index, "created search index");
        Ok(())
    }

    /// Bulk-index chunks via NDJSON, refreshing so they are searchable
    /// immediately. Returns the number of chunks indexed.
    pub async fn bulk_index(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Option<Vec<f32>>],
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut body = String::new();
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            let action = serde_json::json!({
                "index": { "_index": self.index, "_id": chunk.chunk_id }
            });
            let mut doc = serde_json::to_value(chunk)?;
            if let Some(vector) = embedding {
                doc["denseEmbedding"] = serde_json::to_value(vector)?;
            }
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&doc.to_string());
            body.push('\n');
        }

        let url = format!("{}/_bulk?refresh=true", self.base_url);
        let response = self
            .authed(self.http.post(&url))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("bulk index request failed")?;
        if !response.status().is_success() {
            bail!("bulk index returned {}", response.status());
        }

        let result: Value = response.json().await.context("invalid bulk response")?;
        if result["errors"].as_bool().unwrap_or(false) {
            let first_error = result["items"]
                .as_array()
                .and_then(|items| {
                    items.iter().find_map(|item| {
                        item["index"]["error"]["reason"].as_str().map(String::from)
                    })
                })
                .unwrap_or_else(|| "unknown bulk error".to_string());
            bail!("bulk index reported item errors: {first_error}");
        }
        Ok(chunks.len())
    }

    /// Run a search in the given mode, returning parsed chunks best-first.
    pub async fn search(
        &self,
        mode: SearchMode,
        query_text: &str,
        query_embedding: Option<&[f32]>,
        size: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let body = build_search_body(mode, query_text, query_embedding, size);
        let response = self
            .authed(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .context("search request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("search returned {status}: {body}");
        }
        let parsed: SearchResponse = response.json().await.context("invalid search response")?;
        Ok(parsed.into_chunks())
    }

    /// Delete all chunks belonging to a file, used before re-ingestion.
    pub async fn delete_by_file_id(&self, file_id: &str) -> Result<u64> {
        let url = format!(
            "{}/{}/_delete_by_query?refresh=true",
            self.base_url, self.index
        );
        let body = serde_json::json!({
            "query": { "term": { "fileId": file_id } }
        });
        let response = self
            .authed(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .context("delete-by-query request failed")?;
        if !response.status().is_success() {
            bail!("delete-by-query returned {}", response.status());
        }
        let result: Value = response.json().await.context("invalid delete response")?;
        Ok(result["deleted"].as_u64().unwrap_or(0))
    }

    /// Document count and store size for the chunk index.
    pub async fn index_stats(&self) -> Result<IndexStats> {
        let url = format!("{}/{}/_stats", self.base_url, self.index);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("index stats request failed")?;
        if !response.status().is_success() {
            bail!("index stats returned {}", response.status());
        }
        let body: Value = response.json().await.context("invalid stats response")?;
        let primaries = &body["indices"][&self.index]["primaries"];
        Ok(IndexStats {
            doc_count: primaries["docs"]["count"].as_u64().unwrap_or(0),
            store_size_bytes: primaries["store"]["size_in_bytes"].as_u64().unwrap_or(0),
        })
    }
}
