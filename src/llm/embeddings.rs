//! Text embeddings via a served model.
//!
//! Two providers: Ollama's native `/api/embed` (the default, pairs with
//! locally pulled models like all-minilm) and any OpenAI-compatible
//! `/v1/embeddings` endpoint when `LLM_PROVIDER=openai`.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Inputs longer than this are truncated before embedding. Small local
/// embedding models reject very long inputs outright.
const MAX_EMBED_CHARS: usize = 8000;

const BATCH_SIZE: usize = 32;

#[derive(Clone)]
pub struct EmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    provider: String,
    api_key: Option<String>,
    pub dim: usize,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            provider: config.provider.clone(),
            api_key: config.api_key.clone(),
            dim: config.embedding_dim,
        })
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(vector) => Ok(vector),
            None => bail!("embedding endpoint returned no vectors"),
        }
    }

    /// Embed a slice of texts, batching requests to keep payloads small.
    /// Output order matches input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let inputs: Vec<&str> = batch.iter().map(|t| truncate_chars(t)).collect();
            let vectors = if self.provider == "openai" {
                self.embed_openai(&inputs).await?
            } else {
                self.embed_ollama(&inputs).await?
            };
            if vectors.len() != inputs.len() {
                bail!(
                    "embedding endpoint returned {} vectors for {} inputs",
                    vectors.len(),
                    inputs.len()
                );
            }
            for vector in &vectors {
                if vector.len() != self.dim {
                    bail!(
                        "embedding dimension mismatch: got {}, expected {}",
                        vector.len(),
                        self.dim
                    );
                }
            }
            all.extend(vectors);
        }
        Ok(all)
    }

    async fn embed_ollama(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let request = OllamaEmbedRequest {
            model: &self.model,
            input: inputs.to_vec(),
        };
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("embedding request failed")?;
        if !response.status().is_success() {
            bail!("embedding endpoint returned {}", response.status());
        }
        let parsed: OllamaEmbedResponse =
            response.json().await.context("invalid embedding response")?;
        Ok(parsed.embeddings)
    }

    async fn embed_openai(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let request = OpenAiEmbedRequest {
            model: &self.model,
            input: inputs.to_vec(),
        };
        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.context("embedding request failed")?;
        if !response.status().is_success() {
            bail!("embedding endpoint returned {}", response.status());
        }
        let parsed: OpenAiEmbedResponse =
            response.json().await.context("invalid embedding response")?;
        let mut data = parsed.data;
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Truncate on a char boundary so multi-byte text never splits a codepoint.
fn truncate_chars(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
