//! Answer generation against a local Ollama chat endpoint.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::LlmConfig;
use crate::models::{ChatMessage, RetrievedChunk};

const MAX_ATTEMPTS: u32 = 3;

/// Context beyond this is cut at a chunk boundary to stay inside the
/// model's context window.
const MAX_CONTEXT_CHARS: usize = 6000;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions \
using only the provided document excerpts. Keep answers concise and factual. \
If the excerpts do not contain the answer, say that you don't have enough \
information in the available documents.";

#[derive(Clone)]
pub struct GenerationClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl GenerationClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("failed to build generation HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
        })
    }

    /// Generate an answer grounded in the retrieved chunks, retrying
    /// transient failures with linear backoff.
    pub async fn generate_answer(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        history: &[ChatMessage],
    ) -> Result<String> {
        let user_prompt = build_user_prompt(question, chunks);

        let mut messages = vec![WireMessage {
            role: "system",
            content: SYSTEM_PROMPT,
        }];
        for message in history {
            messages.push(WireMessage {
                role: &message.role,
                content: &message.content,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: &user_prompt,
        });

        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "keep_alive": "5m",
            "options": {
                "temperature": 0.3,
                "top_p": 0.9,
                "top_k": 40,
                "num_ctx": 2048,
                "num_predict": 300,
                "repeat_penalty": 1.1
            }
        });

        let url = format!("{}/api/chat", self.base_url);
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.chat_once(&url, &body).await {
                Ok(answer) if !answer.trim().is_empty() => return Ok(answer),
                Ok(_) => last_error = Some(anyhow::anyhow!("model returned an empty answer")),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "generation attempt failed");
                    last_error = Some(err);
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_secs(attempt as u64)).await;
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("generation failed")))
    }

    async fn chat_once(&self, url: &str, body: &serde_json::Value) -> Result<String> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .context("chat request failed")?;
        if !response.status().is_success() {
            bail!("chat endpoint returned {}", response.status());
        }
        let parsed: ChatResponse = response.json().await.context("invalid chat response")?;
        Ok(parsed.message.content.trim().to_string())
    }

    /// True when the model server answers its version endpoint.
    pub async fn ping(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        matches!(self.http.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }

    /// True when the configured chat model is pulled on the server.
    /// Tag names carry a `:latest` suffix the config usually omits.
    pub async fn model_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let Ok(response) = self.http.get(&url).send().await else {
            return false;
        };
        let Ok(body) = response.json::<serde_json::Value>().await else {
            return false;
        };
        body["models"]
            .as_array()
            .map(|models| {
                models.iter().any(|m| {
                    m["name"]
                        .as_str()
                        .is_some_and(|name| name == self.model || name.starts_with(&format!("{}:", self.model)))
                })
            })
            .unwrap_or(false)
    }
}

/// Number the excerpts so the model can cite them, capping total context.
fn build_user_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return format!(
            "No document excerpts were found for this question.\n\nQuestion: {question}"
        );
    }

    let mut context = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let block = format!(
            "[{}] {} ({}):\n{}\n\n",
            i + 1,
            chunk.document_title,
            chunk.file_name,
            chunk.content.trim()
        );
        if context.len() + block.len() > MAX_CONTEXT_CHARS {
            break;
        }
        context.push_str(&block);
    }

    format!(
        "Answer the question using these document excerpts:\n\n{context}Question: {question}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(title: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: "f_0".to_string(),
            content: content.to_string(),
            document_title: title.to_string(),
            file_name: "f.pdf".to_string(),
            document_url: String::new(),
            chunk_index: 0,
            score: 1.0,
            rerank_score: None,
        }
    }

    #[test]
    fn test_prompt_numbers_excerpts() {
        let chunks = vec![chunk("Doc A", "alpha"), chunk("Doc B", "beta")];
        let prompt = build_user_prompt("what is alpha?", &chunks);
        assert!(prompt.contains("[1] Doc A"));
        assert!(prompt.contains("[2] Doc B"));
        assert!(prompt.ends_with("Question: what is alpha?"));
    }

    #[test]
    fn test_prompt_without_chunks_states_no_excerpts() {
        let prompt = build_user_prompt("anything?", &[]);
        assert!(prompt.contains("No document excerpts"));
    }

    #[test]
    fn test_prompt_caps_context_at_chunk_boundary() {
        let big = "x".repeat(MAX_CONTEXT_CHARS - 100);
        let chunks = vec![chunk("Big", &big), chunk("Dropped", "small")];
        let prompt = build_user_prompt("q", &chunks);
        assert!(prompt.contains("[1] Big"));
        assert!(!prompt.contains("Dropped"));
    }
}
