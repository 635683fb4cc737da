use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the document registry and auth tokens are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Search engine (Elasticsearch) configuration
    pub search: SearchConfig,
    /// LLM runtime configuration
    pub llm: LlmConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Query-response cache configuration
    pub cache: CacheConfig,
    /// Retrieval and chunking tuning
    pub retrieval: RetrievalConfig,
    /// Path to the Google Drive OAuth client config JSON
    pub drive_credentials_path: PathBuf,
    /// Allow GET /sessions/{id}/export
    pub enable_chat_export: bool,
    /// Maximum concurrent PDF downloads/extractions during ingestion
    pub ingest_max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the Elasticsearch cluster (e.g. "https://localhost:9200")
    pub base_url: String,
    /// Index holding document chunks
    pub index_name: String,
    pub username: String,
    pub password: String,
    /// Accept self-signed certificates (local clusters ship with one)
    pub insecure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai" (embeddings only; chat always goes to Ollama)
    pub provider: String,
    /// Base URL for the Ollama server
    pub base_url: String,
    /// Model name for answer generation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud embedding providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension (must match the index mapping)
    pub embedding_dim: usize,
}

/// Configuration for the cross-encoder reranker sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Whether re-ranking is attempted at all
    pub enabled: bool,
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    /// If None, ordering falls back to engine scores.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_minutes: u64,
    pub max_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results returned to the user per query
    pub max_results: usize,
    /// Target chunk size, in tokens (the chunker budgets ~4 chars per token)
    pub chunk_size_tokens: usize,
    /// Overlap carried between consecutive chunks, in tokens
    pub chunk_overlap_tokens: usize,
    /// Longest accepted query, in characters
    pub max_query_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "0.0.0.0:8000".to_string(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            reranker: RerankerConfig::default(),
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            drive_credentials_path: PathBuf::from("credentials.json"),
            enable_chat_export: false,
            ingest_max_concurrent: 4,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:9200".to_string(),
            index_name: "rag_documents_v1".to_string(),
            username: "elastic".to_string(),
            password: String::new(),
            insecure: true,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3".to_string(),
            embedding_model: "all-minilm".to_string(),
            api_key: None,
            embedding_dim: 384,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 5,
            max_size: 100,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            chunk_size_tokens: 300,
            chunk_overlap_tokens: 50,
            max_query_length: 500,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Ok(url) = std::env::var("ELASTICSEARCH_URL") {
            config.search.base_url = url;
        }
        if let Ok(name) = std::env::var("ELASTICSEARCH_INDEX") {
            config.search.index_name = name;
        }
        if let Ok(user) = std::env::var("ELASTICSEARCH_USERNAME") {
            config.search.username = user;
        }
        if let Ok(pass) = std::env::var("ELASTICSEARCH_PASSWORD") {
            config.search.password = pass;
        }
        if let Ok(val) = std::env::var("ELASTICSEARCH_INSECURE") {
            config.search.insecure = parse_bool(&val, config.search.insecure);
        }

        if let Ok(path) = std::env::var("GOOGLE_DRIVE_CREDENTIALS_PATH") {
            config.drive_credentials_path = PathBuf::from(path);
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        if let Ok(val) = std::env::var("ENABLE_RERANKING") {
            config.reranker.enabled = parse_bool(&val, config.reranker.enabled);
        }
        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Ok(val) = std::env::var("RERANKER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.reranker.timeout_secs = v.min(30); // Cap at 30s
            }
        }

        if let Ok(val) = std::env::var("CACHE_TTL_MINUTES") {
            if let Ok(v) = val.parse() {
                config.cache.ttl_minutes = v;
            }
        }
        if let Ok(val) = std::env::var("CACHE_MAX_SIZE") {
            if let Ok(v) = val.parse() {
                config.cache.max_size = v;
            }
        }
        if let Ok(val) = std::env::var("ENABLE_CHAT_EXPORT") {
            config.enable_chat_export = parse_bool(&val, config.enable_chat_export);
        }

        if let Ok(val) = std::env::var("MAX_RETRIEVAL_RESULTS") {
            if let Ok(v) = val.parse() {
                config.retrieval.max_results = v;
            }
        }
        if let Ok(val) = std::env::var("CHUNK_SIZE_TOKENS") {
            if let Ok(v) = val.parse() {
                config.retrieval.chunk_size_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("CHUNK_OVERLAP_TOKENS") {
            if let Ok(v) = val.parse() {
                config.retrieval.chunk_overlap_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("MAX_QUERY_LENGTH") {
            if let Ok(v) = val.parse() {
                config.retrieval.max_query_length = v;
            }
        }
        if let Ok(val) = std::env::var("INGEST_MAX_CONCURRENT") {
            if let Ok(v) = val.parse::<usize>() {
                config.ingest_max_concurrent = v.max(1);
            }
        }

        config
    }

    pub fn registry_path(&self) -> std::path::PathBuf {
        self.data_dir.join("documents.json")
    }

    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache.ttl_minutes * 60)
    }
}

fn parse_bool(val: &str, default: bool) -> bool {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}
