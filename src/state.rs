//! Shared application state handed to every handler.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Semaphore;

use crate::cache::QueryCache;
use crate::config::Config;
use crate::guardrails::Guardrails;
use crate::ingest::drive::DriveClient;
use crate::llm::{EmbeddingClient, GenerationClient, RerankClient};
use crate::models::{Document, IngestReport};
use crate::search::SearchClient;
use crate::sessions::SessionStore;

/// An in-progress or completed Drive authentication.
pub struct DriveSession {
    pub client: DriveClient,
    pub access_token: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub search: SearchClient,
    pub embeddings: EmbeddingClient,
    pub generator: GenerationClient,
    pub reranker: Option<RerankClient>,
    pub cache: Arc<QueryCache>,
    pub sessions: Arc<SessionStore>,
    pub guardrails: Arc<Guardrails>,
    pub drive: Arc<RwLock<Option<DriveSession>>>,
    pub documents: Arc<RwLock<HashMap<String, Document>>>,
    pub ingest_report: Arc<RwLock<IngestReport>>,
    pub ingest_semaphore: Arc<Semaphore>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;

        let documents = load_registry(&config.registry_path())?;
        tracing::info!(documents = documents.len(), "loaded document registry");

        let search = SearchClient::new(&config.search, config.llm.embedding_dim)?;
        let embeddings = EmbeddingClient::new(&config.llm)?;
        let generator = GenerationClient::new(&config.llm)?;
        let reranker = RerankClient::from_config(&config.reranker)?;
        let cache = QueryCache::new(config.cache_ttl(), config.cache.max_size);
        let guardrails = Guardrails::new(config.retrieval.max_query_length);
        let ingest_semaphore = Arc::new(Semaphore::new(config.ingest_max_concurrent.max(1)));

        Ok(Self {
            config: Arc::new(config),
            search,
            embeddings,
            generator,
            reranker,
            cache: Arc::new(cache),
            sessions: Arc::new(SessionStore::new()),
            guardrails: Arc::new(guardrails),
            drive: Arc::new(RwLock::new(None)),
            documents: Arc::new(RwLock::new(documents)),
            ingest_report: Arc::new(RwLock::new(IngestReport::default())),
            ingest_semaphore,
            started_at: Utc::now(),
        })
    }

    /// Current Drive access token, if the OAuth flow has completed.
    pub fn drive_token(&self) -> Option<String> {
        self.drive
            .read()
            .as_ref()
            .and_then(|session| session.access_token.clone())
    }

    pub fn upsert_document(&self, document: Document) {
        self.documents
            .write()
            .insert(document.file_id.clone(), document);
    }

    /// Write the registry to disk atomically (tmp file + rename).
    pub fn persist_documents(&self) -> Result<()> {
        let snapshot: Vec<Document> = self.documents.read().values().cloned().collect();
        let path = self.config.registry_path();
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

fn load_registry(path: &std::path::Path) -> Result<HashMap<String, Document>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let documents: Vec<Document> =
        serde_json::from_str(&raw).context("document registry is corrupt")?;
    Ok(documents
        .into_iter()
        .map(|doc| (doc.file_id.clone(), doc))
        .collect())
}
