//! ragserve: a retrieval-augmented question answering service over a
//! Google Drive document library.
//!
//! PDFs are pulled from Drive, chunked and indexed into Elasticsearch
//! with both lexical fields and dense embeddings. Queries run hybrid
//! retrieval, optional cross-encoder re-ranking, and answer generation
//! against a local Ollama model, fronted by a TTL cache and per-session
//! conversation memory.

pub mod api;
pub mod cache;
pub mod config;
pub mod guardrails;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod search;
pub mod sessions;
pub mod state;
