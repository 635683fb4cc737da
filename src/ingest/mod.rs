//! Document ingestion pipeline.
//!
//! Runs as a background task: list PDFs in Drive, then per file download,
//! extract, chunk, embed and bulk-index, with concurrency capped by the
//! shared semaphore. One failed file is recorded and skipped, never fatal
//! for the run.

pub mod chunking;
pub mod drive;
pub mod pdf;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::models::{Document, DocumentStatus};
use crate::state::AppState;
use chunking::Chunker;
use drive::DriveFile;

/// Atomically claim the shared report for a new run. Returns false when a
/// run is already in progress, so two concurrent starts cannot both pass
/// the guard and clobber each other's report.
pub fn try_begin_run(state: &AppState, run_id: uuid::Uuid) -> bool {
    let mut report = state.ingest_report.write();
    if report.running {
        return false;
    }
    report.run_id = Some(run_id);
    report.running = true;
    report.total_files = 0;
    report.processed_count = 0;
    report.total_chunks = 0;
    report.failed_files.clear();
    report.started_at = Some(Utc::now());
    report.finished_at = None;
    true
}

/// Ingest all PDFs visible to the Drive token, optionally scoped to one
/// folder. The caller must have claimed the report via [`try_begin_run`].
pub async fn run_ingestion(state: AppState, run_id: uuid::Uuid, folder_id: Option<String>) {
    let outcome = ingest_all(&state, folder_id.as_deref()).await;

    {
        let mut report = state.ingest_report.write();
        report.running = false;
        report.finished_at = Some(Utc::now());
        if let Err(err) = &outcome {
            tracing::error!(%run_id, error = %err, "ingestion run failed");
            report.failed_files.push(format!("run: {err}"));
        }
    }
    if let Err(err) = state.persist_documents() {
        tracing::error!(error = %err, "failed to persist document registry");
    }
}

async fn ingest_all(state: &AppState, folder_id: Option<&str>) -> Result<()> {
    let token = state
        .drive_token()
        .context("Google Drive is not authenticated")?;
    let drive = {
        let guard = state.drive.read();
        let session = guard.as_ref().context("Google Drive is not authenticated")?;
        session.client.clone()
    };

    state.search.ensure_index().await?;

    let files = drive.list_pdfs(&token, folder_id).await?;
    tracing::info!(files = files.len(), "found PDFs to ingest");
    state.ingest_report.write().total_files = files.len();

    let mut tasks = tokio::task::JoinSet::new();
    for file in files {
        let state = state.clone();
        let drive = drive.clone();
        let token = token.clone();
        tasks.spawn(async move {
            // Permit bounds concurrent downloads and embedding calls
            let permit = state.ingest_semaphore.clone().acquire_owned().await;
            let name = file.name.clone();
            let result = match permit {
                Ok(_permit) => ingest_file(&state, &drive, &token, &file).await,
                Err(_) => Err(anyhow::anyhow!("ingestion cancelled")),
            };
            (name, file.id, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let Ok((name, file_id, result)) = joined else {
            tracing::error!("ingestion task panicked");
            continue;
        };
        let mut report = state.ingest_report.write();
        match result {
            Ok(chunk_count) => {
                report.processed_count += 1;
                report.total_chunks += chunk_count;
                drop(report);
                tracing::info!(file = %name, chunks = chunk_count, "ingested document");
            }
            Err(err) => {
                report.failed_files.push(name.clone());
                drop(report);
                tracing::warn!(file = %name, error = %err, "failed to ingest document");
                if let Some(doc) = state.documents.write().get_mut(&file_id) {
                    doc.status = DocumentStatus::Error(err.to_string());
                }
            }
        }
        // Keep the registry durable across a long run
        if let Err(err) = state.persist_documents() {
            tracing::error!(error = %err, "failed to persist document registry");
        }
    }
    Ok(())
}

/// Full per-file pipeline. Returns the number of chunks indexed.
async fn ingest_file(
    state: &AppState,
    drive: &drive::DriveClient,
    token: &str,
    file: &DriveFile,
) -> Result<usize> {
    let url = file.web_view_link.clone().unwrap_or_default();
    let mut document = Document {
        file_id: file.id.clone(),
        name: file.name.clone(),
        url: url.clone(),
        status: DocumentStatus::Downloading,
        chunk_count: 0,
        ingested_at: None,
    };
    state.upsert_document(document.clone());

    let bytes = drive.download(token, &file.id).await?;

    document.status = DocumentStatus::Extracting;
    state.upsert_document(document.clone());
    // pdf parsing is CPU-bound, keep it off the async workers
    let text = tokio::task::spawn_blocking(move || pdf::extract_text(&bytes))
        .await
        .context("extraction task failed")??;

    let title = file.name.trim_end_matches(".pdf").to_string();
    let chunker = Chunker::new(
        state.config.retrieval.chunk_size_tokens,
        state.config.retrieval.chunk_overlap_tokens,
    );
    let chunks = chunker.chunk_document(&file.id, &title, &file.name, &url, &text);
    if chunks.is_empty() {
        anyhow::bail!("document produced no chunks");
    }

    document.status = DocumentStatus::Indexing;
    state.upsert_document(document.clone());

    // Embeddings are best-effort: without them the chunks still serve
    // lexical search.
    let contents: Vec<String> = chunks.iter().map(|c| c.chunk_content.clone()).collect();
    let embeddings: Vec<Option<Vec<f32>>> = match state.embeddings.embed_batch(&contents).await {
        Ok(vectors) => vectors.into_iter().map(Some).collect(),
        Err(err) => {
            tracing::warn!(file = %file.name, error = %err, "embedding failed, indexing without vectors");
            vec![None; chunks.len()]
        }
    };

    // Replace any chunks from a previous ingestion of this file
    if let Err(err) = state.search.delete_by_file_id(&file.id).await {
        tracing::debug!(file = %file.name, error = %err, "no previous chunks to delete");
    }
    let indexed = state.search.bulk_index(&chunks, &embeddings).await?;

    document.status = DocumentStatus::Ready;
    document.chunk_count = indexed;
    document.ingested_at = Some(Utc::now());
    state.upsert_document(document);
    Ok(indexed)
}
