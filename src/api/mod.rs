pub mod ingest;
pub mod query;
pub mod system;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query::query))
        .route("/healthz", get(system::healthz))
        .route("/status", get(system::status))
        .route("/cache/stats", get(system::cache_stats))
        .route("/cache/clear", post(system::cache_clear))
        .route("/auth/google-drive", post(ingest::start_auth))
        .route("/auth/complete", post(ingest::complete_auth))
        .route("/ingest", post(ingest::start_ingest))
        .route("/list-pdfs", get(ingest::list_pdfs))
        .route("/sessions/{session_id}", axum::routing::delete(system::clear_session))
        .route("/sessions/{session_id}/history", get(system::session_history))
        .route("/sessions/{session_id}/export", get(system::export_session))
        .with_state(state)
}
