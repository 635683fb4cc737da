//! Health, status, cache and session endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::models::DocumentStatus;
use crate::state::AppState;

type ApiResult = Result<Json<Value>, (StatusCode, String)>;

/// `GET /healthz`: deep health check across the backing services.
/// Unhealthy (503) when a critical service is down, degraded when the
/// chat model is not pulled yet.
pub async fn healthz(State(state): State<AppState>) -> ApiResult {
    let search_ok = state.search.ping().await;
    let cluster = if search_ok {
        state
            .search
            .cluster_health()
            .await
            .unwrap_or_else(|_| "unknown".to_string())
    } else {
        "unreachable".to_string()
    };
    let llm_ok = state.generator.ping().await;
    let model_ok = llm_ok && state.generator.model_available().await;

    let status = if !search_ok || !llm_ok {
        "unhealthy"
    } else if !model_ok {
        "degraded"
    } else {
        "healthy"
    };

    let body = json!({
        "status": status,
        "searchEngine": { "reachable": search_ok, "cluster": cluster },
        "llm": { "reachable": llm_ok, "modelAvailable": model_ok },
        "driveAuthenticated": state.drive_token().is_some(),
        "cache": state.cache.stats(),
        "sessions": {
            "active": state.sessions.active_count(),
            "totalMessages": state.sessions.total_messages(),
        },
    });
    if status == "unhealthy" {
        Err((StatusCode::SERVICE_UNAVAILABLE, body.to_string()))
    } else {
        Ok(Json(body))
    }
}

/// `GET /status`: service snapshot for operators.
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let documents = state.documents.read().clone();
    let ready = documents
        .values()
        .filter(|d| d.status == DocumentStatus::Ready)
        .count();
    let failed = documents
        .values()
        .filter(|d| matches!(d.status, DocumentStatus::Error(_)))
        .count();

    let index_stats = state.search.index_stats().await.ok();
    let report = state.ingest_report.read().clone();
    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds();

    let mut listed: Vec<Value> = documents
        .values()
        .map(|doc| {
            json!({
                "fileId": doc.file_id,
                "name": doc.name,
                "status": doc.status,
                "chunkCount": doc.chunk_count,
                "ingestedAt": doc.ingested_at,
            })
        })
        .collect();
    listed.sort_by_key(|doc| doc["name"].as_str().unwrap_or_default().to_string());

    let system_healthy = index_stats.is_some();

    Json(json!({
        "systemHealthy": system_healthy,
        "uptimeSecs": uptime_secs,
        "activeChatSessions": state.sessions.active_count(),
        "index": {
            "name": state.search.index_name(),
            "stats": index_stats,
        },
        "documents": {
            "total": documents.len(),
            "ready": ready,
            "failed": failed,
            "items": listed,
        },
        "ingestion": report,
        "cache": state.cache.stats(),
        "sessions": {
            "active": state.sessions.active_count(),
            "totalMessages": state.sessions.total_messages(),
        },
    }))
}

/// `GET /cache/stats`
pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!(state.cache.stats()))
}

/// `POST /cache/clear`
pub async fn cache_clear(State(state): State<AppState>) -> Json<Value> {
    state.cache.clear();
    tracing::info!("query cache cleared");
    Json(json!({ "cleared": true }))
}

/// `GET /sessions/{id}/history`
pub async fn session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Value> {
    let history = state.sessions.history(&session_id);
    Json(json!({
        "sessionId": session_id,
        "messageCount": history.len(),
        "messages": history,
    }))
}

/// `DELETE /sessions/{id}`
pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Value> {
    let existed = state.sessions.clear(&session_id);
    Json(json!({ "sessionId": session_id, "cleared": existed }))
}

/// `GET /sessions/{id}/export`: plain-text transcript, gated by config.
pub async fn export_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<String, (StatusCode, String)> {
    // Export is invisible unless explicitly enabled
    if !state.config.enable_chat_export {
        return Err((StatusCode::NOT_FOUND, "not found".to_string()));
    }
    state
        .sessions
        .export_transcript(&session_id)
        .ok_or((StatusCode::NOT_FOUND, format!("no session '{session_id}'")))
}
