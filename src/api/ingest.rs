//! Drive authentication and ingestion endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ingest::drive::DriveClient;
use crate::models::{AuthCompleteRequest, IngestRequest};
use crate::state::{AppState, DriveSession};

type ApiResult = Result<Json<Value>, (StatusCode, String)>;

/// `POST /auth/google-drive`: start the OAuth flow, returning the URL the
/// operator opens to grant access.
pub async fn start_auth(State(state): State<AppState>) -> ApiResult {
    let credentials = DriveClient::load_credentials(&state.config.drive_credentials_path)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let client = DriveClient::new(credentials)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let auth_url = client
        .authorization_url()
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    *state.drive.write() = Some(DriveSession {
        client,
        access_token: None,
    });

    Ok(Json(json!({
        "authUrl": auth_url,
        "instructions": "Open the URL, grant read-only access, then POST the code to /auth/complete"
    })))
}

/// `POST /auth/complete`: exchange the pasted authorization code.
pub async fn complete_auth(
    State(state): State<AppState>,
    Json(request): Json<AuthCompleteRequest>,
) -> ApiResult {
    let client = {
        let guard = state.drive.read();
        match guard.as_ref() {
            Some(session) => session.client.clone(),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "start authentication via /auth/google-drive first".to_string(),
                ))
            }
        }
    };

    let token = client
        .exchange_code(request.authorization_code.trim())
        .await
        .map_err(|err| (StatusCode::UNAUTHORIZED, err.to_string()))?;

    if let Some(session) = state.drive.write().as_mut() {
        session.access_token = Some(token);
    }
    tracing::info!("Google Drive authentication complete");
    Ok(Json(json!({ "authenticated": true })))
}

/// `POST /ingest`: kick off a background ingestion run.
pub async fn start_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult {
    if state.drive_token().is_none() {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Google Drive is not authenticated".to_string(),
        ));
    }
    let run_id = uuid::Uuid::new_v4();
    if !crate::ingest::try_begin_run(&state, run_id) {
        return Err((
            StatusCode::CONFLICT,
            "an ingestion run is already in progress".to_string(),
        ));
    }

    let task_state = state.clone();
    tokio::spawn(async move {
        crate::ingest::run_ingestion(task_state, run_id, request.folder_id).await;
    });
    tracing::info!(%run_id, "ingestion run started");

    Ok(Json(json!({
        "started": true,
        "runId": run_id,
        "message": "ingestion running in the background, poll /status for progress"
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPdfsParams {
    folder_id: Option<String>,
}

/// `GET /list-pdfs`: PDFs visible to the current token, without ingesting.
pub async fn list_pdfs(
    State(state): State<AppState>,
    Query(params): Query<ListPdfsParams>,
) -> ApiResult {
    let token = state.drive_token().ok_or((
        StatusCode::UNAUTHORIZED,
        "Google Drive is not authenticated".to_string(),
    ))?;
    let client = {
        let guard = state.drive.read();
        match guard.as_ref() {
            Some(session) => session.client.clone(),
            None => {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "Google Drive is not authenticated".to_string(),
                ))
            }
        }
    };

    let files = client
        .list_pdfs(&token, params.folder_id.as_deref())
        .await
        .map_err(|err| (StatusCode::BAD_GATEWAY, err.to_string()))?;

    let listed: Vec<Value> = files
        .iter()
        .map(|file| {
            json!({
                "id": file.id,
                "name": file.name,
                "url": file.web_view_link,
            })
        })
        .collect();
    Ok(Json(json!({ "count": listed.len(), "files": listed })))
}
