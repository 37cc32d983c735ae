// src/api/uploads.rs
// CSV upload endpoints. POST accepts either a JSON body (one file) or a
// multipart form (any number of files); every file gets its own result entry.

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tracing::warn;

use crate::ingest::{UploadLogEntry, UploadOutcome, ValidationError};
use crate::state::AppState;

use super::auth::require_session;
use super::error::{ApiError, ApiResult, IntoApiError};

#[derive(Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    pub content: String,
}

#[derive(Serialize)]
pub struct UploadFileResult {
    pub file_name: String,
    pub outcome: Option<UploadOutcome>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
) -> ApiResult<Json<Vec<UploadFileResult>>> {
    let session = require_session(&state, &headers)?;

    let files = extract_files(&headers, request).await?;
    if files.is_empty() {
        return Err(ApiError::bad_request("No files provided"));
    }

    // Files are processed independently; one bad file does not block the rest.
    let mut results = Vec::with_capacity(files.len());
    for (file_name, content) in files {
        match state
            .ingest
            .process_file(&file_name, &content, Some(&session.username))
            .await
        {
            Ok(outcome) => {
                // Keep a copy of the accepted file. Failing to persist is not
                // worth failing an already-processed upload.
                if let Err(e) = persist_upload(&state.config.upload_dir, &file_name, &content).await
                {
                    warn!("Failed to persist upload {}: {}", file_name, e);
                }
                results.push(UploadFileResult {
                    file_name,
                    outcome: Some(outcome),
                    error: None,
                });
            }
            Err(e) => results.push(UploadFileResult {
                file_name,
                outcome: None,
                error: Some(e.to_string()),
            }),
        }
    }

    Ok(Json(results))
}

/// Pull (file name, content) pairs out of the request body: multipart fields
/// with a filename, or a single-file JSON object.
async fn extract_files(headers: &HeaderMap, request: Request) -> ApiResult<Vec<(String, String)>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?;

        let mut files = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
        {
            // Fields without a filename are not file uploads.
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            let content = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?;
            files.push((file_name, content));
        }
        Ok(files)
    } else {
        let Json(body) = Json::<UploadRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
        Ok(vec![(body.filename, body.content)])
    }
}

async fn persist_upload(upload_dir: &str, filename: &str, content: &str) -> std::io::Result<()> {
    // Strip any path components from the client-supplied name.
    let base = FsPath::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.csv".to_string());
    let stamped = format!("{}_{}", chrono::Utc::now().format("%Y%m%d%H%M%S"), base);

    tokio::fs::create_dir_all(upload_dir).await?;
    tokio::fs::write(FsPath::new(upload_dir).join(stamped), content).await
}

pub async fn upload_history_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<UploadLogEntry>>> {
    require_session(&state, &headers)?;

    let limit = params.limit.unwrap_or(20).clamp(1, 200);
    let history = state
        .ingest
        .upload_history(limit)
        .await
        .into_api_error("Failed to fetch upload history")?;

    Ok(Json(history))
}

pub async fn upload_errors_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(upload_id): Path<i64>,
) -> ApiResult<Json<Vec<ValidationError>>> {
    require_session(&state, &headers)?;

    let errors = state
        .ingest
        .validation_errors(upload_id)
        .await
        .into_api_error("Failed to fetch validation errors")?;

    Ok(Json(errors))
}
