// src/api/query.rs
// Custom SQL endpoints. Every statement passes through the read-only guard
// before touching the pool, and every attempt lands in the activity log.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::reports::{ensure_read_only, run_query, to_csv, QueryResult};
use crate::state::AppState;

use super::auth::require_session;
use super::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct QueryRequest {
    pub sql: String,
}

async fn run_guarded(
    state: &AppState,
    sql: &str,
    user: &str,
) -> ApiResult<QueryResult> {
    if let Err(e) = ensure_read_only(sql) {
        state
            .activity
            .log_query(sql, Some(user), "CUSTOM", "REJECTED")
            .await;
        return Err(ApiError::bad_request(e.to_string()));
    }

    match run_query(&state.pool, sql).await {
        Ok(result) => {
            state
                .activity
                .log_query(sql, Some(user), "CUSTOM", "SUCCESS")
                .await;
            Ok(result)
        }
        Err(e) => {
            warn!("Custom query failed: {}", e);
            state
                .activity
                .log_query(sql, Some(user), "CUSTOM", "FAILED")
                .await;
            Err(ApiError::bad_request(format!("Query failed: {}", e)))
        }
    }
}

pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResult>> {
    let session = require_session(&state, &headers)?;
    let result = run_guarded(&state, &request.sql, &session.username).await?;
    Ok(Json(result))
}

pub async fn query_export_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Response> {
    let session = require_session(&state, &headers)?;
    let result = run_guarded(&state, &request.sql, &session.username).await?;
    let body = to_csv(&result);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"query_results.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}
