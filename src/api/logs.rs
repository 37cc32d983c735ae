// src/api/logs.rs

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::activity::{LogEntry, LogStats};
use crate::state::AppState;

use super::auth::require_session;
use super::error::{ApiResult, IntoApiError};

#[derive(Deserialize)]
pub struct LogsQuery {
    pub event_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn get_logs_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<LogsQuery>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    require_session(&state, &headers)?;

    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let offset = params.offset.unwrap_or(0).max(0);

    let logs = state
        .activity
        .get_logs(params.event_type.as_deref(), limit, offset)
        .await
        .into_api_error("Failed to fetch activity logs")?;

    Ok(Json(logs))
}

pub async fn log_stats_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<LogStats>> {
    require_session(&state, &headers)?;

    let stats = state
        .activity
        .stats()
        .await
        .into_api_error("Failed to compute log statistics")?;

    Ok(Json(stats))
}
