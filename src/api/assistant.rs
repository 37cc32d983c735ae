// src/api/assistant.rs
// Gemini-backed endpoints. Both 503 when no API key is configured.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::llm::assistant::AssistantAnswer;
use crate::llm::summarizer::EmployeeTaskSummary;
use crate::reports::QueryGuardError;
use crate::state::AppState;

use super::auth::require_session;
use super::error::{ApiError, ApiResult, IntoApiErrorOption};

#[derive(Deserialize)]
pub struct AssistantQueryRequest {
    pub question: String,
}

#[derive(Deserialize)]
pub struct SummarizeRequest {
    pub employee_code: String,
    pub model: Option<String>,
}

pub async fn assistant_query_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AssistantQueryRequest>,
) -> ApiResult<Json<AssistantAnswer>> {
    let session = require_session(&state, &headers)?;

    let assistant = state
        .assistant
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("AI assistant is not configured"))?;

    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("Question must not be empty"));
    }

    let answer = assistant
        .answer(question, Some(&session.username))
        .await
        .map_err(|e| {
            warn!("Assistant query failed: {}", e);
            // Guard rejections and bad SQL are the caller's problem; anything
            // else is the upstream model.
            if e.downcast_ref::<QueryGuardError>().is_some()
                || e.downcast_ref::<sqlx::Error>().is_some()
            {
                ApiError::bad_request(format!("Assistant query failed: {}", e))
            } else {
                ApiError::bad_gateway(format!("Assistant query failed: {}", e))
            }
        })?;

    Ok(Json(answer))
}

pub async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<Json<EmployeeTaskSummary>> {
    require_session(&state, &headers)?;

    let summarizer = state
        .summarizer
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("AI assistant is not configured"))?;

    let summary = summarizer
        .summarize(&request.employee_code, request.model.as_deref())
        .await
        .map_err(|e| {
            warn!("Task summarization failed: {}", e);
            if e.downcast_ref::<sqlx::Error>().is_some() {
                ApiError::internal(format!("Task summarization failed: {}", e))
            } else {
                ApiError::bad_gateway(format!("Task summarization failed: {}", e))
            }
        })?
        .ok_or_not_found("Employee not found")?;

    Ok(Json(summary))
}
