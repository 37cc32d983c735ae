// src/api/auth.rs
// Login, logout, and the bearer-token gate every protected handler runs
// through.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{Session, SessionState};
use crate::state::AppState;

use super::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub username: String,
    pub logged_in_at: String,
}

/// Resolve the Authorization bearer token to a live session, refreshing its
/// deadline. An expired token gets the same 401 as a missing one.
pub fn require_session(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
    state
        .sessions
        .get(token)
        .ok_or_else(|| ApiError::unauthorized("Session expired or unknown"))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    state.sessions.sweep();

    let mut session = SessionState::new();
    if session
        .login(&state.credentials, &request.username, &request.password)
        .is_err()
    {
        state.activity.log_login(&request.username, false).await;
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    state.activity.log_login(&request.username, true).await;
    let username = request.username;
    let token = state.sessions.insert(session);
    info!("Login: {}", username);

    Ok(Json(LoginResponse { token, username }))
}

pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<LogoutResponse>> {
    let logged_out = match bearer_token(&headers) {
        Some(token) => state.sessions.remove(token),
        None => false,
    };
    Ok(Json(LogoutResponse { logged_out }))
}

pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<MeResponse>> {
    let session = require_session(&state, &headers)?;
    Ok(Json(MeResponse {
        username: session.username,
        logged_in_at: session.logged_in_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    }))
}
