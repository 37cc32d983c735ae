// src/api/router.rs
// HTTP router composition for REST API endpoints

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::{
    assistant::{assistant_query_handler, summarize_handler},
    auth::{login_handler, logout_handler, me_handler},
    logs::{get_logs_handler, log_stats_handler},
    query::{query_export_handler, query_handler},
    reports::{
        employee_master_handler, list_employees_handler, list_projects_handler,
        project_master_handler,
    },
    uploads::{upload_errors_handler, upload_handler, upload_history_handler},
};

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => "ok",
        Err(_) => "unreachable",
    };
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Full API router, nested under /api by the caller.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_handler))

        // Auth
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/me", get(me_handler))

        // CSV uploads
        .route("/uploads", post(upload_handler))
        .route("/uploads", get(upload_history_handler))
        .route("/uploads/{id}/errors", get(upload_errors_handler))

        // Reports
        .route("/reports/projects", get(list_projects_handler))
        .route("/reports/projects/{id}", get(project_master_handler))
        .route("/reports/employees", get(list_employees_handler))
        .route("/reports/employees/{code}", get(employee_master_handler))

        // Custom SQL
        .route("/query", post(query_handler))
        .route("/query/export", post(query_export_handler))

        // AI assistant
        .route("/assistant/query", post(assistant_query_handler))
        .route("/assistant/summarize", post(summarize_handler))

        // Activity log
        .route("/logs", get(get_logs_handler))
        .route("/logs/stats", get(log_stats_handler))

        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Application router with the API nested under /api.
pub fn app_router(app_state: Arc<AppState>) -> Router {
    Router::new().nest("/api", api_router(app_state))
}
