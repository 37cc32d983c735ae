// tests/http_api.rs
// Router-level tests: login flow, session gating, uploads, guarded queries,
// and the activity log, all against an in-memory database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use staffboard::api::app_router;
use staffboard::config::Config;
use staffboard::db;
use staffboard::state::AppState;

// ============================================================================
// Test Utilities
// ============================================================================

fn test_config() -> Config {
    Config {
        app_username: "admin".to_string(),
        app_password: Some("secret123".to_string()),
        app_password_hash: None,
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        gemini_api_key: None,
        gemini_model: "gemini-1.5-flash".to_string(),
        gemini_timeout_secs: 30,
        host: "127.0.0.1".to_string(),
        port: 0,
        session_ttl_secs: 1800,
        upload_dir: std::env::temp_dir()
            .join("staffboard-test-uploads")
            .to_string_lossy()
            .to_string(),
        log_level: "info".to_string(),
    }
}

async fn test_app() -> Router {
    // A single connection keeps the in-memory database shared across queries.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_schema(&pool).await.unwrap();
    let state = Arc::new(AppState::new(test_config(), pool).unwrap());
    app_router(state)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"username": "admin", "password": "secret123"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn login_issues_token_and_me_resolves_it() {
    let app = test_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(get_request("/api/auth/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["username"], "admin");
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"username": "admin", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = test_app().await;
    for uri in [
        "/api/reports/projects",
        "/api/uploads",
        "/api/logs",
        "/api/auth/me",
    ] {
        let response = app.clone().oneshot(get_request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = test_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/logout", Some(&token), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["logged_out"], true);

    let response = app
        .clone()
        .oneshot(get_request("/api/auth/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn csv_upload_processes_rows_and_records_history() {
    let app = test_app().await;
    let token = login(&app).await;

    let content = "employee_code,employee_name,employee_type\n\
                   E001,Alice,Permanent\n\
                   E002,Bob,Contract\n";
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/uploads",
            Some(&token),
            json!({"filename": "employee.csv", "content": content}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let outcome = &body[0]["outcome"];
    assert_eq!(outcome["status"], "SUCCESS");
    assert_eq!(outcome["records_processed"], 2);
    assert_eq!(outcome["records_success"], 2);
    assert!(body[0]["error"].is_null());

    let response = app
        .clone()
        .oneshot(get_request("/api/uploads", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = response_json(response).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["file_type"], "employee");
}

#[tokio::test]
async fn partial_upload_exposes_validation_errors() {
    let app = test_app().await;
    let token = login(&app).await;

    let content = "employee_code,work_date,hours_worked\n\
                   E001,2024-01-01,8\n\
                   E001,2024-01-02,lots\n";
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/uploads",
            Some(&token),
            json!({"filename": "timesheet_jan.csv", "content": content}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let outcome = &body[0]["outcome"];
    assert_eq!(outcome["status"], "PARTIAL");
    assert_eq!(outcome["records_failed"], 1);
    let upload_id = outcome["upload_id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/api/uploads/{}/errors", upload_id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let errors = response_json(response).await;
    assert_eq!(errors.as_array().unwrap().len(), 1);
    assert_eq!(errors[0]["field_name"], "hours_worked");
}

#[tokio::test]
async fn unrecognized_file_name_is_reported_per_file() {
    let app = test_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/uploads",
            Some(&token),
            json!({"filename": "holidays.csv", "content": "a,b\n1,2\n"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(body[0]["outcome"].is_null());
    assert!(body[0]["error"]
        .as_str()
        .unwrap()
        .contains("does not match any known dataset"));
}

#[tokio::test]
async fn multipart_upload_processes_each_file() {
    let app = test_app().await;
    let token = login(&app).await;

    let boundary = "oJWLFBPcYmNS";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"department.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         department_id,department_name\r\n1,Engineering\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"holidays.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         a,b\r\n1,2\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results = response_json(response).await;
    assert_eq!(results.as_array().unwrap().len(), 2);

    assert_eq!(results[0]["file_name"], "department.csv");
    assert_eq!(results[0]["outcome"]["status"], "SUCCESS");
    assert_eq!(results[0]["outcome"]["records_success"], 1);

    assert_eq!(results[1]["file_name"], "holidays.csv");
    assert!(results[1]["outcome"].is_null());
    assert!(results[1]["error"].is_string());
}

// ============================================================================
// Custom queries
// ============================================================================

#[tokio::test]
async fn select_query_returns_rows() {
    let app = test_app().await;
    let token = login(&app).await;

    let content = "project_id,project_name,client_name\nP01,Apollo,Acme\n";
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/uploads",
            Some(&token),
            json!({"filename": "project.csv", "content": content}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/query",
            Some(&token),
            json!({"sql": "SELECT project_id, project_name FROM project"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["columns"], json!(["project_id", "project_name"]));
    assert_eq!(body["rows"][0][0], "P01");
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn write_statements_are_rejected_by_the_guard() {
    let app = test_app().await;
    let token = login(&app).await;

    for sql in [
        "DELETE FROM employee",
        "UPDATE employee SET employee_name = 'x'",
        "SELECT 1; DROP TABLE employee",
        "PRAGMA journal_mode = DELETE",
    ] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/query",
                Some(&token),
                json!({"sql": sql}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", sql);
    }
}

#[tokio::test]
async fn query_export_returns_csv() {
    let app = test_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/query/export",
            Some(&token),
            json!({"sql": "SELECT 1 AS one, 'a,b' AS pair"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/csv"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.starts_with("one,pair"));
    assert!(body.contains("\"a,b\""));
}

// ============================================================================
// AI assistant (not configured in tests)
// ============================================================================

#[tokio::test]
async fn assistant_endpoints_report_unavailable_without_api_key() {
    let app = test_app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/assistant/query",
            Some(&token),
            json!({"question": "who worked most hours?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/assistant/summarize",
            Some(&token),
            json!({"employee_code": "E001"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Activity log
// ============================================================================

#[tokio::test]
async fn login_attempts_land_in_the_activity_log() {
    let app = test_app().await;

    // One failed attempt, then a successful one.
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"username": "admin", "password": "wrong"}),
        ))
        .await
        .unwrap();
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(get_request("/api/logs?event_type=LOGIN", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let logs = response_json(response).await;
    assert_eq!(logs.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get_request("/api/logs/stats", Some(&token)))
        .await
        .unwrap();
    let stats = response_json(response).await;
    assert_eq!(stats["total_count"], 2);
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_is_public_and_reports_database_status() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(get_request("/api/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "ok");
}
