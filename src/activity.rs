// src/activity.rs
// Activity logging to the system_logs table. Logging never fails the
// operation that triggered it; failures are reported as `false` and traced.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub log_id: i64,
    pub event_type: String,
    pub user: Option<String>,
    pub description: String,
    pub details: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub total_count: i64,
    pub event_counts: HashMap<String, i64>,
    pub daily_counts: HashMap<String, i64>,
}

#[derive(Clone)]
pub struct ActivityLogger {
    pool: SqlitePool,
}

impl ActivityLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn log_event(
        &self,
        event_type: &str,
        description: &str,
        user: Option<&str>,
        details: Option<serde_json::Value>,
    ) -> bool {
        let details_str = details.map(|d| d.to_string());
        let timestamp: DateTime<Utc> = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO system_logs (event_type, user, description, details, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event_type)
        .bind(user)
        .bind(description)
        .bind(&details_str)
        .bind(timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!("Logged event: {} - {}", event_type, description);
                true
            }
            Err(e) => {
                warn!("Error logging event {}: {}", event_type, e);
                false
            }
        }
    }

    pub async fn log_login(&self, username: &str, success: bool) -> bool {
        let status = if success { "SUCCESS" } else { "FAILED" };
        let description = format!("Login attempt for {} - {}", username, status);
        self.log_event(
            "LOGIN",
            &description,
            Some(username),
            Some(serde_json::json!({ "status": status })),
        )
        .await
    }

    pub async fn log_file_upload(
        &self,
        filename: &str,
        file_type: &str,
        user: Option<&str>,
        status: &str,
    ) -> bool {
        let description = format!("File upload: {} ({}) - {}", filename, file_type, status);
        self.log_event("FILE_UPLOAD", &description, user, None).await
    }

    pub async fn log_file_processing(
        &self,
        filename: &str,
        records_processed: i64,
        records_success: i64,
        records_failed: i64,
        user: Option<&str>,
    ) -> bool {
        let description = format!("File processed: {}", filename);
        let details = serde_json::json!({
            "records_processed": records_processed,
            "records_success": records_success,
            "records_failed": records_failed,
        });
        self.log_event("FILE_PROCESSING", &description, user, Some(details))
            .await
    }

    pub async fn log_query(
        &self,
        query_text: &str,
        user: Option<&str>,
        query_type: &str,
        status: &str,
    ) -> bool {
        let query_text_short = if query_text.chars().count() > 500 {
            format!("{}...", query_text.chars().take(500).collect::<String>())
        } else {
            query_text.to_string()
        };
        let description = format!("{} query executed: {}", query_type, query_text_short);
        let details = serde_json::json!({ "query": query_text, "status": status });
        self.log_event("QUERY", &description, user, Some(details)).await
    }

    pub async fn log_ai_query(
        &self,
        user_query: &str,
        generated_sql: &str,
        user: Option<&str>,
        status: &str,
    ) -> bool {
        let preview: String = user_query.chars().take(100).collect();
        let description = format!("AI Query: {}...", preview);
        let details = serde_json::json!({
            "user_query": user_query,
            "generated_sql": generated_sql,
            "status": status,
        });
        self.log_event("AI_QUERY", &description, user, Some(details)).await
    }

    /// Newest-first log retrieval with an optional event type filter.
    pub async fn get_logs(
        &self,
        event_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LogEntry>> {
        let rows = match event_type {
            Some(event_type) => {
                sqlx::query(
                    r#"
                    SELECT log_id, event_type, user, description, details, timestamp
                    FROM system_logs
                    WHERE event_type = ?
                    ORDER BY timestamp DESC, log_id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(event_type)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT log_id, event_type, user, description, details, timestamp
                    FROM system_logs
                    ORDER BY timestamp DESC, log_id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|row| LogEntry {
                log_id: row.get("log_id"),
                event_type: row.get("event_type"),
                user: row.get("user"),
                description: row.get("description"),
                details: row.get("details"),
                timestamp: row.get("timestamp"),
            })
            .collect())
    }

    /// Total count, per-event-type counts, and daily counts for the last week.
    pub async fn stats(&self) -> Result<LogStats> {
        let (total_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM system_logs")
            .fetch_one(&self.pool)
            .await?;

        let event_rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT event_type, COUNT(log_id) AS count
            FROM system_logs
            GROUP BY event_type
            ORDER BY count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let daily_rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT date(timestamp) AS day, COUNT(log_id) AS count
            FROM system_logs
            GROUP BY day
            ORDER BY day DESC
            LIMIT 7
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(LogStats {
            total_count,
            event_counts: event_rows.into_iter().collect(),
            daily_counts: daily_rows.into_iter().collect(),
        })
    }
}
