// src/db.rs
// Connection pool and schema for the dashboard tables.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Create the SQLite connection pool, creating the database file on first run.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| anyhow::anyhow!("Invalid DATABASE_URL: {}", e))?
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))
}

/// Create every dashboard table that does not exist yet. Schema is applied
/// idempotently at boot rather than through migration files.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS department (
            department_id   INTEGER PRIMARY KEY,
            department_name TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS designation (
            designation_id   INTEGER PRIMARY KEY,
            designation_name TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS employee (
            employee_code    TEXT PRIMARY KEY,
            employee_name    TEXT NOT NULL,
            employee_type    TEXT,
            total_experience REAL,
            department_id    INTEGER REFERENCES department(department_id),
            designation_id   INTEGER REFERENCES designation(designation_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS project (
            project_id   TEXT PRIMARY KEY,
            project_name TEXT NOT NULL,
            client_name  TEXT,
            status       TEXT,
            start_date   TEXT,
            end_date     TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS project_allocation (
            allocation_id         INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_code         TEXT NOT NULL REFERENCES employee(employee_code),
            project_id            TEXT NOT NULL REFERENCES project(project_id),
            allocation_percentage REAL,
            effective_from        TEXT,
            effective_to          TEXT,
            status                TEXT,
            change_reason         TEXT,
            created_at            TEXT DEFAULT (datetime('now'))
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS timesheet (
            timesheet_id     INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_code    TEXT NOT NULL REFERENCES employee(employee_code),
            project_id       TEXT REFERENCES project(project_id),
            work_date        TEXT NOT NULL,
            hours_worked     REAL NOT NULL,
            task_description TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS csv_upload_log (
            upload_id         INTEGER PRIMARY KEY AUTOINCREMENT,
            file_type         TEXT NOT NULL,
            file_name         TEXT,
            upload_timestamp  TEXT NOT NULL DEFAULT (datetime('now')),
            status            TEXT NOT NULL,
            records_processed INTEGER NOT NULL DEFAULT 0,
            records_success   INTEGER NOT NULL DEFAULT 0,
            records_failed    INTEGER NOT NULL DEFAULT 0
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS data_validation_errors (
            error_id      INTEGER PRIMARY KEY AUTOINCREMENT,
            upload_id     INTEGER NOT NULL REFERENCES csv_upload_log(upload_id),
            row_number    INTEGER,
            field_name    TEXT,
            field_value   TEXT,
            error_message TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS system_logs (
            log_id      INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type  TEXT NOT NULL,
            user        TEXT,
            description TEXT NOT NULL,
            details     TEXT,
            timestamp   TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_system_logs_event_type ON system_logs(event_type)",
        "CREATE INDEX IF NOT EXISTS idx_system_logs_timestamp ON system_logs(timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_timesheet_employee ON timesheet(employee_code)",
        "CREATE INDEX IF NOT EXISTS idx_allocation_project ON project_allocation(project_id)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema initialized");
    Ok(())
}

/// User table names, ordered, excluding sqlite internals. Feeds the
/// assistant prompt.
pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT name FROM sqlite_master
        WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Schema DDL for the assistant prompt.
pub async fn schema_ddl(pool: &SqlitePool) -> Result<String> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT sql FROM sqlite_master
        WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(sql,)| sql)
        .collect::<Vec<_>>()
        .join(";\n"))
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    // A single connection keeps the in-memory database shared across queries.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}
