// src/reports.rs
// Predefined parameterized reports, the read-only guard for custom SQL, and
// CSV export of result sets.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Column, Row, SqlitePool};
use thiserror::Error;

/// Hard cap on rows returned to the API for ad hoc queries.
pub const MAX_QUERY_ROWS: usize = 1000;

#[derive(Debug, Error)]
pub enum QueryGuardError {
    #[error("query is empty")]
    Empty,
    #[error("only SELECT (or WITH) queries are allowed")]
    NotReadOnly,
    #[error("multiple statements are not allowed")]
    MultipleStatements,
    #[error("query contains forbidden keyword: {0}")]
    ForbiddenKeyword(String),
}

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "replace",
    "truncate", "attach", "detach", "pragma", "vacuum", "reindex",
];

/// Reject anything that is not a single read-only statement. Both custom
/// queries and assistant-generated SQL pass through here before execution.
pub fn ensure_read_only(sql: &str) -> Result<(), QueryGuardError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return Err(QueryGuardError::Empty);
    }

    // Statement separators outside string literals mean multiple statements.
    let mut in_string = false;
    for c in trimmed.chars() {
        match c {
            '\'' => in_string = !in_string,
            ';' if !in_string => return Err(QueryGuardError::MultipleStatements),
            _ => {}
        }
    }

    let lower = trimmed.to_lowercase();
    let first_word = lower.split_whitespace().next().unwrap_or("");
    if first_word != "select" && first_word != "with" {
        return Err(QueryGuardError::NotReadOnly);
    }

    // Keyword scan over word tokens outside string literals.
    let mut in_string = false;
    let mut word = String::new();
    let mut check = |word: &mut String| -> Result<(), QueryGuardError> {
        if !word.is_empty() {
            let w = std::mem::take(word);
            if FORBIDDEN_KEYWORDS.contains(&w.as_str()) {
                return Err(QueryGuardError::ForbiddenKeyword(w));
            }
        }
        Ok(())
    };
    for c in lower.chars() {
        match c {
            '\'' => {
                check(&mut word)?;
                in_string = !in_string;
            }
            c if in_string => {
                let _ = c;
            }
            c if c.is_ascii_alphanumeric() || c == '_' => word.push(c),
            _ => check(&mut word)?,
        }
    }
    check(&mut word)?;

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub truncated: bool,
}

fn decode_value(row: &sqlx::sqlite::SqliteRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    Value::Null
}

/// Execute an already-guarded read-only query, returning column names and
/// JSON rows, capped at MAX_QUERY_ROWS. The cap is applied inside the
/// statement itself, so the database never hands back more than
/// MAX_QUERY_ROWS + 1 rows no matter what the query would produce.
pub async fn run_query(pool: &SqlitePool, sql: &str) -> Result<QueryResult> {
    let inner = sql.trim().trim_end_matches(';');
    // Newlines around the subquery keep a trailing line comment from eating
    // the wrapper.
    let capped = format!("SELECT * FROM (\n{}\n) LIMIT {}", inner, MAX_QUERY_ROWS + 1);
    let rows = sqlx::query(&capped).fetch_all(pool).await?;

    let columns: Vec<String> = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let truncated = rows.len() > MAX_QUERY_ROWS;
    let rows = rows
        .iter()
        .take(MAX_QUERY_ROWS)
        .map(|row| (0..row.columns().len()).map(|i| decode_value(row, i)).collect())
        .collect();

    Ok(QueryResult { columns, rows, truncated })
}

/// Render a result set as CSV with RFC-style quoting.
pub fn to_csv(result: &QueryResult) -> String {
    fn escape(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
    fn value_to_field(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    let mut out = String::new();
    out.push_str(
        &result
            .columns
            .iter()
            .map(|c| escape(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in &result.rows {
        out.push_str(
            &row.iter()
                .map(|v| escape(&value_to_field(v)))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

// ── Predefined reports ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectSummaryRow {
    pub project_id: String,
    pub project_name: String,
    pub client_name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectInfo {
    pub project_id: String,
    pub project_name: String,
    pub client_name: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AllocationRow {
    pub allocation_id: i64,
    pub employee_code: String,
    pub employee_name: String,
    pub employee_type: Option<String>,
    pub total_experience: Option<f64>,
    pub department_name: Option<String>,
    pub designation_name: Option<String>,
    pub allocation_percentage: Option<f64>,
    pub effective_from: Option<String>,
    pub effective_to: Option<String>,
    pub allocation_status: Option<String>,
    pub change_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimesheetRow {
    pub employee_code: String,
    pub employee_name: String,
    pub work_date: String,
    pub hours_worked: f64,
    pub task_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyHours {
    pub employee_code: String,
    pub week_start: String,
    pub total_hours: f64,
    pub days_worked: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub total_members: i64,
    pub current_members: i64,
    pub avg_active_allocation: f64,
    pub total_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectMasterReport {
    pub info: ProjectInfo,
    pub allocations: Vec<AllocationRow>,
    pub weekly_hours: Vec<WeeklyHours>,
    pub stats: ProjectStats,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmployeeMasterRow {
    pub employee_code: String,
    pub employee_name: String,
    pub employee_type: Option<String>,
    pub total_experience: Option<f64>,
    pub department_name: Option<String>,
    pub designation_name: Option<String>,
    pub total_projects: i64,
    pub total_hours: Option<f64>,
    pub total_entries: i64,
    pub first_entry: Option<String>,
    pub last_entry: Option<String>,
}

#[derive(Clone)]
pub struct ReportService {
    pool: SqlitePool,
}

impl ReportService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectSummaryRow>> {
        let rows = sqlx::query_as::<_, ProjectSummaryRow>(
            "SELECT project_id, project_name, client_name, status FROM project ORDER BY project_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn project_info(&self, project_id: &str) -> Result<Option<ProjectInfo>> {
        let info = sqlx::query_as::<_, ProjectInfo>(
            r#"
            SELECT project_id, project_name, client_name, status, start_date, end_date
            FROM project
            WHERE project_id = ?
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(info)
    }

    pub async fn allocation_history(&self, project_id: &str) -> Result<Vec<AllocationRow>> {
        let rows = sqlx::query_as::<_, AllocationRow>(
            r#"
            SELECT
                pa.allocation_id,
                pa.employee_code,
                e.employee_name,
                e.employee_type,
                e.total_experience,
                d.department_name,
                des.designation_name,
                pa.allocation_percentage,
                pa.effective_from,
                pa.effective_to,
                pa.status AS allocation_status,
                pa.change_reason
            FROM project_allocation pa
            JOIN employee e ON pa.employee_code = e.employee_code
            LEFT JOIN department d ON e.department_id = d.department_id
            LEFT JOIN designation des ON e.designation_id = des.designation_id
            WHERE pa.project_id = ?
            ORDER BY e.employee_name, pa.effective_from DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn project_hours(
        &self,
        project_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimesheetRow>> {
        let rows = sqlx::query_as::<_, TimesheetRow>(
            r#"
            SELECT t.employee_code, e.employee_name, t.work_date, t.hours_worked,
                   t.task_description
            FROM timesheet t
            JOIN employee e ON t.employee_code = e.employee_code
            WHERE t.project_id = ? AND t.work_date BETWEEN ? AND ?
            ORDER BY t.employee_code, t.work_date
            "#,
        )
        .bind(project_id)
        .bind(from.format("%Y-%m-%d").to_string())
        .bind(to.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full project master report for a date window.
    pub async fn project_master(
        &self,
        project_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<ProjectMasterReport>> {
        let Some(info) = self.project_info(project_id).await? else {
            return Ok(None);
        };
        let allocations = self.allocation_history(project_id).await?;
        let hours = self.project_hours(project_id, from, to).await?;

        let weekly_hours = aggregate_weekly_hours(&hours);
        let stats = project_stats(&allocations, &hours);

        Ok(Some(ProjectMasterReport {
            info,
            allocations,
            weekly_hours,
            stats,
        }))
    }

    pub async fn list_employees(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT e.employee_code, e.employee_name
            FROM employee e
            INNER JOIN timesheet t ON e.employee_code = t.employee_code
            ORDER BY e.employee_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn employee_master(&self, employee_code: &str) -> Result<Option<EmployeeMasterRow>> {
        let row = sqlx::query_as::<_, EmployeeMasterRow>(
            r#"
            SELECT
                e.employee_code,
                e.employee_name,
                e.employee_type,
                e.total_experience,
                d.department_name,
                des.designation_name,
                COUNT(DISTINCT t.project_id) AS total_projects,
                SUM(t.hours_worked) AS total_hours,
                COUNT(t.timesheet_id) AS total_entries,
                MIN(t.work_date) AS first_entry,
                MAX(t.work_date) AS last_entry
            FROM employee e
            LEFT JOIN timesheet t ON e.employee_code = t.employee_code
            LEFT JOIN department d ON e.department_id = d.department_id
            LEFT JOIN designation des ON e.designation_id = des.designation_id
            WHERE e.employee_code = ?
            GROUP BY e.employee_code, e.employee_name, d.department_name, des.designation_name
            "#,
        )
        .bind(employee_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

/// Group timesheet rows into Monday-anchored weeks per employee.
fn aggregate_weekly_hours(rows: &[TimesheetRow]) -> Vec<WeeklyHours> {
    use std::collections::BTreeMap;

    let mut buckets: BTreeMap<(String, NaiveDate), (f64, i64)> = BTreeMap::new();
    for row in rows {
        let Ok(date) = NaiveDate::parse_from_str(&row.work_date, "%Y-%m-%d") else {
            continue;
        };
        let week_start = date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64);
        let entry = buckets
            .entry((row.employee_code.clone(), week_start))
            .or_insert((0.0, 0));
        entry.0 += row.hours_worked;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|((employee_code, week_start), (total_hours, days_worked))| WeeklyHours {
            employee_code,
            week_start: week_start.format("%Y-%m-%d").to_string(),
            total_hours,
            days_worked,
        })
        .collect()
}

fn project_stats(allocations: &[AllocationRow], hours: &[TimesheetRow]) -> ProjectStats {
    use std::collections::HashSet;

    let total_members: HashSet<&str> =
        allocations.iter().map(|a| a.employee_code.as_str()).collect();

    let current: Vec<&AllocationRow> = allocations
        .iter()
        .filter(|a| {
            a.allocation_status.as_deref() == Some("Active") && a.effective_to.is_none()
        })
        .collect();
    let current_members: HashSet<&str> =
        current.iter().map(|a| a.employee_code.as_str()).collect();

    let active_allocs: Vec<f64> = current
        .iter()
        .filter_map(|a| a.allocation_percentage)
        .collect();
    let avg_active_allocation = if active_allocs.is_empty() {
        0.0
    } else {
        active_allocs.iter().sum::<f64>() / active_allocs.len() as f64
    };

    ProjectStats {
        total_members: total_members.len() as i64,
        current_members: current_members.len() as i64,
        avg_active_allocation,
        total_hours: hours.iter().map(|h| h.hours_worked).sum(),
    }
}
