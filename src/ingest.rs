// src/ingest.rs
// CSV upload pipeline: dataset recognition by file name, row parsing and
// validation, inserts, and csv_upload_log / data_validation_errors rows.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};

use crate::activity::ActivityLogger;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file name does not match any known dataset: {0}")]
    UnrecognizedFile(String),
    #[error("CSV is empty or has no header row")]
    EmptyFile,
    #[error("unterminated quoted field at line {0}")]
    UnterminatedQuote(usize),
}

/// Datasets the dashboard accepts. A CSV belongs to a dataset when the
/// dataset name appears in its file name (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Department,
    Designation,
    Employee,
    Project,
    ProjectAllocation,
    Timesheet,
}

impl Dataset {
    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Department => "department",
            Dataset::Designation => "designation",
            Dataset::Employee => "employee",
            Dataset::Project => "project",
            Dataset::ProjectAllocation => "project_allocation",
            Dataset::Timesheet => "timesheet",
        }
    }

    /// Longest names first so project_allocation does not match as project.
    pub fn recognize(filename: &str) -> Option<Dataset> {
        let lower = filename.to_lowercase();
        [
            Dataset::ProjectAllocation,
            Dataset::Department,
            Dataset::Designation,
            Dataset::Timesheet,
            Dataset::Employee,
            Dataset::Project,
        ]
        .into_iter()
        .find(|d| lower.contains(d.name()))
    }

    fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Dataset::Department => &["department_id", "department_name"],
            Dataset::Designation => &["designation_id", "designation_name"],
            Dataset::Employee => &["employee_code", "employee_name"],
            Dataset::Project => &["project_id", "project_name"],
            Dataset::ProjectAllocation => &["employee_code", "project_id"],
            Dataset::Timesheet => &["employee_code", "work_date", "hours_worked"],
        }
    }

    fn numeric_fields(&self) -> &'static [&'static str] {
        match self {
            Dataset::Department => &["department_id"],
            Dataset::Designation => &["designation_id"],
            Dataset::Employee => &["total_experience", "department_id", "designation_id"],
            Dataset::Project => &[],
            Dataset::ProjectAllocation => &["allocation_percentage"],
            Dataset::Timesheet => &["hours_worked"],
        }
    }

    fn date_fields(&self) -> &'static [&'static str] {
        match self {
            Dataset::Project => &["start_date", "end_date"],
            Dataset::ProjectAllocation => &["effective_from", "effective_to"],
            Dataset::Timesheet => &["work_date"],
            _ => &[],
        }
    }
}

pub type CsvRow = HashMap<String, String>;

/// Minimal CSV reader: header row required, quoted fields with doubled quotes
/// supported, CR stripped.
pub fn parse_csv(text: &str) -> Result<(Vec<String>, Vec<CsvRow>), IngestError> {
    let mut lines = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        lines.push((idx + 1, split_csv_line(line, idx + 1)?));
    }

    let mut iter = lines.into_iter();
    let (_, header) = iter.next().ok_or(IngestError::EmptyFile)?;
    let header: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();

    let rows = iter
        .map(|(_, fields)| {
            header
                .iter()
                .cloned()
                .zip(fields.into_iter().chain(std::iter::repeat(String::new())))
                .collect()
        })
        .collect();

    Ok((header, rows))
}

fn split_csv_line(line: &str, line_no: usize) -> Result<Vec<String>, IngestError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            c => field.push(c),
        }
    }
    if in_quotes {
        return Err(IngestError::UnterminatedQuote(line_no));
    }
    fields.push(field);
    Ok(fields.into_iter().map(|f| f.trim().to_string()).collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub row_number: i64,
    pub field_name: String,
    pub field_value: String,
    pub error_message: String,
}

fn validate_row(dataset: Dataset, row_number: i64, row: &CsvRow) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let value = |field: &str| row.get(field).map(|v| v.as_str()).unwrap_or("");

    for field in dataset.required_fields() {
        if value(field).is_empty() {
            errors.push(ValidationError {
                row_number,
                field_name: field.to_string(),
                field_value: String::new(),
                error_message: "required field is missing or empty".to_string(),
            });
        }
    }
    for field in dataset.numeric_fields() {
        let v = value(field);
        if !v.is_empty() && v.parse::<f64>().is_err() {
            errors.push(ValidationError {
                row_number,
                field_name: field.to_string(),
                field_value: v.to_string(),
                error_message: "expected a numeric value".to_string(),
            });
        }
    }
    for field in dataset.date_fields() {
        let v = value(field);
        if !v.is_empty() && chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d").is_err() {
            errors.push(ValidationError {
                row_number,
                field_name: field.to_string(),
                field_value: v.to_string(),
                error_message: "expected a date in YYYY-MM-DD format".to_string(),
            });
        }
    }
    errors
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub upload_id: i64,
    pub file_name: String,
    pub file_type: Dataset,
    pub status: String,
    pub records_processed: i64,
    pub records_success: i64,
    pub records_failed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadLogEntry {
    pub upload_id: i64,
    pub file_type: String,
    pub file_name: Option<String>,
    pub upload_timestamp: String,
    pub status: String,
    pub records_processed: i64,
    pub records_success: i64,
    pub records_failed: i64,
}

#[derive(Clone)]
pub struct IngestService {
    pool: SqlitePool,
    activity: ActivityLogger,
}

impl IngestService {
    pub fn new(pool: SqlitePool, activity: ActivityLogger) -> Self {
        Self { pool, activity }
    }

    /// Process one uploaded CSV end to end: recognize, parse, validate row by
    /// row, insert valid rows, and record the upload plus its row errors.
    pub async fn process_file(
        &self,
        filename: &str,
        content: &str,
        user: Option<&str>,
    ) -> Result<UploadOutcome, IngestError> {
        let dataset = Dataset::recognize(filename)
            .ok_or_else(|| IngestError::UnrecognizedFile(filename.to_string()))?;

        let (_, rows) = parse_csv(content)?;

        let mut success: i64 = 0;
        let mut failed: i64 = 0;
        let mut row_errors: Vec<ValidationError> = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            let row_number = i as i64 + 2; // 1-based, after the header
            let errors = validate_row(dataset, row_number, row);
            if !errors.is_empty() {
                failed += 1;
                row_errors.extend(errors);
                continue;
            }
            match self.insert_row(dataset, row).await {
                Ok(()) => success += 1,
                Err(e) => {
                    failed += 1;
                    row_errors.push(ValidationError {
                        row_number,
                        field_name: String::new(),
                        field_value: String::new(),
                        error_message: format!("insert failed: {}", e),
                    });
                }
            }
        }

        let processed = rows.len() as i64;
        let status = if processed > 0 && success == 0 {
            "FAILED"
        } else if failed > 0 {
            "PARTIAL"
        } else {
            "SUCCESS"
        };

        let upload_id = self
            .record_upload(dataset, filename, status, processed, success, failed, &row_errors)
            .await
            .map_err(|e| {
                warn!("Failed to record upload log: {}", e);
                e
            })
            .unwrap_or(0);

        self.activity
            .log_file_upload(filename, dataset.name(), user, status)
            .await;
        self.activity
            .log_file_processing(filename, processed, success, failed, user)
            .await;

        info!(
            "Processed {}: {} rows ({} ok, {} failed)",
            filename, processed, success, failed
        );

        Ok(UploadOutcome {
            upload_id,
            file_name: filename.to_string(),
            file_type: dataset,
            status: status.to_string(),
            records_processed: processed,
            records_success: success,
            records_failed: failed,
        })
    }

    async fn insert_row(&self, dataset: Dataset, row: &CsvRow) -> Result<()> {
        let v = |field: &str| row.get(field).map(|v| v.as_str()).unwrap_or("");
        let opt = |field: &str| row.get(field).map(|v| v.as_str()).filter(|v| !v.is_empty());

        match dataset {
            Dataset::Department => {
                sqlx::query(
                    "INSERT OR REPLACE INTO department (department_id, department_name) VALUES (?, ?)",
                )
                .bind(v("department_id").parse::<i64>()?)
                .bind(v("department_name"))
                .execute(&self.pool)
                .await?;
            }
            Dataset::Designation => {
                sqlx::query(
                    "INSERT OR REPLACE INTO designation (designation_id, designation_name) VALUES (?, ?)",
                )
                .bind(v("designation_id").parse::<i64>()?)
                .bind(v("designation_name"))
                .execute(&self.pool)
                .await?;
            }
            Dataset::Employee => {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO employee
                        (employee_code, employee_name, employee_type, total_experience,
                         department_id, designation_id)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(v("employee_code"))
                .bind(v("employee_name"))
                .bind(opt("employee_type"))
                .bind(opt("total_experience").map(|x| x.parse::<f64>()).transpose()?)
                .bind(opt("department_id").map(|x| x.parse::<i64>()).transpose()?)
                .bind(opt("designation_id").map(|x| x.parse::<i64>()).transpose()?)
                .execute(&self.pool)
                .await?;
            }
            Dataset::Project => {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO project
                        (project_id, project_name, client_name, status, start_date, end_date)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(v("project_id"))
                .bind(v("project_name"))
                .bind(opt("client_name"))
                .bind(opt("status"))
                .bind(opt("start_date"))
                .bind(opt("end_date"))
                .execute(&self.pool)
                .await?;
            }
            Dataset::ProjectAllocation => {
                sqlx::query(
                    r#"
                    INSERT INTO project_allocation
                        (employee_code, project_id, allocation_percentage,
                         effective_from, effective_to, status, change_reason)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(v("employee_code"))
                .bind(v("project_id"))
                .bind(opt("allocation_percentage").map(|x| x.parse::<f64>()).transpose()?)
                .bind(opt("effective_from"))
                .bind(opt("effective_to"))
                .bind(opt("status"))
                .bind(opt("change_reason"))
                .execute(&self.pool)
                .await?;
            }
            Dataset::Timesheet => {
                sqlx::query(
                    r#"
                    INSERT INTO timesheet
                        (employee_code, project_id, work_date, hours_worked, task_description)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(v("employee_code"))
                .bind(opt("project_id"))
                .bind(v("work_date"))
                .bind(v("hours_worked").parse::<f64>()?)
                .bind(opt("task_description"))
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_upload(
        &self,
        dataset: Dataset,
        filename: &str,
        status: &str,
        processed: i64,
        success: i64,
        failed: i64,
        row_errors: &[ValidationError],
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO csv_upload_log
                (file_type, file_name, status, records_processed, records_success, records_failed)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(dataset.name())
        .bind(filename)
        .bind(status)
        .bind(processed)
        .bind(success)
        .bind(failed)
        .execute(&self.pool)
        .await?;
        let upload_id = result.last_insert_rowid();

        for error in row_errors {
            sqlx::query(
                r#"
                INSERT INTO data_validation_errors
                    (upload_id, row_number, field_name, field_value, error_message)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(upload_id)
            .bind(error.row_number)
            .bind(&error.field_name)
            .bind(&error.field_value)
            .bind(&error.error_message)
            .execute(&self.pool)
            .await?;
        }

        Ok(upload_id)
    }

    /// Latest uploads, newest first.
    pub async fn upload_history(&self, limit: i64) -> Result<Vec<UploadLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT upload_id, file_type, file_name, upload_timestamp, status,
                   records_processed, records_success, records_failed
            FROM csv_upload_log
            ORDER BY upload_timestamp DESC, upload_id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| UploadLogEntry {
                upload_id: row.get("upload_id"),
                file_type: row.get("file_type"),
                file_name: row.get("file_name"),
                upload_timestamp: row.get("upload_timestamp"),
                status: row.get("status"),
                records_processed: row.get("records_processed"),
                records_success: row.get("records_success"),
                records_failed: row.get("records_failed"),
            })
            .collect())
    }

    pub async fn validation_errors(&self, upload_id: i64) -> Result<Vec<ValidationError>> {
        let rows = sqlx::query(
            r#"
            SELECT row_number, field_name, field_value, error_message
            FROM data_validation_errors
            WHERE upload_id = ?
            ORDER BY row_number
            "#,
        )
        .bind(upload_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ValidationError {
                row_number: row.get::<Option<i64>, _>("row_number").unwrap_or(0),
                field_name: row.get::<Option<String>, _>("field_name").unwrap_or_default(),
                field_value: row.get::<Option<String>, _>("field_value").unwrap_or_default(),
                error_message: row.get("error_message"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn service(pool: SqlitePool) -> IngestService {
        IngestService::new(pool.clone(), ActivityLogger::new(pool))
    }

    #[test]
    fn recognize_matches_by_name_fragment() {
        assert_eq!(Dataset::recognize("Employee_2024.csv"), Some(Dataset::Employee));
        assert_eq!(
            Dataset::recognize("project_allocation_q3.csv"),
            Some(Dataset::ProjectAllocation)
        );
        assert_eq!(Dataset::recognize("PROJECT-list.csv"), Some(Dataset::Project));
        assert_eq!(Dataset::recognize("payroll.csv"), None);
    }

    #[test]
    fn parse_csv_handles_quotes_and_blank_lines() {
        let text = "a,b,c\n1,\"two, with comma\",3\n\n4,\"he said \"\"hi\"\"\",6\n";
        let (header, rows) = parse_csv(text).unwrap();
        assert_eq!(header, vec!["a", "b", "c"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["b"], "two, with comma");
        assert_eq!(rows[1]["b"], "he said \"hi\"");
    }

    #[test]
    fn parse_csv_rejects_empty_input() {
        assert!(matches!(parse_csv("\n\n"), Err(IngestError::EmptyFile)));
    }

    #[test]
    fn parse_csv_rejects_unterminated_quote() {
        let err = parse_csv("a,b\n1,\"oops\n").unwrap_err();
        assert!(matches!(err, IngestError::UnterminatedQuote(2)));
    }

    #[tokio::test]
    async fn process_file_inserts_valid_rows() {
        let pool = test_pool().await;
        let svc = service(pool.clone());

        let csv = "employee_code,employee_name,total_experience\nE001,Alice,5.5\nE002,Bob,3\n";
        let outcome = svc.process_file("employee_master.csv", csv, Some("admin")).await.unwrap();

        assert_eq!(outcome.status, "SUCCESS");
        assert_eq!(outcome.records_processed, 2);
        assert_eq!(outcome.records_success, 2);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM employee")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn invalid_rows_are_recorded_not_fatal() {
        let pool = test_pool().await;
        let svc = service(pool);

        let csv = "employee_code,employee_name,total_experience\n\
                   E001,Alice,5.5\n\
                   ,NoCode,2\n\
                   E003,Carol,not-a-number\n";
        let outcome = svc.process_file("employee.csv", csv, None).await.unwrap();

        assert_eq!(outcome.status, "PARTIAL");
        assert_eq!(outcome.records_success, 1);
        assert_eq!(outcome.records_failed, 2);

        let errors = svc.validation_errors(outcome.upload_id).await.unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field_name == "employee_code"));
        assert!(errors.iter().any(|e| e.field_name == "total_experience"));
    }

    #[tokio::test]
    async fn timesheet_dates_are_validated() {
        let pool = test_pool().await;
        let svc = service(pool);

        let csv = "employee_code,work_date,hours_worked\nE001,2024-13-40,8\n";
        let outcome = svc.process_file("timesheet_jan.csv", csv, None).await.unwrap();
        assert_eq!(outcome.status, "FAILED");
        assert_eq!(outcome.records_failed, 1);
    }

    #[tokio::test]
    async fn unrecognized_file_is_an_error() {
        let pool = test_pool().await;
        let svc = service(pool);
        let err = svc.process_file("mystery.csv", "a,b\n1,2\n", None).await.unwrap_err();
        assert!(matches!(err, IngestError::UnrecognizedFile(_)));
    }

    #[tokio::test]
    async fn upload_history_returns_latest_first() {
        let pool = test_pool().await;
        let svc = service(pool);
        svc.process_file("department.csv", "department_id,department_name\n1,Eng\n", None)
            .await
            .unwrap();
        svc.process_file("designation.csv", "designation_id,designation_name\n1,Dev\n", None)
            .await
            .unwrap();

        let history = svc.upload_history(5).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].file_type, "designation");
    }
}
