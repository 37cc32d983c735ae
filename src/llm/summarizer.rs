// src/llm/summarizer.rs
// Per-employee task summarizer: timesheet rows grouped by project, one
// Gemini summary per project.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::reports::{EmployeeMasterRow, ReportService};

use super::GeminiClient;

#[derive(Debug, Clone, Serialize)]
pub struct TaskEntry {
    pub description: String,
    pub hours: f64,
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectTasks {
    pub project_id: String,
    pub project_name: Option<String>,
    pub client_name: Option<String>,
    pub total_hours: f64,
    pub tasks: Vec<TaskEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub project_name: Option<String>,
    pub client_name: Option<String>,
    pub total_hours: f64,
    pub task_count: usize,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeTaskSummary {
    pub employee: EmployeeMasterRow,
    pub model: String,
    pub generated_at: String,
    pub projects: Vec<ProjectSummary>,
}

#[derive(Clone)]
pub struct TaskSummarizer {
    gemini: GeminiClient,
    pool: SqlitePool,
    reports: ReportService,
}

impl TaskSummarizer {
    pub fn new(gemini: GeminiClient, pool: SqlitePool) -> Self {
        let reports = ReportService::new(pool.clone());
        Self { gemini, pool, reports }
    }

    /// Timesheet entries with a task description, grouped by project.
    pub async fn project_tasks(&self, employee_code: &str) -> Result<Vec<ProjectTasks>> {
        let rows = sqlx::query(
            r#"
            SELECT t.project_id, p.project_name, p.client_name,
                   t.task_description, t.hours_worked, t.work_date
            FROM timesheet t
            LEFT JOIN project p ON t.project_id = p.project_id
            WHERE t.employee_code = ?
                AND t.task_description IS NOT NULL
                AND t.task_description != ''
            ORDER BY t.project_id, t.work_date DESC
            "#,
        )
        .bind(employee_code)
        .fetch_all(&self.pool)
        .await?;

        let mut projects: BTreeMap<String, ProjectTasks> = BTreeMap::new();
        for row in rows {
            let project_id: Option<String> = row.get("project_id");
            let project_id = project_id.unwrap_or_else(|| "unassigned".to_string());
            let hours: f64 = row.get("hours_worked");

            let entry = projects.entry(project_id.clone()).or_insert_with(|| ProjectTasks {
                project_id,
                project_name: row.get("project_name"),
                client_name: row.get("client_name"),
                total_hours: 0.0,
                tasks: Vec::new(),
            });
            entry.total_hours += hours;
            entry.tasks.push(TaskEntry {
                description: row.get("task_description"),
                hours,
                date: row.get("work_date"),
            });
        }

        Ok(projects.into_values().collect())
    }

    /// Summarize every project an employee logged described work against.
    /// Returns None when the employee does not exist.
    pub async fn summarize(
        &self,
        employee_code: &str,
        model: Option<&str>,
    ) -> Result<Option<EmployeeTaskSummary>> {
        let Some(employee) = self.reports.employee_master(employee_code).await? else {
            return Ok(None);
        };

        let model = model.unwrap_or(self.gemini.default_model()).to_string();
        let mut summaries = Vec::new();

        for project in self.project_tasks(employee_code).await? {
            let prompt = build_summary_prompt(&project);
            let summary = self.gemini.generate(Some(&model), None, &prompt).await?;
            summaries.push(ProjectSummary {
                project_id: project.project_id,
                project_name: project.project_name,
                client_name: project.client_name,
                total_hours: project.total_hours,
                task_count: project.tasks.len(),
                summary,
            });
        }

        info!(
            "Summarized {} projects for {}",
            summaries.len(),
            employee_code
        );

        Ok(Some(EmployeeTaskSummary {
            employee,
            model,
            generated_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            projects: summaries,
        }))
    }
}

fn build_summary_prompt(project: &ProjectTasks) -> String {
    let tasks_text = project
        .tasks
        .iter()
        .map(|t| format!("- {} ({} hours on {})", t.description, t.hours, t.date))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Summarize the following tasks for a project. Provide a concise summary that highlights:\n\
         1. Main activities and work areas\n\
         2. Key deliverables or outcomes\n\
         3. Types of work performed\n\
         4. Overall contribution to the project\n\n\
         Project: {}\n\
         Client: {}\n\
         Total Hours: {}\n\n\
         Tasks:\n{}\n\n\
         Provide a clear, professional summary in 1 paragraph:",
        project.project_name.as_deref().unwrap_or("Unknown Project"),
        project.client_name.as_deref().unwrap_or("Unknown Client"),
        project.total_hours,
        tasks_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> ProjectTasks {
        ProjectTasks {
            project_id: "P01".to_string(),
            project_name: Some("Apollo".to_string()),
            client_name: Some("Acme".to_string()),
            total_hours: 15.5,
            tasks: vec![
                TaskEntry {
                    description: "Design review".to_string(),
                    hours: 8.0,
                    date: "2024-01-02".to_string(),
                },
                TaskEntry {
                    description: "API sketches".to_string(),
                    hours: 7.5,
                    date: "2024-01-01".to_string(),
                },
            ],
        }
    }

    #[test]
    fn summary_prompt_lists_tasks_and_totals() {
        let prompt = build_summary_prompt(&sample_project());
        assert!(prompt.contains("Project: Apollo"));
        assert!(prompt.contains("Client: Acme"));
        assert!(prompt.contains("Total Hours: 15.5"));
        assert!(prompt.contains("- Design review (8 hours on 2024-01-02)"));
    }

    #[test]
    fn summary_prompt_handles_unknown_project() {
        let mut project = sample_project();
        project.project_name = None;
        project.client_name = None;
        let prompt = build_summary_prompt(&project);
        assert!(prompt.contains("Project: Unknown Project"));
        assert!(prompt.contains("Client: Unknown Client"));
    }
}
