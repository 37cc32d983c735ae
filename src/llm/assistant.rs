// src/llm/assistant.rs
// Natural-language query assistant: schema-aware prompt, SQL extraction from
// the reply, guarded execution.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::activity::ActivityLogger;
use crate::db;
use crate::reports::{ensure_read_only, run_query, QueryResult};

use super::GeminiClient;

#[derive(Debug, Clone, Serialize)]
pub struct AssistantAnswer {
    pub question: String,
    pub sql: String,
    pub result: QueryResult,
}

#[derive(Clone)]
pub struct QueryAssistant {
    gemini: GeminiClient,
    pool: SqlitePool,
    activity: ActivityLogger,
}

impl QueryAssistant {
    pub fn new(gemini: GeminiClient, pool: SqlitePool, activity: ActivityLogger) -> Self {
        Self { gemini, pool, activity }
    }

    /// Turn a natural-language question into SQL, run it through the
    /// read-only guard, and execute it.
    pub async fn answer(&self, question: &str, user: Option<&str>) -> Result<AssistantAnswer> {
        let tables = db::list_tables(&self.pool).await?;
        let ddl = db::schema_ddl(&self.pool).await?;
        let prompt = build_sql_prompt(&tables, &ddl, question);

        let reply = self.gemini.generate(None, None, &prompt).await?;
        let sql = extract_sql(&reply);

        if let Err(e) = ensure_read_only(&sql) {
            self.activity
                .log_ai_query(question, &sql, user, "REJECTED")
                .await;
            return Err(e.into());
        }

        let result = match run_query(&self.pool, &sql).await {
            Ok(result) => result,
            Err(e) => {
                self.activity
                    .log_ai_query(question, &sql, user, "FAILED")
                    .await;
                return Err(e);
            }
        };

        self.activity
            .log_ai_query(question, &sql, user, "SUCCESS")
            .await;
        info!("AI query answered: {} rows", result.rows.len());

        Ok(AssistantAnswer {
            question: question.to_string(),
            sql,
            result,
        })
    }
}

fn build_sql_prompt(tables: &[String], ddl: &str, question: &str) -> String {
    format!(
        "You are a SQL assistant for an employee reports database (SQLite).\n\
         Available tables: {}\n\n\
         Schema:\n{}\n\n\
         Write a single read-only SELECT query answering the question below.\n\
         Return only the SQL, in a ```sql code block, with no explanation.\n\n\
         Question: {}",
        tables.join(", "),
        ddl,
        question
    )
}

/// Pull the SQL out of a model reply: prefer a ```sql fenced block, fall back
/// to any fenced block, else treat the whole reply as the statement.
pub fn extract_sql(reply: &str) -> String {
    let fenced = reply
        .split("```")
        .nth(1)
        .map(|block| block.strip_prefix("sql").unwrap_or(block))
        .map(str::trim);

    match fenced {
        Some(block) if !block.is_empty() => block.to_string(),
        _ => reply.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_sql_prefers_sql_fence() {
        let reply = "Here you go:\n```sql\nSELECT * FROM employee;\n```\nEnjoy.";
        assert_eq!(extract_sql(reply), "SELECT * FROM employee;");
    }

    #[test]
    fn extract_sql_accepts_plain_fence() {
        let reply = "```\nSELECT 1\n```";
        assert_eq!(extract_sql(reply), "SELECT 1");
    }

    #[test]
    fn extract_sql_falls_back_to_whole_reply() {
        assert_eq!(extract_sql("  SELECT 2  "), "SELECT 2");
    }

    #[test]
    fn prompt_names_tables_and_question() {
        let prompt = build_sql_prompt(
            &["employee".to_string(), "timesheet".to_string()],
            "CREATE TABLE employee (...)",
            "who worked most hours?",
        );
        assert!(prompt.contains("employee, timesheet"));
        assert!(prompt.contains("who worked most hours?"));
    }
}
