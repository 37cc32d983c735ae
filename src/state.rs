// src/state.rs

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::warn;

use crate::activity::ActivityLogger;
use crate::auth::{CredentialReference, SessionRegistry};
use crate::config::Config;
use crate::ingest::IngestService;
use crate::llm::{GeminiClient, QueryAssistant, TaskSummarizer};
use crate::reports::ReportService;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: SqlitePool,

    // -------- Auth --------
    pub credentials: CredentialReference,
    pub sessions: Arc<SessionRegistry>,

    // -------- Services --------
    pub activity: ActivityLogger,
    pub ingest: IngestService,
    pub reports: ReportService,

    // -------- AI (present only when GEMINI_API_KEY is set) --------
    pub assistant: Option<QueryAssistant>,
    pub summarizer: Option<TaskSummarizer>,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool) -> Result<Self> {
        let credentials = CredentialReference::from_config(&config)?;
        let sessions = Arc::new(SessionRegistry::new(config.session_ttl()));

        let activity = ActivityLogger::new(pool.clone());
        let ingest = IngestService::new(pool.clone(), activity.clone());
        let reports = ReportService::new(pool.clone());

        let (assistant, summarizer) = match GeminiClient::from_config(&config) {
            Ok(gemini) => (
                Some(QueryAssistant::new(
                    gemini.clone(),
                    pool.clone(),
                    activity.clone(),
                )),
                Some(TaskSummarizer::new(gemini, pool.clone())),
            ),
            Err(_) => {
                warn!("GEMINI_API_KEY not set, AI assistant endpoints disabled");
                (None, None)
            }
        };

        Ok(Self {
            config,
            pool,
            credentials,
            sessions,
            activity,
            ingest,
            reports,
            assistant,
            summarizer,
        })
    }
}
