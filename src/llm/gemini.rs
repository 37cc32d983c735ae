// src/llm/gemini.rs
// Thin client for Gemini's generateContent API.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    default_model: String,
    timeout: Duration,
    base_url: String,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    parts: Option<Vec<GeminiPartResponse>>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

impl GeminiClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            default_model: config.gemini_model.clone(),
            timeout: Duration::from_secs(config.gemini_timeout_secs),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint. Used by tests.
    #[doc(hidden)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// One-shot text generation. `model` falls back to the configured default.
    pub async fn generate(
        &self,
        model: Option<&str>,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String> {
        let model = model.unwrap_or(&self.default_model);
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let api_request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiTextPart {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: system.map(|s| GeminiSystemInstruction {
                parts: vec![GeminiTextPart { text: s.to_string() }],
            }),
        };

        debug!("Gemini request: model={}, prompt_len={}", model, prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&api_request)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error: {} - {}", status, body);
        }

        let api_response: GeminiResponse = response.json().await?;

        if let Some(error) = api_response.error {
            anyhow::bail!("Gemini error: {}", error.message);
        }

        let mut text = String::new();
        if let Some(candidates) = api_response.candidates {
            if let Some(candidate) = candidates.into_iter().next() {
                for part in candidate.content.parts.unwrap_or_default() {
                    if let Some(t) = part.text {
                        text.push_str(&t);
                    }
                }
            }
        }

        if text.is_empty() {
            anyhow::bail!("Gemini returned an empty response");
        }

        Ok(text.trim().to_string())
    }
}
