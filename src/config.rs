// src/config.rs
// All values come from the environment (.env honored), loaded once at startup
// and passed into components explicitly.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neither APP_PASSWORD nor APP_PASSWORD_HASH is set")]
    MissingCredentialReference,
    #[error("APP_PASSWORD_HASH is not a hex-encoded SHA-256 digest")]
    MalformedPasswordHash,
}

#[derive(Debug, Clone)]
pub struct Config {
    // ── Login credentials
    pub app_username: String,
    pub app_password: Option<String>,
    pub app_password_hash: Option<String>,

    // ── Database
    pub database_url: String,
    pub db_max_connections: u32,

    // ── Gemini API
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_timeout_secs: u64,

    // ── Server
    pub host: String,
    pub port: u16,

    // ── Sessions
    pub session_ttl_secs: u64,

    // ── Uploads
    pub upload_dir: String,

    // ── Logging
    pub log_level: String,
}

/// Parse an environment variable, falling back to a default when the variable
/// is missing or unparseable. Values may carry trailing comments in .env files.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            app_username: env_var_or("APP_USERNAME", "admin".to_string()),
            app_password: env_var_opt("APP_PASSWORD"),
            app_password_hash: env_var_opt("APP_PASSWORD_HASH"),
            database_url: env_var_or("DATABASE_URL", "sqlite:./staffboard.db".to_string()),
            db_max_connections: env_var_or("STAFFBOARD_DB_MAX_CONNECTIONS", 10),
            gemini_api_key: env_var_opt("GEMINI_API_KEY"),
            gemini_model: env_var_or("STAFFBOARD_GEMINI_MODEL", "gemini-1.5-flash".to_string()),
            gemini_timeout_secs: env_var_or("STAFFBOARD_GEMINI_TIMEOUT", 60),
            host: env_var_or("STAFFBOARD_HOST", "127.0.0.1".to_string()),
            port: env_var_or("STAFFBOARD_PORT", 8501),
            session_ttl_secs: env_var_or("STAFFBOARD_SESSION_TTL_SECS", 1800),
            upload_dir: env_var_or("STAFFBOARD_UPLOAD_DIR", "./uploads".to_string()),
            log_level: env_var_or("STAFFBOARD_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_ttl_secs)
    }
}
