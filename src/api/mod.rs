// src/api/mod.rs
// API module with clean, organized structure

pub mod assistant;
pub mod auth;
pub mod error;
pub mod logs;
pub mod query;
pub mod reports;
pub mod router;
pub mod uploads;

// Re-export commonly used items for external convenience
pub use error::{ApiError, ApiResult};
pub use router::{api_router, app_router};
