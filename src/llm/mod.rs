// src/llm/mod.rs
// Gemini client plus the two features built on it: the natural-language
// query assistant and the timesheet task summarizer.

pub mod assistant;
pub mod gemini;
pub mod summarizer;

pub use assistant::QueryAssistant;
pub use gemini::GeminiClient;
pub use summarizer::TaskSummarizer;
