// src/lib.rs

pub mod activity;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod ingest;
pub mod llm;
pub mod reports;
pub mod state;
