//! # taskbreaker
//!
//! Backend that turns free-form text into a to-do list with the help of a
//! hosted language model.
//!
//! This library provides:
//! - An HTTP API to extract, list, complete and decompose tasks
//! - A YandexGPT completion client behind a small trait
//! - SQLite (or in-memory) task storage
//!
//! ## Request Flow
//! 1. Receive text via `POST /tasks/split`
//! 2. Ask the model for `{"tasks": [...]}` and cut the JSON out of its reply
//! 3. Store one row per task, dated today
//! 4. Return the extracted tasks
//!
//! ## Modules
//! - `api`: axum router and handlers
//! - `config`: environment-driven configuration
//! - `llm`: completion client
//! - `store`: task persistence
//! - `task`: extraction and decomposition services

pub mod api;
pub mod config;
pub mod llm;
pub mod store;
pub mod task;

pub use config::Config;
pub use store::{Task, TaskStore};
