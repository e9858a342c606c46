//! HTTP API for taskbreaker.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /tasks/split` - Extract tasks from text and store them
//! - `POST /tasks/decompose` - Split tasks into subtasks (not stored)
//! - `POST /tasks/done` - Mark a task completed, returns today's energy
//! - `GET /tasks` - List tasks, optionally for one `?date=YYYY-MM-DD`
//! - `GET /energy` - Number of tasks completed today

mod routes;
pub mod types;

pub use routes::{build_router, serve, AppState};
pub use types::*;
