//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::task::SubtaskMap;

/// Liveness response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub health: String,
}

/// Request to extract tasks from free-form text.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitTextRequest {
    /// Text the tasks are pulled from
    pub text: String,
}

/// Extracted (and stored) task strings.
#[derive(Debug, Clone, Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<String>,
}

/// Request to mark a task completed.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkDoneRequest {
    pub id: i64,
}

/// Number of tasks completed today.
#[derive(Debug, Clone, Serialize)]
pub struct EnergyResponse {
    pub energy: i64,
}

/// Request to break tasks into subtasks.
#[derive(Debug, Clone, Deserialize)]
pub struct DecomposeRequest {
    pub tasks: Vec<String>,
}

/// Subtasks keyed by original task, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct DecomposeResponse {
    pub subtasks: SubtaskMap,
}

/// Query parameters for listing tasks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksQuery {
    /// Restrict to one day (`YYYY-MM-DD`)
    pub date: Option<String>,
}
