//! Task module - turns free-form text into tasks and tasks into subtasks.
//!
//! Both services are thin orchestration over a [`CompletionClient`]:
//! - build a fixed instruction around the caller's text
//! - send it to the model
//! - pull a JSON object out of the reply
//!
//! They differ in what happens when that goes wrong, which is controlled by
//! [`FailurePolicy`]. Extraction fails closed by default so a broken reply is
//! visible to the caller; decomposition fails open so one bad task does not
//! abort a batch.
//!
//! [`CompletionClient`]: crate::llm::CompletionClient

mod extract;
pub mod parse;
mod subtask;

pub use extract::TaskExtractor;
pub use parse::{ParseError, ParseStrategy};
pub use subtask::{SubtaskMap, TaskSplitter};

use std::str::FromStr;
use thiserror::Error;

use crate::llm::LlmError;

/// What a service does when the model call or reply parsing fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Propagate the error to the caller.
    FailClosed,
    /// Log the error and fall back to the caller's own input.
    FailOpen,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_closed" | "closed" => Ok(FailurePolicy::FailClosed),
            "fail_open" | "open" => Ok(FailurePolicy::FailOpen),
            other => Err(format!(
                "unknown failure policy '{}', expected fail_closed or fail_open",
                other
            )),
        }
    }
}

/// Errors surfaced by the task services.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("completion request failed: {0}")]
    Upstream(#[from] LlmError),

    #[error("malformed model reply: {0}")]
    Malformed(#[from] ParseError),
}
