//! Task extraction: free-form text in, list of task strings out.

use serde::Deserialize;
use std::sync::Arc;

use super::parse::{self, ParseStrategy};
use super::{FailurePolicy, TaskError};
use crate::llm::{CompletionClient, CompletionOptions};

const EXTRACT_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.1,
    max_tokens: 50,
};

#[derive(Debug, Deserialize)]
struct ExtractedTasks {
    tasks: Vec<String>,
}

/// Asks the model to list the tasks mentioned in a piece of text.
pub struct TaskExtractor {
    client: Arc<dyn CompletionClient>,
    strategy: ParseStrategy,
    policy: FailurePolicy,
}

impl TaskExtractor {
    /// Extractor with the historical behaviour: fixed 4-character strip, fail closed.
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            strategy: ParseStrategy::FixedWrapper(4),
            policy: FailurePolicy::FailClosed,
        }
    }

    pub fn with_strategy(mut self, strategy: ParseStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the instruction sent to the model.
    pub fn prompt(text: &str) -> String {
        format!(
            "Сейчас я тебе скину текст. Тебе надо оттуда извлечь задачи.\n\
             Результат выведи в формате JSON одной строкой\n\
             Пример: {{\"tasks\": List[str]}}\
             Текст:\n{}",
            text
        )
    }

    /// Extract task strings from `text`.
    ///
    /// Every call is one independent upstream request. Under
    /// [`FailurePolicy::FailClosed`] upstream and parse errors propagate; under
    /// [`FailurePolicy::FailOpen`] the trimmed input becomes the single task.
    pub async fn extract_tasks(&self, text: &str) -> Result<Vec<String>, TaskError> {
        match self.try_extract(text).await {
            Ok(tasks) => {
                tracing::debug!("Extracted {} tasks", tasks.len());
                Ok(tasks)
            }
            Err(e) => match self.policy {
                FailurePolicy::FailClosed => {
                    tracing::error!("Task extraction failed: {}", e);
                    Err(e)
                }
                FailurePolicy::FailOpen => {
                    tracing::warn!("Task extraction failed, using input as a single task: {}", e);
                    Ok(vec![text.trim().to_string()])
                }
            },
        }
    }

    async fn try_extract(&self, text: &str) -> Result<Vec<String>, TaskError> {
        let reply = self
            .client
            .complete(&Self::prompt(text), EXTRACT_OPTIONS)
            .await?;
        let parsed: ExtractedTasks = parse::decode(&reply, self.strategy)?;
        Ok(parsed
            .tasks
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }
}
