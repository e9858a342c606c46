//! Task decomposition: one task in, two finer-grained subtasks out.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use std::sync::Arc;

use super::parse::{self, ParseError, ParseStrategy};
use super::{FailurePolicy, TaskError};
use crate::llm::{CompletionClient, CompletionOptions};

const SPLIT_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.1,
    max_tokens: 100,
};

#[derive(Debug, Deserialize)]
struct SplitReply {
    subtasks: Vec<String>,
}

/// Original task -> its subtasks, in the order the tasks were given.
///
/// Inserting an existing key replaces its subtasks but keeps its position.
/// Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtaskMap {
    entries: Vec<(String, Vec<String>)>,
}

impl SubtaskMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: String, subtasks: Vec<String>) {
        match self.entries.iter_mut().find(|(t, _)| *t == task) {
            Some(entry) => entry.1 = subtasks,
            None => self.entries.push((task, subtasks)),
        }
    }

    pub fn get(&self, task: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(t, _)| t == task)
            .map(|(_, s)| s.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(t, s)| (t.as_str(), s.as_slice()))
    }
}

impl Serialize for SubtaskMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (task, subtasks) in &self.entries {
            map.serialize_entry(task, subtasks)?;
        }
        map.end()
    }
}

/// Asks the model to break a task into two smaller ones.
pub struct TaskSplitter {
    client: Arc<dyn CompletionClient>,
    strategy: ParseStrategy,
    policy: FailurePolicy,
}

impl TaskSplitter {
    /// Splitter with the historical behaviour: brace scanning, fail open.
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            strategy: ParseStrategy::BraceScan,
            policy: FailurePolicy::FailOpen,
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

    pub fn prompt(task: &str) -> String {
        format!(
            "Разбей следующую задачу на 2 более мелкие и конкретные подзадачи. \
             Ответ предоставь в формате JSON: {{\"subtasks\": [\"подзадача1\", \"подзадача2\"]}}\n\
             Задача: {}",
            task
        )
    }

    /// Split one task.
    ///
    /// Under [`FailurePolicy::FailOpen`] this never errors: any failure yields
    /// `[task]`.
    pub async fn split_task(&self, task: &str) -> Result<Vec<String>, TaskError> {
        match self.try_split(task).await {
            Ok(subtasks) => Ok(subtasks),
            Err(e) => match self.policy {
                FailurePolicy::FailOpen => {
                    tracing::warn!("Failed to split task '{}', keeping it whole: {}", task, e);
                    Ok(vec![task.to_string()])
                }
                FailurePolicy::FailClosed => {
                    tracing::error!("Failed to split task '{}': {}", task, e);
                    Err(e)
                }
            },
        }
    }

    /// Split every task, one upstream call per task, in input order.
    pub async fn split_all_tasks(&self, tasks: &[String]) -> Result<SubtaskMap, TaskError> {
        let mut result = SubtaskMap::new();
        for task in tasks {
            let subtasks = self.split_task(task).await?;
            result.insert(task.clone(), subtasks);
        }
        Ok(result)
    }

    async fn try_split(&self, task: &str) -> Result<Vec<String>, TaskError> {
        let reply = self
            .client
            .complete(&Self::prompt(task), SPLIT_OPTIONS)
            .await?;
        let parsed: SplitReply = parse::decode(&reply, self.strategy)?;
        if parsed.subtasks.is_empty() {
            return Err(ParseError::EmptyList("subtasks").into());
        }
        Ok(parsed.subtasks)
    }
}
