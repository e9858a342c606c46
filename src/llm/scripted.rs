//! Canned-reply completion client.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::error::LlmError;
use super::{CompletionClient, CompletionOptions};

/// Replays a queue of replies (or errors) in order and records every prompt.
///
/// Once the queue is drained, the fallback reply is returned for every further
/// call. Without a fallback, a drained client answers with a network error.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<Result<String, LlmError>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client that gives the same reply to every call.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(Ok(reply.into())),
            ..Self::default()
        }
    }

    /// Client whose every call fails with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self {
            fallback: Some(Err(error)),
            ..Self::default()
        }
    }

    /// Queue a successful reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: LlmError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, item: Result<String, LlmError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(item);
        }
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, prompt: &str, _options: CompletionOptions) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match next.or_else(|| self.fallback.clone()) {
            Some(reply) => reply,
            None => Err(LlmError::network_error(
                "Scripted client has no reply left".to_string(),
            )),
        }
    }
}
