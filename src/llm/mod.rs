//! Completion client module for talking to the language model.
//!
//! The services only need "prompt in, text out", so the abstraction is a single
//! trait method. YandexGPT is the production implementation; `ScriptedClient`
//! (tests and the `test-util` feature only) replays canned replies.

mod error;
#[cfg(any(test, feature = "test-util"))]
mod scripted;
mod yandex;

pub use error::{classify_http_status, LlmError, LlmErrorKind};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedClient;
pub use yandex::YandexGptClient;

use async_trait::async_trait;

/// Sampling parameters for a single completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// Sampling temperature (0 = deterministic).
    pub temperature: f64,
    /// Maximum output tokens to generate.
    pub max_tokens: u64,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 50,
        }
    }
}

/// Trait for completion clients.
///
/// Implementations are thin transports: they must return the reply text as-is
/// (trimmed) and never interpret it.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as a single user message and return the model's reply.
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String, LlmError>;
}
