//! Completion provider trait for generating answers from a prompt.

use async_trait::async_trait;

use crate::error::Result;

/// A single-turn text generator.
///
/// Given a fully assembled prompt, returns the model's answer. There is no
/// conversation state: every call is independent.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A short name used in errors and logs.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
