//! Deterministic providers for tests and demos that run without API keys.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::completion::CompletionProvider;
use crate::document::{Document, Embedding};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::source::DocumentSource;

const DEFAULT_DIMENSIONS: usize = 64;

/// A bag-of-words embedder that hashes lowercase tokens into buckets.
///
/// Identical texts get identical vectors and texts sharing words land close to
/// each other, which is enough for retrieval tests. Vectors are L2-normalized;
/// text with no alphanumeric tokens maps to the zero vector.
#[derive(Debug)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
    delay: Option<Duration>,
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            delay: None,
            single_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` before every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `embed_one` calls so far.
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::Relaxed)
    }

    /// Number of `embed_batch` calls so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }

    /// The vector for `text`, computed without any delay or bookkeeping.
    pub fn vector_for(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let bucket = fnv1a(&token.to_lowercase()) as usize % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &str {
        "HashEmbedding"
    }

    async fn embed_one(&self, text: &str) -> Result<Embedding> {
        self.single_calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Returns the same answer to every prompt and remembers the prompts it saw.
#[derive(Debug)]
pub struct StaticCompletionProvider {
    answer: String,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl StaticCompletionProvider {
    pub fn new(answer: impl Into<String>) -> Self {
        Self { answer: answer.into(), delay: None, prompts: Mutex::new(Vec::new()) }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for StaticCompletionProvider {
    fn name(&self) -> &str {
        "Static"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.answer.clone())
    }
}

/// An embedder whose every call fails with [`RagError::Embedding`].
#[derive(Debug, Clone)]
pub struct FailingEmbeddingProvider {
    message: String,
    dimensions: usize,
}

impl FailingEmbeddingProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), dimensions: DEFAULT_DIMENSIONS }
    }

    fn error(&self) -> RagError {
        RagError::Embedding { provider: "Failing".to_string(), message: self.message.clone() }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbeddingProvider {
    fn name(&self) -> &str {
        "Failing"
    }

    async fn embed_one(&self, _text: &str) -> Result<Embedding> {
        Err(self.error())
    }

    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Embedding>> {
        Err(self.error())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A completion provider whose every call fails with [`RagError::Completion`].
#[derive(Debug, Clone)]
pub struct FailingCompletionProvider {
    message: String,
}

impl FailingCompletionProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[async_trait]
impl CompletionProvider for FailingCompletionProvider {
    fn name(&self) -> &str {
        "Failing"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(RagError::Completion { provider: "Failing".to_string(), message: self.message.clone() })
    }
}

/// A source that can never be loaded.
#[derive(Debug, Clone)]
pub struct FailingDocumentSource {
    label: String,
    message: String,
}

impl FailingDocumentSource {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self { label: label.into(), message: message.into() }
    }
}

#[async_trait]
impl DocumentSource for FailingDocumentSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn load(&self) -> Result<Document> {
        Err(RagError::SourceLoad { source_label: self.label.clone(), message: self.message.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedding_is_deterministic_and_normalized() {
        let provider = HashEmbeddingProvider::new(32);
        let a = provider.embed_one("Variables hold values").await.unwrap();
        let b = provider.embed_one("variables HOLD values").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(provider.single_calls(), 2);
    }

    #[test]
    fn punctuation_only_text_is_the_zero_vector() {
        let provider = HashEmbeddingProvider::default();
        assert!(provider.vector_for("...  !!").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn static_completion_records_prompts() {
        let llm = StaticCompletionProvider::new("42");
        assert_eq!(llm.complete("first").await.unwrap(), "42");
        assert_eq!(llm.complete("second").await.unwrap(), "42");
        assert_eq!(llm.prompts(), vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn failing_providers_report_their_kind() {
        let embed = FailingEmbeddingProvider::new("quota exceeded");
        assert!(matches!(embed.embed_one("x").await, Err(RagError::Embedding { .. })));
        let llm = FailingCompletionProvider::new("down");
        assert!(matches!(llm.complete("x").await, Err(RagError::Completion { .. })));
        let source = FailingDocumentSource::new("Broken", "404");
        assert!(matches!(source.load().await, Err(RagError::SourceLoad { .. })));
    }
}
