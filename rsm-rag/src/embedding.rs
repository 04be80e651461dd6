//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::document::Embedding;
use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The same provider embeds both fragments (at ingestion) and
/// questions (at query time), so their vectors are comparable.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed_one`](EmbeddingProvider::embed_one) sequentially; backends
/// that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use rsm_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed_one("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// A short name used in errors and logs (e.g. `"OpenAI"`).
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed_one(&self, text: &str) -> Result<Embedding>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The output has one vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_one(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}
