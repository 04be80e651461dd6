//! Vector index trait for storing and searching embedded fragments.

use async_trait::async_trait;

use crate::document::{IndexStats, IndexedEntry, SearchHit};
use crate::error::Result;

/// A storage backend for embedded fragments with nearest-neighbour search.
///
/// The index owns [`IndexedEntry`] persistence and decides the distance
/// metric. Consumers rely on [`search`](VectorIndex::search) returning hits in
/// ascending distance order.
///
/// # Example
///
/// ```rust,ignore
/// use rsm_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.add(&entries).await?;
/// let hits = index.search(&query_embedding, 5).await?;
/// let stats = index.stats().await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// A short backend name used in errors and logs.
    fn name(&self) -> &str;

    /// Store entries. Entries whose id already exists are replaced.
    async fn add(&self, entries: &[IndexedEntry]) -> Result<()>;

    /// Return at most `k` entries closest to `embedding`, ascending by distance.
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Total entry count and per-source counts across the whole index.
    async fn stats(&self) -> Result<IndexStats>;

    /// Remove every entry.
    async fn reset(&self) -> Result<()>;
}
