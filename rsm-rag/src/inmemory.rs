//! In-memory vector index.
//!
//! This module provides [`InMemoryVectorIndex`], a zero-dependency index
//! backed by a `Vec` protected by a `tokio::sync::RwLock`. Search is a brute
//! force scan, which is fast enough for corpora of a few tens of thousands of
//! fragments.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::document::{IndexStats, IndexedEntry, SearchHit};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

const BACKEND: &str = "InMemory";

/// How the distance between two embeddings is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`; 0 for identical directions, up to 2 for opposite ones.
    #[default]
    Cosine,
    /// Sum of squared component differences.
    SquaredL2,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::SquaredL2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Default)]
struct Entries {
    items: Vec<IndexedEntry>,
    positions: HashMap<String, usize>,
}

impl Entries {
    fn dimensions(&self) -> Option<usize> {
        self.items.first().map(|e| e.embedding.len())
    }
}

/// An in-memory [`VectorIndex`].
///
/// Entries keep insertion order, so hits at equal distance come back in the
/// order they were added. All operations are async-safe via
/// `tokio::sync::RwLock`; concurrent searches share a read lock.
///
/// # Example
///
/// ```rust,ignore
/// use rsm_rag::{DistanceMetric, InMemoryVectorIndex};
///
/// let index = InMemoryVectorIndex::with_metric(DistanceMetric::SquaredL2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    metric: DistanceMetric,
    entries: RwLock<Entries>,
}

impl InMemoryVectorIndex {
    /// Create a new empty index using cosine distance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty index using the given metric.
    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self { metric, entries: RwLock::default() }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn dimension_error(expected: usize, actual: usize) -> RagError {
        RagError::Index {
            backend: BACKEND.to_string(),
            message: format!("embedding has {actual} dimensions, index holds {expected}"),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn add(&self, entries: &[IndexedEntry]) -> Result<()> {
        let mut guard = self.entries.write().await;
        let store = &mut *guard;
        let expected = store.dimensions().or_else(|| entries.first().map(|e| e.embedding.len()));
        if let Some(expected) = expected {
            if let Some(bad) = entries.iter().find(|e| e.embedding.len() != expected) {
                return Err(Self::dimension_error(expected, bad.embedding.len()));
            }
        }

        for entry in entries {
            match store.positions.get(&entry.id).copied() {
                Some(pos) => store.items[pos] = entry.clone(),
                None => {
                    let pos = store.items.len();
                    store.positions.insert(entry.id.clone(), pos);
                    store.items.push(entry.clone());
                }
            }
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let store = self.entries.read().await;
        if k == 0 || store.items.is_empty() {
            return Ok(Vec::new());
        }
        let expected = store.dimensions().unwrap_or(embedding.len());
        if expected != embedding.len() {
            return Err(Self::dimension_error(expected, embedding.len()));
        }

        let mut scored: Vec<(f32, &IndexedEntry)> = store
            .items
            .iter()
            .map(|entry| (self.metric.distance(&entry.embedding, embedding), entry))
            .collect();

        // Stable sort: equal distances keep insertion order.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, entry)| SearchHit {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                distance,
            })
            .collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let store = self.entries.read().await;
        let mut sources: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &store.items {
            *sources.entry(entry.metadata.source.clone()).or_default() += 1;
        }
        Ok(IndexStats { total_count: store.items.len(), sources })
    }

    async fn reset(&self) -> Result<()> {
        let mut store = self.entries.write().await;
        store.items.clear();
        store.positions.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_of_identical_vectors_is_zero() {
        let d = DistanceMetric::Cosine.distance(&[0.3, 0.4], &[0.3, 0.4]);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_with_zero_vector_is_one() {
        assert_eq!(DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn squared_l2_distance() {
        assert_eq!(DistanceMetric::SquaredL2.distance(&[1.0, 2.0], &[3.0, 2.0]), 4.0);
    }
}
