//! Data types for documents, fragments, index entries and pipeline results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A vector embedding produced by an [`EmbeddingProvider`](crate::EmbeddingProvider).
pub type Embedding = Vec<f32>;

/// A raw source document: the full text of one corpus source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Label of the source this text came from (e.g. `"PEP 8"`).
    pub source: String,
    /// The text content of the document.
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source: source.into(), text: text.into() }
    }
}

/// Position of a [`Fragment`] within its source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FragmentMetadata {
    /// Label of the source document.
    pub source: String,
    /// Zero-based position within the source's fragment sequence.
    pub chunk_index: usize,
    /// Number of fragments the source was split into.
    pub total_chunks: usize,
}

/// A contiguous slice of a [`Document`]'s text, sized for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub metadata: FragmentMetadata,
}

/// The unit persisted by a [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedEntry {
    /// Opaque identifier assigned at ingestion time.
    pub id: String,
    pub text: String,
    pub embedding: Embedding,
    pub metadata: FragmentMetadata,
}

/// One nearest-neighbour match returned by a vector index search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub metadata: FragmentMetadata,
    /// Dissimilarity to the query vector; smaller is more similar.
    pub distance: f32,
}

/// Search hits ordered by ascending distance.
///
/// The ordering is checked on construction and cannot be broken afterwards,
/// so consumers can rely on `hits()[0]` being the closest match.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RankedHits(Vec<SearchHit>);

impl RankedHits {
    /// Wrap hits that are already in ascending distance order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Index`] if any adjacent pair is out of order or a
    /// distance is NaN. The hits are never re-sorted.
    pub fn from_ascending(backend: &str, hits: Vec<SearchHit>) -> Result<Self> {
        if hits.iter().any(|h| h.distance.is_nan()) {
            return Err(RagError::Index {
                backend: backend.to_string(),
                message: "search returned a NaN distance".to_string(),
            });
        }
        if let Some(pair) = hits.windows(2).find(|w| w[0].distance > w[1].distance) {
            return Err(RagError::Index {
                backend: backend.to_string(),
                message: format!(
                    "search results are not in ascending distance order ({} before {})",
                    pair[0].distance, pair[1].distance
                ),
            });
        }
        Ok(Self(hits))
    }

    /// Keep only the `k` closest hits.
    pub fn truncate(&mut self, k: usize) {
        self.0.truncate(k);
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<SearchHit> {
        self.0
    }
}

/// A reference to a retrieved fragment, shown alongside an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    /// Page number of the fragment; the fragment's `chunk_index`.
    pub page: usize,
    /// Preview of the fragment text, truncated to 200 characters.
    pub text: String,
    /// Label of the source document.
    pub source: String,
    pub distance: f32,
}

/// The final output of a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Outcome status of an ingestion run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Success,
    Error,
}

/// A source that was skipped during ingestion because it failed to load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionReport {
    pub status: IngestionStatus,
    /// Number of fragments ingested by this run.
    pub total_documents: usize,
    /// Fragment count per source label across the whole index.
    pub sources: BTreeMap<String, usize>,
    pub message: String,
    /// Sources that failed to load and were skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_sources: Vec<SkippedSource>,
}

impl IngestionReport {
    /// A report describing a failed run.
    pub fn failed(error: &RagError) -> Self {
        Self {
            status: IngestionStatus::Error,
            total_documents: 0,
            sources: BTreeMap::new(),
            message: format!("Ingestion failed: {error}"),
            skipped_sources: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == IngestionStatus::Success
    }
}

/// Aggregate counts reported by a vector index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub total_count: usize,
    pub sources: BTreeMap<String, usize>,
}
