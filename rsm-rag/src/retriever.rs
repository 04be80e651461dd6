//! Query-time retrieval: question → embedding → nearest fragments.

use std::sync::Arc;
use std::time::Duration;

use crate::deadline;
use crate::document::RankedHits;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

/// Default number of fragments fetched per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Where a retrieval failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetrievalStep {
    Validating,
    Embedding,
    Searching,
}

/// A retrieval failure tagged with the step that produced it.
#[derive(Debug)]
pub(crate) struct RetrievalError {
    pub(crate) step: RetrievalStep,
    pub(crate) error: RagError,
}

/// Embeds a question and fetches its nearest fragments from a [`VectorIndex`].
///
/// The retriever never reorders hits: ranking belongs to the index. It only
/// checks that the ranking is ascending and caps the result at `k`.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    timeout: Duration,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        timeout: Duration,
    ) -> Self {
        Self { embedder, index, timeout }
    }

    /// Fetch the `k` fragments nearest to `question`.
    ///
    /// An empty result is a valid outcome (empty index, nothing matched).
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidRequest`] if `k == 0`
    /// - [`RagError::Embedding`] if the question cannot be embedded
    /// - [`RagError::Index`] if the search fails or returns hits out of order
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<RankedHits> {
        self.retrieve_tracked(question, k).await.map_err(|e| e.error)
    }

    /// Like [`retrieve`](Self::retrieve), reporting which step failed.
    pub(crate) async fn retrieve_tracked(
        &self,
        question: &str,
        k: usize,
    ) -> std::result::Result<RankedHits, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError {
                step: RetrievalStep::Validating,
                error: RagError::InvalidRequest("k must be a positive integer".to_string()),
            });
        }

        let embedding = deadline::within(
            self.timeout,
            self.embedder.embed_one(question),
            deadline::embedding_timeout(self.embedder.name()),
        )
        .await
        .map_err(|error| RetrievalError { step: RetrievalStep::Embedding, error })?;

        let backend = self.index.name();
        let searched = async {
            let hits = deadline::within(
                self.timeout,
                self.index.search(&embedding, k),
                deadline::index_timeout(backend),
            )
            .await?;
            let mut ranked = RankedHits::from_ascending(backend, hits)?;
            ranked.truncate(k);
            Ok::<_, RagError>(ranked)
        };
        searched.await.map_err(|error| RetrievalError { step: RetrievalStep::Searching, error })
    }
}
