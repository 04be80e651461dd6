//! RAG pipeline orchestrator.
//!
//! The [`RagService`] coordinates the two operations of the pipeline by
//! composing a [`Chunker`], an [`EmbeddingProvider`], a [`VectorIndex`] and a
//! [`CompletionProvider`]:
//!
//! - ingestion: sources → fragments → one batch embedding call → one index write
//! - query: question → embedding → nearest fragments → prompt → answer
//!
//! The service holds no mutable state of its own, so one instance can be shared
//! behind an `Arc` and queried concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use rsm_rag::{InMemoryVectorIndex, RagConfig, RagService};
//!
//! let service = RagService::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .completion_provider(Arc::new(my_llm))
//!     .source(Arc::new(StaticDocumentSource::new("Notes", text)))
//!     .build()?;
//!
//! let report = service.ingest().await?;
//! let answer = service.answer("What is a variable?", 5).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::completion::CompletionProvider;
use crate::config::RagConfig;
use crate::context::ContextAssembler;
use crate::deadline;
use crate::document::{AnswerResult, Fragment, IndexedEntry, IngestionReport, IngestionStatus};
use crate::embedding::EmbeddingProvider;
use crate::error::{Operation, RagError, Result};
use crate::retriever::{RetrievalStep, Retriever};
use crate::source::{DocumentSource, load_all};
use crate::vectorstore::VectorIndex;

/// The answer returned when retrieval finds nothing.
pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information to answer your question.";

/// Stages of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    Loading,
    Embedding,
    Storing,
    Done,
}

impl IngestionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Embedding => "embedding",
            Self::Storing => "storing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stages of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Embedding,
    Retrieving,
    Assembling,
    Completing,
}

impl QueryStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Retrieving => "retrieving",
            Self::Assembling => "assembling",
            Self::Completing => "completing",
        }
    }
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagService::builder()`]. Every collaborator is injected,
/// so tests can swap in deterministic fakes.
pub struct RagService {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    completion_provider: Arc<dyn CompletionProvider>,
    sources: Vec<Arc<dyn DocumentSource>>,
    retriever: Retriever,
    assembler: ContextAssembler,
}

impl RagService {
    /// Create a new [`RagServiceBuilder`].
    pub fn builder() -> RagServiceBuilder {
        RagServiceBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.vector_index
    }

    /// Return the configured document sources.
    pub fn sources(&self) -> &[Arc<dyn DocumentSource>] {
        &self.sources
    }

    /// Load, chunk, embed and store every configured source.
    ///
    /// Sources that fail to load are skipped and listed in the report. When no
    /// fragments are produced, the provider and index writes are skipped and
    /// the run still succeeds. Re-running appends fresh entries unless
    /// [`RagConfig::idempotent_ids`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Operation`] wrapping an `Embedding` or `Index`
    /// error, tagged with the stage that failed.
    pub async fn ingest(&self) -> Result<IngestionReport> {
        let fail = |stage: IngestionStage| {
            move |e: RagError| e.in_operation(Operation::Ingest, stage.as_str())
        };
        let timeout = self.config.provider_timeout();

        // Loading
        let outcome = load_all(&self.sources).await;
        let fragments: Vec<Fragment> =
            outcome.documents.iter().flat_map(|doc| self.chunker.chunk_document(doc)).collect();

        if !fragments.is_empty() {
            // Embedding
            let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
            let provider = self.embedding_provider.name();
            let embeddings = deadline::within(
                timeout,
                self.embedding_provider.embed_batch(&texts),
                deadline::embedding_timeout(provider),
            )
            .await
            .map_err(fail(IngestionStage::Embedding))?;

            if embeddings.len() != fragments.len() {
                return Err(fail(IngestionStage::Embedding)(RagError::Embedding {
                    provider: provider.to_string(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        fragments.len(),
                        embeddings.len()
                    ),
                }));
            }

            // Storing
            let entries: Vec<IndexedEntry> = fragments
                .iter()
                .zip(embeddings)
                .map(|(fragment, embedding)| IndexedEntry {
                    id: self.entry_id(fragment),
                    text: fragment.text.clone(),
                    embedding,
                    metadata: fragment.metadata.clone(),
                })
                .collect();
            deadline::within(
                timeout,
                self.vector_index.add(&entries),
                deadline::index_timeout(self.vector_index.name()),
            )
            .await
            .map_err(fail(IngestionStage::Storing))?;
        }

        // Done
        let stats = deadline::within(
            timeout,
            self.vector_index.stats(),
            deadline::index_timeout(self.vector_index.name()),
        )
        .await
        .map_err(fail(IngestionStage::Done))?;

        Ok(IngestionReport {
            status: IngestionStatus::Success,
            total_documents: fragments.len(),
            sources: stats.sources,
            message: format!("Successfully ingested {} documents", fragments.len()),
            skipped_sources: outcome.failures,
        })
    }

    /// Answer `question` from the `k` nearest fragments.
    ///
    /// When nothing is retrieved the result is [`NO_RESULTS_ANSWER`] with no
    /// sources; this is a success, not an error.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidRequest`] if `k == 0` or the question is blank
    /// - [`RagError::Operation`] wrapping an `Embedding`, `Index` or
    ///   `Completion` error, tagged with the stage that failed
    pub async fn answer(&self, question: &str, k: usize) -> Result<AnswerResult> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidRequest("question must not be empty".to_string()));
        }

        let hits = self.retriever.retrieve_tracked(question, k).await.map_err(|e| match e.step {
            RetrievalStep::Validating => e.error,
            RetrievalStep::Embedding => {
                e.error.in_operation(Operation::Query, QueryStage::Embedding.as_str())
            }
            RetrievalStep::Searching => {
                e.error.in_operation(Operation::Query, QueryStage::Retrieving.as_str())
            }
        })?;

        if hits.is_empty() {
            return Ok(AnswerResult { answer: NO_RESULTS_ANSWER.to_string(), sources: Vec::new() });
        }

        let assembled = self.assembler.assemble(question, &hits);

        let answer = deadline::within(
            self.config.provider_timeout(),
            self.completion_provider.complete(&assembled.prompt),
            deadline::completion_timeout(self.completion_provider.name()),
        )
        .await
        .map_err(|e| e.in_operation(Operation::Query, QueryStage::Completing.as_str()))?;

        Ok(AnswerResult { answer, sources: assembled.sources })
    }

    /// [`answer`](Self::answer) with the configured default `k`.
    pub async fn answer_default(&self, question: &str) -> Result<AnswerResult> {
        self.answer(question, self.config.top_k).await
    }

    fn entry_id(&self, fragment: &Fragment) -> String {
        if !self.config.idempotent_ids {
            return uuid::Uuid::new_v4().to_string();
        }
        let mut hasher = Sha256::new();
        hasher.update(fragment.metadata.source.as_bytes());
        hasher.update([0u8]);
        hasher.update(fragment.metadata.chunk_index.to_le_bytes());
        hasher.update(fragment.text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Builder for constructing a [`RagService`].
///
/// The embedding provider, vector index and completion provider are required.
/// The chunker defaults to a [`RecursiveChunker`] sized from the config, and
/// the config defaults to [`RagConfig::default()`].
///
/// # Example
///
/// ```rust,ignore
/// let service = RagService::builder()
///     .embedding_provider(Arc::new(embedder))
///     .vector_index(Arc::new(index))
///     .completion_provider(Arc::new(llm))
///     .sources(sources)
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagServiceBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
    sources: Vec<Arc<dyn DocumentSource>>,
}

impl RagServiceBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the completion provider.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Add one document source.
    pub fn source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Add several document sources.
    pub fn sources(mut self, sources: impl IntoIterator<Item = Arc<dyn DocumentSource>>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Build the [`RagService`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the config is invalid or a required
    /// collaborator is missing.
    pub fn build(self) -> Result<RagService> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        let completion_provider = self
            .completion_provider
            .ok_or_else(|| RagError::Config("completion_provider is required".to_string()))?;
        let chunker =
            self.chunker.unwrap_or_else(|| Arc::new(RecursiveChunker::from_config(&config)));

        let retriever = Retriever::new(
            embedding_provider.clone(),
            vector_index.clone(),
            config.provider_timeout(),
        );
        let assembler = ContextAssembler::new(config.subject.clone());

        Ok(RagService {
            config,
            chunker,
            embedding_provider,
            vector_index,
            completion_provider,
            sources: self.sources,
            retriever,
            assembler,
        })
    }
}
