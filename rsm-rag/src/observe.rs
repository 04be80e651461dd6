//! Observability decorators and in-process metrics.
//!
//! The core pipeline logs nothing on its own. Wrap its collaborators in the
//! `Instrumented*` types below to get structured `tracing` events and
//! [`PipelineMetrics`] counters, and wrap the service itself in
//! [`InstrumentedRagService`] for per-operation events.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::completion::CompletionProvider;
use crate::document::{
    AnswerResult, Embedding, IndexStats, IndexedEntry, IngestionReport, SearchHit,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{Operation, RagError, Result};
use crate::pipeline::RagService;
use crate::vectorstore::VectorIndex;

/// Success and error counts for one kind of operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub success: u64,
    pub error: u64,
}

/// Count, total and worst-case latency of an operation, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub total_ms: u64,
    pub max_ms: u64,
}

impl LatencySummary {
    /// Fold one observed duration into the summary.
    pub fn observe(&mut self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.count += 1;
        self.total_ms = self.total_ms.saturating_add(ms);
        self.max_ms = self.max_ms.max(ms);
    }
}

/// Embeddings generated, split by what was embedded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingCounts {
    /// Fragment embeddings produced during ingestion.
    pub document: u64,
    /// Question embeddings produced at query time.
    pub query: u64,
}

/// Embedding call latency, split the same way as [`EmbeddingCounts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingLatency {
    pub document: LatencySummary,
    pub query: LatencySummary,
}

/// A point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries: StatusCounts,
    pub query_latency: LatencySummary,
    /// Sum of sources returned over all successful queries.
    pub sources_found: u64,
    pub ingestions: StatusCounts,
    pub ingestion_latency: LatencySummary,
    /// Fragments written over all successful ingestions.
    pub documents_processed: u64,
    pub embeddings_generated: EmbeddingCounts,
    /// Duration of successful embedding calls; one batch counts once.
    pub embedding_latency: EmbeddingLatency,
    pub completions: StatusCounts,
    /// Keyed by index operation: `add`, `search`, `stats`, `reset`.
    pub vector_index_operations: BTreeMap<String, StatusCounts>,
    /// Entry count reported by the most recent `stats` call.
    pub index_size: u64,
    /// Keyed by `"<kind>:<operation>"`, e.g. `"embedding:query"`.
    pub errors: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct Tallies {
    queries: StatusCounts,
    query_latency: LatencySummary,
    ingestions: StatusCounts,
    ingestion_latency: LatencySummary,
    embedding_latency: EmbeddingLatency,
    completions: StatusCounts,
    vector_index_operations: BTreeMap<String, StatusCounts>,
    errors: BTreeMap<String, u64>,
}

/// Thread-safe counters shared by the instrumented decorators.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    sources_found: AtomicU64,
    documents_processed: AtomicU64,
    document_embeddings: AtomicU64,
    query_embeddings: AtomicU64,
    index_size: AtomicU64,
    tallies: Mutex<Tallies>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn tallies(&self) -> std::sync::MutexGuard<'_, Tallies> {
        self.tallies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_query(&self, elapsed: Duration, sources: usize, success: bool) {
        let mut tallies = self.tallies();
        if success {
            tallies.queries.success += 1;
            tallies.query_latency.observe(elapsed);
            self.sources_found.fetch_add(sources as u64, Ordering::Relaxed);
        } else {
            tallies.queries.error += 1;
        }
    }

    pub fn record_ingestion(&self, elapsed: Duration, fragments: usize, success: bool) {
        let mut tallies = self.tallies();
        if success {
            tallies.ingestions.success += 1;
            tallies.ingestion_latency.observe(elapsed);
            self.documents_processed.fetch_add(fragments as u64, Ordering::Relaxed);
        } else {
            tallies.ingestions.error += 1;
        }
    }

    pub fn record_document_embeddings(&self, count: usize, elapsed: Duration) {
        self.document_embeddings.fetch_add(count as u64, Ordering::Relaxed);
        self.tallies().embedding_latency.document.observe(elapsed);
    }

    pub fn record_query_embedding(&self, elapsed: Duration) {
        self.query_embeddings.fetch_add(1, Ordering::Relaxed);
        self.tallies().embedding_latency.query.observe(elapsed);
    }

    pub fn record_completion(&self, success: bool) {
        let mut tallies = self.tallies();
        if success {
            tallies.completions.success += 1;
        } else {
            tallies.completions.error += 1;
        }
    }

    pub fn record_index_operation(&self, operation: &str, success: bool) {
        let mut tallies = self.tallies();
        let counts = tallies.vector_index_operations.entry(operation.to_string()).or_default();
        if success {
            counts.success += 1;
        } else {
            counts.error += 1;
        }
    }

    pub fn set_index_size(&self, size: usize) {
        self.index_size.store(size as u64, Ordering::Relaxed);
    }

    /// Count an error under its kind and the operation it aborted.
    pub fn record_error(&self, error: &RagError, operation: Operation) {
        let key = format!("{}:{}", error.kind(), operation);
        *self.tallies().errors.entry(key).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let tallies = self.tallies();
        MetricsSnapshot {
            queries: tallies.queries,
            query_latency: tallies.query_latency,
            sources_found: self.sources_found.load(Ordering::Relaxed),
            ingestions: tallies.ingestions,
            ingestion_latency: tallies.ingestion_latency,
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            embeddings_generated: EmbeddingCounts {
                document: self.document_embeddings.load(Ordering::Relaxed),
                query: self.query_embeddings.load(Ordering::Relaxed),
            },
            embedding_latency: tallies.embedding_latency,
            completions: tallies.completions,
            vector_index_operations: tallies.vector_index_operations.clone(),
            index_size: self.index_size.load(Ordering::Relaxed),
            errors: tallies.errors.clone(),
        }
    }
}

// ── Embedding ──────────────────────────────────────────────────────

/// Logs and counts every call to the wrapped [`EmbeddingProvider`].
///
/// Single embeddings are counted as query embeddings and batches as document
/// embeddings, matching how the pipeline uses them.
pub struct InstrumentedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    metrics: Arc<PipelineMetrics>,
}

impl InstrumentedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl EmbeddingProvider for InstrumentedEmbeddingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let started = Instant::now();
        let result = self.inner.embed_one(text).await;
        match &result {
            Ok(_) => {
                let elapsed = started.elapsed();
                self.metrics.record_query_embedding(elapsed);
                debug!(
                    provider = %self.inner.name(),
                    embedding_type = "query",
                    duration_ms = elapsed.as_millis() as u64,
                    "embedding generated"
                );
            }
            Err(e) => error!(provider = %self.inner.name(), error = %e, "query embedding failed"),
        }
        result
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let started = Instant::now();
        let result = self.inner.embed_batch(texts).await;
        match &result {
            Ok(embeddings) => {
                let elapsed = started.elapsed();
                self.metrics.record_document_embeddings(embeddings.len(), elapsed);
                info!(
                    provider = %self.inner.name(),
                    embedding_type = "document",
                    count = embeddings.len(),
                    duration_ms = elapsed.as_millis() as u64,
                    "embeddings generated"
                );
            }
            Err(e) => error!(
                provider = %self.inner.name(),
                batch_size = texts.len(),
                error = %e,
                "document embedding failed"
            ),
        }
        result
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

// ── Vector index ───────────────────────────────────────────────────

/// Logs and counts every call to the wrapped [`VectorIndex`].
pub struct InstrumentedVectorIndex {
    inner: Arc<dyn VectorIndex>,
    metrics: Arc<PipelineMetrics>,
}

impl InstrumentedVectorIndex {
    pub fn new(inner: Arc<dyn VectorIndex>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { inner, metrics }
    }

    fn record<T>(&self, operation: &str, result: &Result<T>) {
        self.metrics.record_index_operation(operation, result.is_ok());
        if let Err(e) = result {
            error!(backend = %self.inner.name(), operation, error = %e, "vector index operation failed");
        }
    }
}

#[async_trait]
impl VectorIndex for InstrumentedVectorIndex {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn add(&self, entries: &[IndexedEntry]) -> Result<()> {
        let result = self.inner.add(entries).await;
        self.record("add", &result);
        if result.is_ok() {
            debug!(backend = %self.inner.name(), count = entries.len(), "entries added");
        }
        result
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let result = self.inner.search(query, k).await;
        self.record("search", &result);
        if let Ok(hits) = &result {
            debug!(backend = %self.inner.name(), k, results = hits.len(), "search completed");
        }
        result
    }

    async fn stats(&self) -> Result<IndexStats> {
        let result = self.inner.stats().await;
        self.record("stats", &result);
        if let Ok(stats) = &result {
            self.metrics.set_index_size(stats.total_count);
        }
        result
    }

    async fn reset(&self) -> Result<()> {
        let result = self.inner.reset().await;
        self.record("reset", &result);
        if result.is_ok() {
            self.metrics.set_index_size(0);
            info!(backend = %self.inner.name(), "vector index reset");
        }
        result
    }
}

// ── Completion ─────────────────────────────────────────────────────

/// Logs and counts every call to the wrapped [`CompletionProvider`].
pub struct InstrumentedCompletionProvider {
    inner: Arc<dyn CompletionProvider>,
    metrics: Arc<PipelineMetrics>,
}

impl InstrumentedCompletionProvider {
    pub fn new(inner: Arc<dyn CompletionProvider>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl CompletionProvider for InstrumentedCompletionProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let started = Instant::now();
        let result = self.inner.complete(prompt).await;
        self.metrics.record_completion(result.is_ok());
        match &result {
            Ok(answer) => debug!(
                provider = %self.inner.name(),
                prompt_len = prompt.len(),
                answer_len = answer.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "completion generated"
            ),
            Err(e) => error!(provider = %self.inner.name(), error = %e, "completion failed"),
        }
        result
    }
}

// ── Service ────────────────────────────────────────────────────────

/// Wraps a [`RagService`] with per-operation spans, lifecycle events and metrics.
#[derive(Clone)]
pub struct InstrumentedRagService {
    service: Arc<RagService>,
    metrics: Arc<PipelineMetrics>,
}

impl InstrumentedRagService {
    pub fn new(service: Arc<RagService>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { service, metrics }
    }

    pub fn service(&self) -> &Arc<RagService> {
        &self.service
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// [`RagService::ingest`] with `ingestion_started` / `ingestion_completed` events.
    pub async fn ingest(&self) -> Result<IngestionReport> {
        let span = info_span!("rag.ingest", sources = self.service.sources().len());
        async {
            info!("ingestion_started");
            let started = Instant::now();
            let result = self.service.ingest().await;
            let elapsed = started.elapsed();

            match &result {
                Ok(report) => {
                    self.metrics.record_ingestion(elapsed, report.total_documents, true);
                    for skipped in &report.skipped_sources {
                        warn!(source = %skipped.source, reason = %skipped.reason, "source skipped");
                    }
                    info!(
                        total_documents = report.total_documents,
                        skipped_sources = report.skipped_sources.len(),
                        duration_ms = elapsed.as_millis() as u64,
                        "ingestion_completed"
                    );
                }
                Err(e) => {
                    self.metrics.record_ingestion(elapsed, 0, false);
                    self.metrics.record_error(e, Operation::Ingest);
                    error!(
                        error = %e,
                        error_kind = %e.kind(),
                        stage = e.stage().unwrap_or("unknown"),
                        "ingestion failed"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// [`RagService::answer`] with `query_started` / `query_completed` events.
    pub async fn answer(&self, question: &str, k: usize) -> Result<AnswerResult> {
        let span = info_span!("rag.query", k);
        async {
            info!(question_len = question.len(), "query_started");
            let started = Instant::now();
            let result = self.service.answer(question, k).await;
            let elapsed = started.elapsed();

            match &result {
                Ok(answer) => {
                    self.metrics.record_query(elapsed, answer.sources.len(), true);
                    info!(
                        sources_found = answer.sources.len(),
                        answer_len = answer.answer.len(),
                        duration_ms = elapsed.as_millis() as u64,
                        "query_completed"
                    );
                }
                Err(e) => {
                    self.metrics.record_query(elapsed, 0, false);
                    self.metrics.record_error(e, Operation::Query);
                    error!(
                        error = %e,
                        error_kind = %e.kind(),
                        stage = e.stage().unwrap_or("unknown"),
                        "query failed"
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// [`answer`](Self::answer) with the configured default `k`.
    pub async fn answer_default(&self, question: &str) -> Result<AnswerResult> {
        self.answer(question, self.service.config().top_k).await
    }
}
