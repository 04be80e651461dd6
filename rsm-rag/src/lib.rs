//! # rsm-rag
//!
//! A Retrieval-Augmented Generation pipeline: split a corpus into overlapping
//! fragments, embed and index them, then answer questions from the nearest
//! fragments with a grounded prompt.
//!
//! ## Overview
//!
//! - [`RecursiveChunker`] - boundary-preferring text splitting with overlap
//! - [`EmbeddingProvider`] / [`CompletionProvider`] - model backends
//! - [`VectorIndex`] - fragment storage and nearest-neighbour search
//! - [`DocumentSource`] - where corpus text comes from
//! - [`RagService`] - ingestion and question answering over all of the above
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rsm_rag::mock::{HashEmbeddingProvider, StaticCompletionProvider};
//! use rsm_rag::{InMemoryVectorIndex, RagService, StaticDocumentSource};
//!
//! let service = RagService::builder()
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .completion_provider(Arc::new(StaticCompletionProvider::new("...")))
//!     .source(Arc::new(StaticDocumentSource::new("Notes", "Variables hold values.")))
//!     .build()?;
//!
//! service.ingest().await?;
//! let result = service.answer("What do variables hold?", 3).await?;
//! ```
//!
//! ## Features
//!
//! - `openai` - OpenAI embedding and chat completion providers
//! - `http` - web page document sources and the default corpus
//! - `full` - everything

pub mod chunking;
pub mod completion;
pub mod config;
pub mod context;
mod deadline;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod mock;
pub mod observe;
pub mod pipeline;
pub mod retriever;
pub mod source;
pub mod vectorstore;

#[cfg(feature = "http")]
pub mod http_source;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, RecursiveChunker};
pub use completion::CompletionProvider;
pub use config::{RagConfig, RagConfigBuilder};
pub use context::{AssembledContext, ContextAssembler, PREVIEW_CHARS};
pub use document::{
    AnswerResult, Document, Embedding, Fragment, FragmentMetadata, IndexStats, IndexedEntry,
    IngestionReport, IngestionStatus, RankedHits, SearchHit, SkippedSource, SourceRef,
};
pub use embedding::EmbeddingProvider;
pub use error::{ErrorKind, Operation, RagError, Result};
pub use inmemory::{DistanceMetric, InMemoryVectorIndex};
pub use observe::{
    EmbeddingCounts, EmbeddingLatency, InstrumentedCompletionProvider,
    InstrumentedEmbeddingProvider, InstrumentedRagService, InstrumentedVectorIndex,
    LatencySummary, MetricsSnapshot, PipelineMetrics, StatusCounts,
};
pub use pipeline::{
    IngestionStage, NO_RESULTS_ANSWER, QueryStage, RagService, RagServiceBuilder,
};
pub use retriever::{DEFAULT_TOP_K, Retriever};
pub use source::{
    DocumentSource, FileDocumentSource, LoadOutcome, StaticDocumentSource, load_all,
};
pub use vectorstore::VectorIndex;

#[cfg(feature = "http")]
pub use http_source::{HttpDocumentSource, default_corpus, html_to_text};
#[cfg(feature = "openai")]
pub use openai::{OpenAICompletionProvider, OpenAIEmbeddingProvider};
