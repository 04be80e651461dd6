//! Error types for the `rsm-rag` crate.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A single document source could not be loaded.
    ///
    /// Ingestion tolerates this error: the source is skipped and the run continues.
    #[error("Source load error ({source_label}): {message}")]
    SourceLoad {
        /// The label of the source that failed.
        source_label: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector index error ({backend}): {message}")]
    Index {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while generating a completion.
    #[error("Completion error ({provider}): {message}")]
    Completion {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller supplied an invalid request (for example `k == 0`).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A fatal error raised while running a pipeline operation.
    #[error("{operation} failed during {stage}: {cause}")]
    Operation {
        /// The pipeline operation (`ingest` or `query`).
        operation: Operation,
        /// The stage the operation was in when it failed.
        stage: &'static str,
        /// The underlying error.
        #[source]
        cause: Box<RagError>,
    },
}

/// The two operations exposed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Ingest,
    Query,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`RagError`], independent of the operation wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceLoad,
    Embedding,
    Index,
    Completion,
    Config,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceLoad => "source_load",
            Self::Embedding => "embedding",
            Self::Index => "index",
            Self::Completion => "completion",
            Self::Config => "config",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RagError {
    /// Classify this error, looking through any [`RagError::Operation`] wrapper.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceLoad { .. } => ErrorKind::SourceLoad,
            Self::Embedding { .. } => ErrorKind::Embedding,
            Self::Index { .. } => ErrorKind::Index,
            Self::Completion { .. } => ErrorKind::Completion,
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Operation { cause, .. } => cause.kind(),
        }
    }

    /// The innermost error, with all operation context removed.
    pub fn root(&self) -> &RagError {
        let mut current = self;
        while let Self::Operation { cause, .. } = current {
            current = cause;
        }
        current
    }

    /// The stage the operation failed in, if this error carries operation context.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Operation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub(crate) fn in_operation(self, operation: Operation, stage: &'static str) -> Self {
        Self::Operation { operation, stage, cause: Box::new(self) }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
