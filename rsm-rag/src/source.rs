//! Document sources: where raw corpus text comes from.
//!
//! Each [`DocumentSource`] produces one [`Document`] under a fixed label.
//! [`load_all`] loads a set of sources and keeps going when one fails, so a
//! single unreachable source never aborts ingestion.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::document::{Document, SkippedSource};
use crate::error::{RagError, Result};

/// A loader for one labelled corpus source.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// The label attached to every fragment of this source.
    fn label(&self) -> &str;

    /// Fetch the full text of the source.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::SourceLoad`] when the source cannot be read.
    async fn load(&self) -> Result<Document>;
}

/// The documents that loaded and the sources that did not.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub failures: Vec<SkippedSource>,
}

/// Load every source in order, collecting failures instead of stopping.
pub async fn load_all(sources: &[Arc<dyn DocumentSource>]) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for source in sources {
        match source.load().await {
            Ok(document) => outcome.documents.push(document),
            Err(e) => outcome
                .failures
                .push(SkippedSource { source: source.label().to_string(), reason: e.to_string() }),
        }
    }
    outcome
}

/// A source whose text is already in memory.
#[derive(Debug, Clone)]
pub struct StaticDocumentSource {
    document: Document,
}

impl StaticDocumentSource {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self { document: Document::new(label, text) }
    }
}

#[async_trait]
impl DocumentSource for StaticDocumentSource {
    fn label(&self) -> &str {
        &self.document.source
    }

    async fn load(&self) -> Result<Document> {
        Ok(self.document.clone())
    }
}

/// A source read from a UTF-8 text file on disk.
#[derive(Debug, Clone)]
pub struct FileDocumentSource {
    label: String,
    path: PathBuf,
}

impl FileDocumentSource {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { label: label.into(), path: path.into() }
    }
}

#[async_trait]
impl DocumentSource for FileDocumentSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn load(&self) -> Result<Document> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RagError::SourceLoad {
                source_label: self.label.clone(),
                message: format!("failed to read {}: {e}", self.path.display()),
            }
        })?;
        Ok(Document::new(self.label.clone(), text))
    }
}
