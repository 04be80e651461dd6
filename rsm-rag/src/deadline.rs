//! Per-call time limits for provider and index calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{RagError, Result};

/// Run `call`, failing with `on_timeout(limit)` if it does not finish within `limit`.
///
/// A timed-out call is reported exactly like a failed one; nothing is retried.
pub(crate) async fn within<T, F>(
    limit: Duration,
    call: F,
    on_timeout: impl FnOnce(Duration) -> RagError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}

pub(crate) fn embedding_timeout(provider: &str) -> impl FnOnce(Duration) -> RagError + '_ {
    move |limit| RagError::Embedding {
        provider: provider.to_string(),
        message: format!("timed out after {limit:?}"),
    }
}

pub(crate) fn index_timeout(backend: &str) -> impl FnOnce(Duration) -> RagError + '_ {
    move |limit| RagError::Index {
        backend: backend.to_string(),
        message: format!("timed out after {limit:?}"),
    }
}

pub(crate) fn completion_timeout(provider: &str) -> impl FnOnce(Duration) -> RagError + '_ {
    move |limit| RagError::Completion {
        provider: provider.to_string(),
        message: format!("timed out after {limit:?}"),
    }
}
