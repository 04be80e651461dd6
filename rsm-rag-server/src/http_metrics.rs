//! Per-request HTTP counters, recorded by the [`track_requests`] middleware.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use rsm_rag::LatencySummary;
use serde::Serialize;

use crate::server::AppState;

/// Endpoint label for requests that matched no route, so probing arbitrary
/// paths cannot grow the tables without bound.
const UNMATCHED: &str = "unmatched";

/// A point-in-time copy of [`HttpMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HttpMetricsSnapshot {
    /// Keyed by `"<METHOD> <endpoint> <status>"`, e.g. `"POST /query 200"`.
    pub requests_total: BTreeMap<String, u64>,
    /// Keyed by `"<METHOD> <endpoint>"`.
    pub request_duration: BTreeMap<String, LatencySummary>,
    /// Requests currently being served, including the one reading this value.
    pub requests_in_progress: i64,
}

#[derive(Debug, Default)]
struct Tallies {
    requests_total: BTreeMap<String, u64>,
    request_duration: BTreeMap<String, LatencySummary>,
}

#[derive(Debug, Default)]
pub struct HttpMetrics {
    in_progress: AtomicI64,
    tallies: Mutex<Tallies>,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn tallies(&self) -> MutexGuard<'_, Tallies> {
        self.tallies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a request as started. The gauge drops again when the guard does,
    /// even if the handler future is cancelled.
    fn begin(&self) -> InProgress<'_> {
        self.in_progress.fetch_add(1, Ordering::Relaxed);
        InProgress(&self.in_progress)
    }

    pub fn record(&self, method: &str, endpoint: &str, status: u16, elapsed: Duration) {
        let mut tallies = self.tallies();
        *tallies.requests_total.entry(format!("{method} {endpoint} {status}")).or_insert(0) += 1;
        tallies.request_duration.entry(format!("{method} {endpoint}")).or_default().observe(elapsed);
    }

    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        let tallies = self.tallies();
        HttpMetricsSnapshot {
            requests_total: tallies.requests_total.clone(),
            request_duration: tallies.request_duration.clone(),
            requests_in_progress: self.in_progress.load(Ordering::Relaxed),
        }
    }
}

struct InProgress<'a>(&'a AtomicI64);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Count every request by method, route template and status, and time it.
pub async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string());

    let metrics = state.http_metrics;
    let _in_progress = metrics.begin();
    let started = Instant::now();
    let response = next.run(request).await;
    metrics.record(&method, &endpoint, response.status().as_u16(), started.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_keyed_by_route_and_status() {
        let metrics = HttpMetrics::new();
        metrics.record("POST", "/query", 200, Duration::from_millis(40));
        metrics.record("POST", "/query", 422, Duration::from_millis(2));
        metrics.record("GET", "/health", 200, Duration::from_millis(1));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total["POST /query 200"], 1);
        assert_eq!(snapshot.requests_total["POST /query 422"], 1);
        assert_eq!(snapshot.requests_total["GET /health 200"], 1);
        assert_eq!(
            snapshot.request_duration["POST /query"],
            LatencySummary { count: 2, total_ms: 42, max_ms: 40 }
        );
    }

    #[test]
    fn in_progress_gauge_follows_the_guard() {
        let metrics = HttpMetrics::new();
        let first = metrics.begin();
        let second = metrics.begin();
        assert_eq!(metrics.snapshot().requests_in_progress, 2);
        drop(first);
        drop(second);
        assert_eq!(metrics.snapshot().requests_in_progress, 0);
    }
}
