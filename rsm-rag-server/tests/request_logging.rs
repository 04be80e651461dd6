use std::io::Write;
use std::sync::{Arc, Mutex};

use rsm_rag::mock::{HashEmbeddingProvider, StaticCompletionProvider};
use rsm_rag::{InMemoryVectorIndex, PipelineMetrics, RagService};
use rsm_rag_server::{AppState, app_router};
use serde_json::json;

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines_containing(&self, needle: &str) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

async fn spawn_server() -> (String, tokio::task::JoinHandle<()>) {
    let service = RagService::builder()
        .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
        .vector_index(Arc::new(InMemoryVectorIndex::new()))
        .completion_provider(Arc::new(StaticCompletionProvider::new("ok")))
        .build()
        .expect("service builds");
    let app = app_router(AppState::new(Arc::new(service), Arc::new(PipelineMetrics::new())));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    (format!("http://{}", addr), handle)
}

// The default current-thread runtime keeps the server on this thread, so the
// thread-local subscriber sees its events.
#[tokio::test]
async fn requests_and_responses_are_logged_at_info() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{}/health", base)).send().await.expect("health response");
    assert_eq!(health.status(), 200);
    let query = client
        .post(format!("{}/query", base))
        .json(&json!({"question": "What is PEP 8?", "k": 0}))
        .send()
        .await
        .expect("query response");
    assert_eq!(query.status(), 422);

    let health_lines = logs.lines_containing("path=/health");
    assert!(
        health_lines.iter().any(|line| line.contains("started processing request")),
        "{health_lines:?}"
    );
    let finished: Vec<_> = health_lines
        .iter()
        .filter(|line| line.contains("finished processing request"))
        .collect();
    assert_eq!(finished.len(), 1, "{health_lines:?}");
    assert!(finished[0].contains("status=200"));
    assert!(finished[0].contains(" ms"));
    assert!(finished[0].contains("INFO"));

    let query_lines = logs.lines_containing("path=/query");
    assert!(
        query_lines
            .iter()
            .any(|line| line.contains("finished processing request") && line.contains("status=422")),
        "{query_lines:?}"
    );

    handle.abort();
}
