use std::sync::Arc;

use anyhow::Context;
use rsm_rag::{
    InMemoryVectorIndex, InstrumentedCompletionProvider, InstrumentedEmbeddingProvider,
    InstrumentedVectorIndex, OpenAICompletionProvider, OpenAIEmbeddingProvider, PipelineMetrics,
    RagService, default_corpus,
};
use rsm_rag_server::{AppState, ServiceConfig, init_logging, run_server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    init_logging(config.log_format)?;

    let api_key = config
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY must be set (in the environment or a .env file)")?;

    let client = reqwest::Client::new();
    let metrics = Arc::new(PipelineMetrics::new());

    let embedder = OpenAIEmbeddingProvider::new(api_key.clone())?.with_client(client.clone());
    let llm = OpenAICompletionProvider::new(api_key)?.with_client(client.clone());

    let service = RagService::builder()
        .config(config.rag.clone())
        .embedding_provider(Arc::new(InstrumentedEmbeddingProvider::new(
            Arc::new(embedder),
            metrics.clone(),
        )))
        .vector_index(Arc::new(InstrumentedVectorIndex::new(
            Arc::new(InMemoryVectorIndex::new()),
            metrics.clone(),
        )))
        .completion_provider(Arc::new(InstrumentedCompletionProvider::new(
            Arc::new(llm),
            metrics.clone(),
        )))
        .sources(default_corpus(client))
        .build()?;

    info!(
        chunk_size = config.rag.chunk_size,
        chunk_overlap = config.rag.chunk_overlap,
        top_k = config.rag.top_k,
        sources = service.sources().len(),
        "pipeline ready"
    );

    run_server(config.server, AppState::new(Arc::new(service), metrics)).await
}
