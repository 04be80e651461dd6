use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use rsm_rag::{
    AnswerResult, ErrorKind, IngestionReport, InstrumentedRagService, MetricsSnapshot,
    PipelineMetrics, RagService,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::http_metrics::{HttpMetrics, HttpMetricsSnapshot, track_requests};
use crate::telemetry::SERVICE_NAME;

#[derive(Clone)]
pub struct AppState {
    pub service: InstrumentedRagService,
    pub http_metrics: Arc<HttpMetrics>,
}

impl AppState {
    pub fn new(service: Arc<RagService>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            service: InstrumentedRagService::new(service, metrics),
            http_metrics: Arc::new(HttpMetrics::new()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

/// Body of `POST /query`. `k` falls back to the configured default.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub k: Option<usize>,
}

type ApiError = (StatusCode, Json<Value>);

fn detail(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "detail": message.into() })))
}

/// Body of `GET /metrics`: the pipeline counters plus an `http` section.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub pipeline: MetricsSnapshot,
    pub http: HttpMetricsSnapshot,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            info_span!(
                "http_request",
                service = SERVICE_NAME,
                method = %request.method(),
                path = %request.uri().path(),
            )
        })
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis),
        );

    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/query", post(query))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
        .layer(trace)
        .layer(cors)
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for rsm-rag server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("rsm-rag listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok"}))
}

async fn ingest(State(state): State<AppState>) -> (StatusCode, Json<IngestionReport>) {
    match state.service.ingest().await {
        Ok(report) => (StatusCode::OK, Json(report)),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(IngestionReport::failed(&e))),
    }
}

async fn query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, ApiError> {
    let Json(request) = body
        .map_err(|rejection| detail(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()))?;
    let k = request.k.unwrap_or(state.service.service().config().top_k);

    state.service.answer(&request.question, k).await.map(Json).map_err(|e| match e.kind() {
        ErrorKind::InvalidRequest => detail(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        _ => detail(StatusCode::INTERNAL_SERVER_ERROR, format!("Query failed: {e}")),
    })
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        pipeline: state.service.metrics().snapshot(),
        http: state.http_metrics.snapshot(),
    })
}
