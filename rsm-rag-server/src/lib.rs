//! `rsm-rag-server` exposes the RSM RAG pipeline over HTTP.
//! It serves ingestion, question answering, health and metrics endpoints.

pub mod config;
pub mod http_metrics;
pub mod server;
pub mod telemetry;

pub use config::ServiceConfig;
pub use http_metrics::{HttpMetrics, HttpMetricsSnapshot};
pub use server::{AppState, MetricsResponse, QueryRequest, ServerConfig, app_router, run_server};
pub use telemetry::{LogFormat, init_logging};
