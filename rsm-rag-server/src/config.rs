//! Service configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use rsm_rag::RagConfig;

use crate::server::ServerConfig;
use crate::telemetry::LogFormat;

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub rag: RagConfig,
    pub log_format: LogFormat,
    pub openai_api_key: Option<String>,
}

impl ServiceConfig {
    /// Read the configuration from process environment variables, loading
    /// `.env` first when one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are errors.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = RagConfig::default();
        let server_defaults = ServerConfig::default();

        let mut rag = RagConfig::builder()
            .chunk_size(parse_or(&lookup, "RAG_CHUNK_SIZE", defaults.chunk_size)?)
            .chunk_overlap(parse_or(&lookup, "RAG_CHUNK_OVERLAP", defaults.chunk_overlap)?)
            .top_k(parse_or(&lookup, "RAG_TOP_K", defaults.top_k)?)
            .provider_timeout(Duration::from_secs(parse_or(
                &lookup,
                "RAG_PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout().as_secs(),
            )?))
            .idempotent_ids(parse_or(&lookup, "RAG_IDEMPOTENT_IDS", defaults.idempotent_ids)?);
        if let Some(subject) = non_empty(&lookup, "RAG_SUBJECT") {
            rag = rag.subject(subject);
        }

        Ok(Self {
            server: ServerConfig {
                host: non_empty(&lookup, "RAG_HOST").unwrap_or(server_defaults.host),
                port: parse_or(&lookup, "RAG_PORT", server_defaults.port)?,
            },
            rag: rag.build().context("invalid RAG configuration")?,
            log_format: match non_empty(&lookup, "RAG_LOG_FORMAT") {
                Some(value) => value.parse().map_err(|e: String| anyhow!("RAG_LOG_FORMAT: {e}"))?,
                None => LogFormat::default(),
            },
            openai_api_key: non_empty(&lookup, "OPENAI_API_KEY"),
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().map_err(|e| anyhow!("{key}={raw:?} is invalid: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(pairs: &[(&str, &str)]) -> anyhow::Result<ServiceConfig> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServiceConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = from(&[]).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.provider_timeout(), Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let config = from(&[
            ("RAG_PORT", "9000"),
            ("RAG_CHUNK_SIZE", "500"),
            ("RAG_CHUNK_OVERLAP", "50"),
            ("RAG_TOP_K", "3"),
            ("RAG_SUBJECT", "Rust programming"),
            ("RAG_LOG_FORMAT", "pretty"),
            ("RAG_IDEMPOTENT_IDS", "true"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 50);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.subject, "Rust programming");
        assert!(config.rag.idempotent_ids);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn unparsable_values_are_errors() {
        let err = from(&[("RAG_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("RAG_PORT"));
    }

    #[test]
    fn inconsistent_chunking_is_rejected() {
        assert!(from(&[("RAG_CHUNK_SIZE", "100"), ("RAG_CHUNK_OVERLAP", "100")]).is_err());
    }
}
