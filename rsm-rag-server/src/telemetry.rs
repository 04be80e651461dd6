//! Log subscriber setup for the server binary.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Attached to every request span so log lines can be attributed to this service.
pub const SERVICE_NAME: &str = "rsm-rag";

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,rsm_rag=info,rsm_rag_server=info,tower_http=info";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, with the current span's fields.
    #[default]
    Json,
    /// Human-readable multi-line output for local development.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("unknown log format '{other}', expected 'json' or 'pretty'")),
        }
    }
}

/// Install the global subscriber. Honors `RUST_LOG`.
pub fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = (format == LogFormat::Json).then(|| {
        fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false)
    });
    let pretty = (format == LogFormat::Pretty).then(|| fmt::layer().pretty().with_target(false));

    tracing_subscriber::registry().with(filter).with(json).with(pretty).try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
