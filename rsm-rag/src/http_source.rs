//! HTTP document source.
//!
//! This module is only available when the `http` feature is enabled.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::source::DocumentSource;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static MAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<main\b[^>]*>(.*)</main>").expect("valid regex"));
static ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<article\b[^>]*>(.*)</article>").expect("valid regex"));
static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*)</body>").expect("valid regex"));
static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|nav|header|footer|noscript)\b[^>]*>.*?</(script|style|nav|header|footer|noscript)>")
        .expect("valid regex")
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Reduce an HTML page to its visible text.
///
/// Keeps the `<main>` element if present, else `<article>`, else `<body>`,
/// drops scripts, styles and navigation, removes all tags, decodes the common
/// entities and collapses whitespace to single spaces.
pub fn html_to_text(html: &str) -> String {
    let content = [&*MAIN_RE, &*ARTICLE_RE, &*BODY_RE]
        .iter()
        .find_map(|re| re.captures(html).and_then(|c| c.get(1)))
        .map_or(html, |m| m.as_str());

    let without_noise = NOISE_RE.replace_all(content, " ");
    let without_comments = COMMENT_RE.replace_all(&without_noise, " ");
    let without_tags = TAG_RE.replace_all(&without_comments, " ");
    let decoded = decode_entities(&without_tags);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// A source assembled from one or more web pages.
///
/// Pages are fetched in order. A page that fails is logged and skipped; the
/// source only fails when no page yields any text. Multi-page sources prefix
/// each page with a `Chapter: <page>` header.
///
/// # Example
///
/// ```rust,ignore
/// use rsm_rag::http_source::HttpDocumentSource;
///
/// let pep8 = HttpDocumentSource::new("PEP 8", "https://peps.python.org/pep-0008/");
/// let document = pep8.load().await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    client: reqwest::Client,
    label: String,
    pages: Vec<String>,
    page_headers: bool,
    timeout: Duration,
}

impl HttpDocumentSource {
    /// A single-page source.
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            label: label.into(),
            pages: vec![url.into()],
            page_headers: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A multi-page source whose pages are joined with `Chapter:` headers.
    pub fn pages<I, S>(label: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client: reqwest::Client::new(),
            label: label.into(),
            pages: urls.into_iter().map(Into::into).collect(),
            page_headers: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Share an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Set the per-page request timeout (default 30 seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("server returned {status}"));
        }
        let body = response.text().await.map_err(|e| format!("failed to read body: {e}"))?;
        Ok(html_to_text(&body))
    }
}

/// The last non-empty path segment of a URL, used as the page name.
fn page_name(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn load(&self) -> Result<Document> {
        let mut parts = Vec::with_capacity(self.pages.len());
        let mut last_error = None;

        for url in &self.pages {
            match self.fetch(url).await {
                Ok(text) if text.is_empty() => {
                    warn!(source = %self.label, url = %url, "page has no text content");
                }
                Ok(text) => {
                    debug!(source = %self.label, url = %url, text_len = text.len(), "page loaded");
                    if self.page_headers {
                        parts.push(format!("Chapter: {}\n\n{text}", page_name(url)));
                    } else {
                        parts.push(text);
                    }
                }
                Err(message) => {
                    warn!(source = %self.label, url = %url, error = %message, "page load failed");
                    last_error = Some(message);
                }
            }
        }

        if parts.is_empty() {
            return Err(RagError::SourceLoad {
                source_label: self.label.clone(),
                message: last_error.unwrap_or_else(|| "no text content found".to_string()),
            });
        }
        Ok(Document::new(self.label.clone(), parts.join("\n\n")))
    }
}

/// The two sources of the default corpus: the Think Python book (chapters 1
/// to 19) and PEP 8.
pub fn default_corpus(client: reqwest::Client) -> Vec<Arc<dyn DocumentSource>> {
    let chapters = (1..20)
        .map(|i| format!("https://allendowney.github.io/ThinkPython/chap{i:02}.html"));
    vec![
        Arc::new(HttpDocumentSource::pages("Think Python", chapters).with_client(client.clone())),
        Arc::new(
            HttpDocumentSource::new("PEP 8", "https://peps.python.org/pep-0008/")
                .with_client(client),
        ),
    ]
}
