use async_trait::async_trait;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use super::ContentFetcher;
use crate::error::ProviderError;

const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; deep-research/0.1; +https://github.com/deep-research)";

/// Default cap on downloaded body size
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Content containers tried in priority order before falling back to `<body>`
const CONTENT_SELECTORS: [&str; 5] = ["article", "main", "[role=\"main\"]", "#content", "body"];

/// Subtrees that never contribute to main text
const IGNORED_TAGS: [&str; 10] = [
    "script", "style", "nav", "header", "footer", "aside", "form", "noscript", "svg", "iframe",
];

/// Elements that start a new line in the extracted text
const BLOCK_TAGS: [&str; 18] = [
    "p", "div", "section", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "pre",
    "blockquote", "tr", "td", "th", "br",
];

static INLINE_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

/// Fetches pages over HTTP and extracts text with `scraper`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max.max(1);
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        let fetch_err = |reason: String| ProviderError::Fetch {
            url: url.to_string(),
            reason,
        };

        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();

        if !is_textual(&content_type) {
            return Err(fetch_err(format!("unsupported content type {}", content_type)));
        }

        // Stream so an oversized page never gets buffered whole
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.max_body_bytes {
                debug!(url = %url, limit = self.max_body_bytes, "Body truncated at size limit");
                break;
            }
        }
        debug!(url = %url, bytes = body.len(), content_type = %content_type, "Fetched page");

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn extract_main_text(&self, raw: &str) -> String {
        if looks_like_html(raw) {
            extract_html_text(raw)
        } else {
            normalize_lines(raw)
        }
    }
}

fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("xml")
        || content_type.contains("json")
}

fn looks_like_html(raw: &str) -> bool {
    let head: String = raw.chars().take(2048).collect::<String>().to_ascii_lowercase();
    head.contains("<html") || head.contains("<body") || head.contains("<!doctype") || head.contains("<p")
}

/// Extract readable text from an HTML document.
///
/// Picks the first matching content container, then walks its descendants
/// skipping boilerplate subtrees. Block elements become line breaks.
pub fn extract_html_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    let container = CONTENT_SELECTORS.iter().find_map(|sel| {
        Selector::parse(sel)
            .ok()
            .and_then(|selector| doc.select(&selector).next())
    });

    let Some(container) = container else {
        return String::new();
    };

    let mut buf = String::new();
    for node in container.descendants() {
        let ignored = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| IGNORED_TAGS.contains(&e.name()))
                .unwrap_or(false)
        });
        if ignored {
            continue;
        }

        if let Some(element) = node.value().as_element() {
            if BLOCK_TAGS.contains(&element.name()) {
                buf.push('\n');
            }
        } else if let Some(text) = node.value().as_text() {
            buf.push_str(text);
        }
    }

    normalize_lines(&buf)
}

/// Collapse inline whitespace and drop blank lines.
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(|line| INLINE_WS.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
