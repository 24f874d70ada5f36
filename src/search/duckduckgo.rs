//! DuckDuckGo HTML search
//!
//! DuckDuckGo has no free JSON web-search API, so this provider queries the
//! HTML endpoint and parses result blocks. Result links are redirect URLs
//! carrying the target in the `uddg` parameter.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{extract_domain, SearchHit, SearchProvider};
use crate::error::ProviderError;

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static RESULT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.result").expect("valid selector"));
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid selector"));
static SNIPPET_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").expect("valid selector"));

/// Web search through DuckDuckGo's HTML endpoint
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
    max_results: usize,
    /// Pause before each request to stay under the endpoint's rate limit
    request_delay: Duration,
}

impl DuckDuckGoSearch {
    /// Create a provider returning at most `max_results` hits per query.
    pub fn new(max_results: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_results,
            request_delay: Duration::from_millis(500),
        }
    }

    /// Point the provider at a different endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Parse a results page into hits, in page order.
    fn parse_results(&self, html: &str) -> Vec<SearchHit> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        for block in document.select(&RESULT_SEL) {
            if hits.len() >= self.max_results {
                break;
            }
            let Some(link) = block.select(&LINK_SEL).next() else {
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(resolve_href) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }

            let title = collapse(&link.text().collect::<String>());
            let snippet = block
                .select(&SNIPPET_SEL)
                .next()
                .map(|s| collapse(&s.text().collect::<String>()))
                .unwrap_or_default();

            hits.push(SearchHit {
                title: if title.is_empty() {
                    extract_domain(&url).unwrap_or_else(|| "Result".to_string())
                } else {
                    title
                },
                url,
                snippet,
                source: self.name().to_string(),
            });
        }

        // Markup changed: fall back to scanning redirect parameters directly.
        if hits.is_empty() {
            for segment in html.split("uddg=").skip(1) {
                if hits.len() >= self.max_results {
                    break;
                }
                let Some(url) = resolve_href(&format!("uddg={}", segment)) else {
                    continue;
                };
                if seen.insert(url.clone()) {
                    hits.push(SearchHit {
                        title: extract_domain(&url).unwrap_or_else(|| "Result".to_string()),
                        url,
                        snippet: String::new(),
                        source: self.name().to_string(),
                    });
                }
            }
        }

        hits
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        info!(query = %query, "Performing DuckDuckGo search");

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        debug!(url = %url, "Fetching search results");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(self.name().to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Search(format!("DuckDuckGo returned HTTP {}", status)));
        }

        let body = response.text().await?;
        let hits = self.parse_results(&body);

        if hits.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = hits.len(), "Search completed");
        }

        Ok(hits)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// Turn a result href into the target URL, skipping DuckDuckGo-internal links.
fn resolve_href(href: &str) -> Option<String> {
    let target = if let Some(idx) = href.find("uddg=") {
        let encoded = &href[idx + 5..];
        let end = encoded
            .find(|c| c == '&' || c == '"' || c == '\'')
            .unwrap_or(encoded.len());
        urlencoding::decode(&encoded[..end]).ok()?.into_owned()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        href.to_string()
    };

    let internal = extract_domain(&target)
        .map(|d| d.ends_with("duckduckgo.com"))
        .unwrap_or(true);
    if target.starts_with("http") && !internal {
        Some(target)
    } else {
        None
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
