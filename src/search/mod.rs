//! Search providers
//!
//! The orchestrator only needs `search(query) -> hits`. Result order is
//! treated as relevance-ranked, but every hit still goes through the
//! relevance classifier before it is harvested.
//!
//! - [`DuckDuckGoSearch`]: free HTML endpoint, no API key
//! - [`TavilySearch`]: Tavily JSON API with retry and backoff
//! - [`MultiSearch`]: fans one query out to several providers

mod duckduckgo;
mod multi;
mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProviderError;

pub use duckduckgo::DuckDuckGoSearch;
pub use multi::MultiSearch;
pub use tavily::{SearchDepth, TavilySearch, Topic};

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Name of the engine that produced the hit
    pub source: String,
}

impl SearchHit {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            source: source.into(),
        }
    }

    /// Only absolute http(s) URLs can be harvested
    pub fn is_fetchable(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

/// A search engine the orchestrator can query
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query. Zero hits is a success.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError>;

    /// Provider name recorded on every hit
    fn name(&self) -> &str;
}

/// Extract the host from a URL, used as a fallback title.
pub(crate) fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.example.com/page"),
            Some("www.example.com".to_string())
        );
        assert_eq!(
            extract_domain("https://rust-lang.org/learn"),
            Some("rust-lang.org".to_string())
        );
        assert_eq!(
            extract_domain("https://user:pw@docs.rs:8443/a//b?q=1"),
            Some("docs.rs".to_string())
        );
        assert_eq!(extract_domain("not a url"), None);
        assert_eq!(extract_domain("mailto:someone@example.com"), None);
    }

    #[test]
    fn test_fetchable() {
        assert!(SearchHit::new("https://a.com", "A", "", "test").is_fetchable());
        assert!(!SearchHit::new("ftp://a.com", "A", "", "test").is_fetchable());
        assert!(!SearchHit::new("/relative", "A", "", "test").is_fetchable());
    }

    #[test]
    fn test_search_hit_serialization() {
        let hit = SearchHit::new("https://test.com", "Test", "A test result", "duckduckgo");
        let json = serde_json::to_string(&hit).unwrap();
        assert!(json.contains("\"source\":\"duckduckgo\""));
    }
}
