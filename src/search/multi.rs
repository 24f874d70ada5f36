//! Fan-out across several search providers

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{SearchHit, SearchProvider};
use crate::error::ProviderError;
use crate::research::normalize_url;

/// Queries every inner provider concurrently and interleaves their results.
///
/// Hits are taken round-robin (first of each provider, then second, ...) and
/// deduplicated by normalized URL. Fails only when every provider fails.
pub struct MultiSearch {
    providers: Vec<Arc<dyn SearchProvider>>,
}

impl MultiSearch {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>) -> Self {
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl SearchProvider for MultiSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        if self.providers.is_empty() {
            return Err(ProviderError::Search("no search providers configured".to_string()));
        }

        let results = join_all(self.providers.iter().map(|p| p.search(query))).await;

        let mut lists = Vec::new();
        let mut errors = Vec::new();
        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(hits) => {
                    debug!(provider = provider.name(), count = hits.len(), "Provider returned");
                    lists.push(hits.into_iter());
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider failed");
                    errors.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        if lists.is_empty() {
            return Err(ProviderError::Search(errors.join("; ")));
        }

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        loop {
            let mut progressed = false;
            for list in lists.iter_mut() {
                if let Some(hit) = list.next() {
                    progressed = true;
                    if seen.insert(normalize_url(&hit.url)) {
                        merged.push(hit);
                    }
                }
            }
            if !progressed {
                break;
            }
        }

        Ok(merged)
    }

    fn name(&self) -> &str {
        "multi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        hits: Result<Vec<SearchHit>, ProviderError>,
    }

    #[async_trait]
    impl SearchProvider for Fixed {
        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, ProviderError> {
            self.hits.clone()
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn hit(url: &str, source: &str) -> SearchHit {
        SearchHit::new(url, url, "", source)
    }

    #[tokio::test]
    async fn test_interleaves_and_dedupes() {
        let multi = MultiSearch::new(vec![
            Arc::new(Fixed {
                name: "a",
                hits: Ok(vec![hit("https://one.com", "a"), hit("https://two.com", "a")]),
            }),
            Arc::new(Fixed {
                name: "b",
                hits: Ok(vec![hit("https://www.one.com/", "b"), hit("https://three.com", "b")]),
            }),
        ]);

        let hits = multi.search("q").await.unwrap();
        let urls: Vec<_> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["https://one.com", "https://two.com", "https://three.com"]);
    }

    #[tokio::test]
    async fn test_partial_failure_tolerated() {
        let multi = MultiSearch::new(vec![
            Arc::new(Fixed {
                name: "down",
                hits: Err(ProviderError::Search("boom".into())),
            }),
            Arc::new(Fixed {
                name: "up",
                hits: Ok(vec![hit("https://ok.com", "up")]),
            }),
        ]);

        assert_eq!(multi.search("q").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_all_fail() {
        let multi = MultiSearch::new(vec![Arc::new(Fixed {
            name: "down",
            hits: Err(ProviderError::Search("boom".into())),
        })]);

        let err = multi.search("q").await.unwrap_err();
        assert!(err.to_string().contains("down"));
        assert!(MultiSearch::new(vec![]).search("q").await.is_err());
    }
}
