//! Relevance classifier
//!
//! Two stages: a host denylist that rejects low-signal platforms without any
//! model call, then an LLM judgment cached per `(normalized url, sub-query)`.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::prompts::ResearchPrompts;
use super::session::normalize_url;
use crate::error::with_timeout;
use crate::llm::CompletionService;

/// Social, video and shopping platforms that rarely hold citable research
pub const DENYLISTED_DOMAINS: [&str; 14] = [
    "pinterest.com",
    "instagram.com",
    "facebook.com",
    "twitter.com",
    "youtube.com",
    "tiktok.com",
    "reddit.com",
    "quora.com",
    "linkedin.com",
    "amazon.com",
    "ebay.com",
    "etsy.com",
    "walmart.com",
    "target.com",
];

/// Relevance cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Lookups that needed a judgment call
    pub misses: u64,
    pub evictions: u64,
    pub current_size: usize,
    pub max_size: usize,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

type CacheKey = (String, String);

pub struct RelevanceClassifier {
    llm: Arc<dyn CompletionService>,
    cache: Mutex<LruCache<CacheKey, bool>>,
    stats: Mutex<CacheStats>,
    llm_timeout: Duration,
}

impl RelevanceClassifier {
    pub fn new(llm: Arc<dyn CompletionService>, capacity: usize, llm_timeout: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            llm,
            cache: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats {
                max_size: capacity.get(),
                ..CacheStats::default()
            }),
            llm_timeout,
        }
    }

    /// True when the URL's host is, or is a subdomain of, a denylisted domain
    pub fn is_denylisted(url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        else {
            return false;
        };

        DENYLISTED_DOMAINS
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }

    /// Decide whether a candidate source is worth harvesting for `subquery`.
    ///
    /// A failed judgment counts as not relevant and is not cached.
    pub async fn is_relevant(&self, url: &str, title: &str, snippet: &str, subquery: &str) -> bool {
        if Self::is_denylisted(url) {
            debug!(url = %url, "Rejected denylisted domain");
            return false;
        }

        let key = (normalize_url(url), subquery.trim().to_lowercase());

        // Lock scope ends before the judgment call
        {
            let cached = lock(&self.cache).get(&key).copied();
            let mut stats = lock(&self.stats);
            match cached {
                Some(relevant) => {
                    stats.hits += 1;
                    debug!(url = %url, relevant, "Relevance cache hit");
                    return relevant;
                }
                None => stats.misses += 1,
            }
        }

        let answer = with_timeout(
            "relevance judgment",
            self.llm_timeout,
            self.llm.complete(
                ResearchPrompts::relevance_system(),
                &ResearchPrompts::relevance_user(subquery, url, title, snippet),
            ),
        )
        .await;

        let relevant = match answer {
            Ok(text) => parse_judgment(&text),
            Err(e) => {
                warn!(url = %url, error = %e, "Relevance judgment failed");
                return false;
            }
        };

        // Concurrent misses on the same key may both store; the value is the
        // same judgment either way.
        let mut cache = lock(&self.cache);
        let evicted = cache.push(key.clone(), relevant);
        let mut stats = lock(&self.stats);
        if matches!(evicted, Some((old, _)) if old != key) {
            stats.evictions += 1;
        }
        stats.current_size = cache.len();

        relevant
    }

    pub fn cache_stats(&self) -> CacheStats {
        *lock(&self.stats)
    }

    /// Number of judgment calls issued so far
    pub fn judgment_calls(&self) -> u64 {
        lock(&self.stats).misses
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Relevant iff the answer says RELEVANT and not IRRELEVANT
fn parse_judgment(answer: &str) -> bool {
    let upper = answer.to_uppercase();
    upper.contains("RELEVANT") && !upper.contains("IRRELEVANT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLlm {
        answer: Result<String, ProviderError>,
        calls: AtomicUsize,
    }

    impl CountingLlm {
        fn new(answer: Result<String, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CompletionService for CountingLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn classifier(llm: Arc<CountingLlm>, capacity: usize) -> RelevanceClassifier {
        RelevanceClassifier::new(llm, capacity, Duration::from_secs(5))
    }

    #[test]
    fn test_denylist_matches_subdomains() {
        assert!(RelevanceClassifier::is_denylisted("https://www.reddit.com/r/rust"));
        assert!(RelevanceClassifier::is_denylisted("https://m.youtube.com/watch?v=1"));
        assert!(RelevanceClassifier::is_denylisted("https://twitter.com/x"));
        assert!(!RelevanceClassifier::is_denylisted("https://notreddit.com/"));
        assert!(!RelevanceClassifier::is_denylisted("https://doc.rust-lang.org/"));
        assert!(!RelevanceClassifier::is_denylisted("not a url"));
    }

    #[test]
    fn test_parse_judgment() {
        assert!(parse_judgment("RELEVANT"));
        assert!(parse_judgment("relevant."));
        assert!(!parse_judgment("IRRELEVANT"));
        assert!(!parse_judgment("Irrelevant"));
        assert!(!parse_judgment("maybe"));
    }

    #[tokio::test]
    async fn test_denylisted_makes_no_call() {
        let llm = CountingLlm::new(Ok("RELEVANT".into()));
        let c = classifier(llm.clone(), 10);

        assert!(!c.is_relevant("https://www.pinterest.com/pin/1", "Pin", "", "q").await);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert_eq!(c.judgment_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_is_idempotent() {
        let llm = CountingLlm::new(Ok("RELEVANT".into()));
        let c = classifier(llm.clone(), 10);

        let first = c.is_relevant("https://a.com/x", "A", "s", "rust").await;
        let second = c.is_relevant("https://www.a.com/x/", "A", "s", "Rust").await;

        assert!(first);
        assert_eq!(first, second);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);

        let stats = c.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.current_size, 1);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failed_judgment_not_cached() {
        let llm = CountingLlm::new(Err(ProviderError::Completion("down".into())));
        let c = classifier(llm.clone(), 10);

        assert!(!c.is_relevant("https://a.com", "A", "", "q").await);
        assert!(!c.is_relevant("https://a.com", "A", "", "q").await);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
        assert_eq!(c.cache_stats().current_size, 0);
    }

    #[tokio::test]
    async fn test_eviction_at_capacity() {
        let llm = CountingLlm::new(Ok("IRRELEVANT".into()));
        let c = classifier(llm.clone(), 2);

        for url in ["https://a.com", "https://b.com", "https://c.com"] {
            assert!(!c.is_relevant(url, "", "", "q").await);
        }

        let stats = c.cache_stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.current_size, 2);
        assert_eq!(stats.max_size, 2);

        // Oldest entry was evicted, so it needs a fresh judgment
        c.is_relevant("https://a.com", "", "", "q").await;
        assert_eq!(llm.calls.load(Ordering::SeqCst), 4);
    }
}
