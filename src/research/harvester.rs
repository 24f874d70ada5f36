//! Content harvester
//!
//! For each selected source: fetch, extract main text, then issue the
//! reliability rating and the query-focused extraction as two concurrent
//! completion calls. All URLs of one sub-query run behind a join barrier.

use futures::future::join_all;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::prompts::ResearchPrompts;
use super::session::{ContentDocument, Reliability, SourceRecord};
use crate::error::{with_timeout, ProviderError};
use crate::fetch::ContentFetcher;
use crate::llm::CompletionService;

static RATING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(HIGH|MEDIUM|LOW)\b").expect("valid regex"));

/// What one harvest produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestReport {
    /// Surviving documents, in source order
    pub documents: Vec<ContentDocument>,
    /// Documents rated LOW and discarded
    pub dropped_low: usize,
    /// URLs that could not be fetched or analyzed
    pub failures: usize,
    pub notes: Vec<String>,
}

pub struct ContentHarvester {
    fetcher: Arc<dyn ContentFetcher>,
    llm: Arc<dyn CompletionService>,
    max_urls: usize,
    max_document_chars: usize,
    fetch_timeout: Duration,
    llm_timeout: Duration,
}

impl ContentHarvester {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, llm: Arc<dyn CompletionService>) -> Self {
        Self {
            fetcher,
            llm,
            max_urls: 5,
            max_document_chars: 8000,
            fetch_timeout: Duration::from_secs(20),
            llm_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_limits(mut self, max_urls: usize, max_document_chars: usize) -> Self {
        self.max_urls = max_urls;
        self.max_document_chars = max_document_chars;
        self
    }

    pub fn with_timeouts(mut self, fetch: Duration, llm: Duration) -> Self {
        self.fetch_timeout = fetch;
        self.llm_timeout = llm;
        self
    }

    /// Harvest at most `max_urls` of `sources` for `subquery`.
    ///
    /// Per-URL failures are counted, never propagated.
    pub async fn harvest(&self, sources: &[SourceRecord], subquery: &str) -> HarvestReport {
        let selected = &sources[..sources.len().min(self.max_urls)];
        info!(subquery = %subquery, urls = selected.len(), "Harvesting content");

        let results = join_all(selected.iter().map(|s| self.harvest_one(s, subquery))).await;

        let mut report = HarvestReport::default();
        for (source, result) in selected.iter().zip(results) {
            match result {
                Ok(doc) if doc.reliability == Reliability::Low => {
                    report.dropped_low += 1;
                    report
                        .notes
                        .push(format!("Dropped low-reliability source: {}", source.url));
                }
                Ok(doc) => report.documents.push(doc),
                Err(e) => {
                    warn!(url = %source.url, error = %e, "Harvest failed");
                    report.failures += 1;
                    report
                        .notes
                        .push(format!("Failed to harvest {}: {}", source.url, e));
                }
            }
        }

        debug!(
            subquery = %subquery,
            kept = report.documents.len(),
            dropped_low = report.dropped_low,
            failures = report.failures,
            "Harvest complete"
        );
        report
    }

    async fn harvest_one(
        &self,
        source: &SourceRecord,
        subquery: &str,
    ) -> Result<ContentDocument, ProviderError> {
        let raw = with_timeout("fetch", self.fetch_timeout, self.fetcher.fetch(&source.url)).await?;

        let text = self.fetcher.extract_main_text(&raw);
        if text.trim().is_empty() {
            return Err(ProviderError::Fetch {
                url: source.url.clone(),
                reason: "no extractable text".to_string(),
            });
        }
        let text = truncate_chars(&text, self.max_document_chars);

        let rating_prompt =
            ResearchPrompts::reliability_user(&source.url, &source.title, subquery, text);
        let extraction_prompt =
            ResearchPrompts::extraction_user(&source.url, &source.title, subquery, text);

        let rate = with_timeout(
            "reliability rating",
            self.llm_timeout,
            self.llm.complete(ResearchPrompts::reliability_system(), &rating_prompt),
        );
        let extract = with_timeout(
            "content extraction",
            self.llm_timeout,
            self.llm.complete(ResearchPrompts::extraction_system(), &extraction_prompt),
        );
        let (rating, extraction) = tokio::join!(rate, extract);

        let (reliability, justification, content) = match (rating, extraction) {
            (Err(rate_err), Err(_)) => return Err(rate_err),
            (Ok(rating), Ok(content)) => {
                let (reliability, justification) = parse_reliability(&rating);
                (reliability, justification, content)
            }
            (Ok(rating), Err(e)) => {
                debug!(url = %source.url, error = %e, "Extraction failed, using main text");
                let (reliability, justification) = parse_reliability(&rating);
                (reliability, justification, text.to_string())
            }
            (Err(e), Ok(content)) => {
                debug!(url = %source.url, error = %e, "Rating failed, assuming MEDIUM");
                (
                    Reliability::Medium,
                    "Reliability rating unavailable".to_string(),
                    content,
                )
            }
        };

        Ok(ContentDocument {
            source: source.clone(),
            content: content.trim().to_string(),
            reliability,
            justification,
        })
    }
}

/// Parse `RELIABILITY: [HIGH/MEDIUM/LOW] justification`.
///
/// Anything unparseable rates MEDIUM.
pub fn parse_reliability(answer: &str) -> (Reliability, String) {
    let upper = answer.to_ascii_uppercase();
    let (line, offset) = match upper.find("RELIABILITY:") {
        Some(idx) => {
            let start = idx + "RELIABILITY:".len();
            let end = upper[start..].find('\n').map_or(upper.len(), |n| start + n);
            (&upper[start..end], start)
        }
        None => (upper.lines().next().unwrap_or(""), 0),
    };

    let Some(found) = RATING.find(line) else {
        return (Reliability::Medium, "No reliability rating provided".to_string());
    };
    let reliability = match found.as_str() {
        "HIGH" => Reliability::High,
        "LOW" => Reliability::Low,
        _ => Reliability::Medium,
    };

    // ASCII uppercasing keeps byte offsets aligned with `answer`
    let punctuation =
        |c: char| matches!(c, '[' | ']' | '(' | ')' | '-' | ':' | ',' | '.') || c.is_whitespace();
    let after = answer
        .get(offset + found.end()..offset + line.len())
        .unwrap_or("")
        .trim_matches(punctuation);
    let justification = if after.is_empty() {
        answer
            .get(offset..offset + found.start())
            .unwrap_or("")
            .trim_matches(punctuation)
    } else {
        after
    }
    .to_string();

    (reliability, justification)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl ContentFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
            self.pages.get(url).cloned().ok_or_else(|| ProviderError::Fetch {
                url: url.to_string(),
                reason: "404".to_string(),
            })
        }

        fn extract_main_text(&self, raw: &str) -> String {
            raw.trim().to_string()
        }
    }

    /// Rates by looking for a marker word in the page content
    struct MarkerLlm;

    #[async_trait]
    impl CompletionService for MarkerLlm {
        async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
            if system.contains("RELIABILITY:") {
                let rating = if user.contains("spam") { "LOW" } else { "HIGH" };
                Ok(format!("RELIABILITY: {} - checked", rating))
            } else if user.contains("flaky") {
                Err(ProviderError::Completion("extraction refused".into()))
            } else {
                Ok("Extracted facts".to_string())
            }
        }

        fn name(&self) -> &str {
            "marker"
        }
    }

    fn source(url: &str) -> SourceRecord {
        SourceRecord {
            url: url.to_string(),
            title: "Title".to_string(),
            snippet: String::new(),
            provider: "test".to_string(),
        }
    }

    fn harvester(pages: &[(&str, &str)]) -> ContentHarvester {
        let fetcher = StaticFetcher {
            pages: pages
                .iter()
                .map(|(u, p)| (u.to_string(), p.to_string()))
                .collect(),
        };
        ContentHarvester::new(Arc::new(fetcher), Arc::new(MarkerLlm))
    }

    #[test]
    fn test_parse_reliability() {
        let (r, why) = parse_reliability("RELIABILITY: HIGH - peer reviewed journal");
        assert_eq!(r, Reliability::High);
        assert_eq!(why, "peer reviewed journal");

        let (r, why) = parse_reliability("Some preamble\nReliability: [LOW] anonymous blog");
        assert_eq!(r, Reliability::Low);
        assert_eq!(why, "anonymous blog");

        let (r, _) = parse_reliability("I cannot tell");
        assert_eq!(r, Reliability::Medium);
    }

    #[test]
    fn test_parse_reliability_matches_whole_words() {
        let (r, why) = parse_reliability("RELIABILITY: Widely followed outlet, HIGH");
        assert_eq!(r, Reliability::High);
        assert_eq!(why, "Widely followed outlet");

        let (r, _) = parse_reliability("Following the criteria below, I rate this source HIGH.");
        assert_eq!(r, Reliability::High);

        let (r, why) = parse_reliability("RELIABILITY: Not highly rigorous, LOW");
        assert_eq!(r, Reliability::Low);
        assert_eq!(why, "Not highly rigorous");

        let (r, _) = parse_reliability("RELIABILITY: Lowercase medium works too");
        assert_eq!(r, Reliability::Medium);
    }

    #[test]
    fn test_truncate_chars_is_boundary_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_harvest_isolates_failures_and_drops_low() {
        let h = harvester(&[
            ("https://good.com", "solid content"),
            ("https://spam.com", "spam content"),
        ]);
        let sources = vec![
            source("https://good.com"),
            source("https://missing.com"),
            source("https://spam.com"),
        ];

        let report = h.harvest(&sources, "q").await;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].source.url, "https://good.com");
        assert_eq!(report.documents[0].content, "Extracted facts");
        assert_eq!(report.documents[0].justification, "checked");
        assert_eq!(report.dropped_low, 1);
        assert_eq!(report.failures, 1);
        assert_eq!(report.notes.len(), 2);
    }

    #[tokio::test]
    async fn test_harvest_respects_url_bound() {
        let pages: Vec<(String, String)> = (0..8)
            .map(|i| (format!("https://s{}.com", i), "content".to_string()))
            .collect();
        let refs: Vec<(&str, &str)> = pages.iter().map(|(u, p)| (u.as_str(), p.as_str())).collect();
        let sources: Vec<SourceRecord> = pages.iter().map(|(u, _)| source(u)).collect();

        let report = harvester(&refs).harvest(&sources, "q").await;
        assert_eq!(report.documents.len(), 5);
    }

    #[tokio::test]
    async fn test_extraction_failure_falls_back_to_main_text() {
        let h = harvester(&[("https://flaky.com", "flaky page body")]).with_limits(5, 5);
        let report = h.harvest(&[source("https://flaky.com")], "q").await;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].content, "flaky");
    }

    #[tokio::test]
    async fn test_empty_input() {
        let report = harvester(&[]).harvest(&[], "q").await;
        assert_eq!(report, HarvestReport::default());
    }
}
