//! Tavily search
//!
//! JSON API search with typed errors and exponential backoff on transient
//! failures (timeouts, connection errors, 429, 5xx).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{SearchHit, SearchProvider};
use crate::error::ProviderError;

const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

/// Default timeout for Tavily API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Tavily caps results per request
const MAX_RESULTS_LIMIT: u32 = 20;

/// Search depth for Tavily API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

/// Topic filter for Tavily API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    #[default]
    General,
    News,
}

/// Web search through the Tavily API
#[derive(Debug, Clone)]
pub struct TavilySearch {
    api_key: String,
    client: Client,
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    max_results: u32,
    search_depth: SearchDepth,
    topic: Topic,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, max_results: usize) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_results: (max_results as u32).clamp(1, MAX_RESULTS_LIMIT),
            search_depth: SearchDepth::default(),
            topic: Topic::default(),
        }
    }

    /// Create from the `TAVILY_API_KEY` environment variable
    pub fn from_env(max_results: usize) -> Result<Self, ProviderError> {
        let api_key = std::env::var("TAVILY_API_KEY").map_err(|_| {
            ProviderError::Search("TAVILY_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key, max_results))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_search_depth(mut self, depth: SearchDepth) -> Self {
        self.search_depth = depth;
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = topic;
        self
    }

    async fn execute_with_retry(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, TavilyError> {
        let mut last_error = TavilyError::Network("no attempts made".to_string());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying Tavily request");
                tokio::time::sleep(delay).await;
            }

            match self.execute_single_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "Tavily request failed, will retry");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn execute_single_request(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, TavilyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TavilyError::Timeout
                } else if e.is_connect() {
                    TavilyError::Connection(e.to_string())
                } else {
                    TavilyError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TavilyResponse>()
                .await
                .map_err(|e| TavilyError::Parse(e.to_string()));
        }

        let error_text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(TavilyError::Unauthorized),
            429 => Err(TavilyError::RateLimited),
            400 => Err(TavilyError::BadRequest(error_text)),
            code @ 500..=599 => Err(TavilyError::Server(code, error_text)),
            code => Err(TavilyError::Status(code, error_text)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum TavilyError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("HTTP error ({0}): {1}")]
    Status(u16, String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl TavilyError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            TavilyError::Timeout
                | TavilyError::Connection(_)
                | TavilyError::RateLimited
                | TavilyError::Server(_, _)
        )
    }
}

impl From<TavilyError> for ProviderError {
    fn from(e: TavilyError) -> Self {
        match e {
            TavilyError::RateLimited => ProviderError::RateLimited("tavily".to_string()),
            TavilyError::Connection(msg) | TavilyError::Network(msg) => ProviderError::Http(msg),
            other => ProviderError::Search(format!("Tavily API error: {}", other)),
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: SearchDepth,
    topic: Topic,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        info!(query = %query, "Performing Tavily search");

        let request = TavilyRequest {
            query,
            max_results: self.max_results,
            search_depth: self.search_depth,
            topic: self.topic,
            include_answer: false,
            include_raw_content: false,
        };

        let response = self.execute_with_retry(&request).await?;
        let hits: Vec<SearchHit> = response
            .results
            .into_iter()
            .map(|r| SearchHit::new(r.url, r.title, r.content, self.name()))
            .collect();

        info!(query = %query, count = hits.len(), "Search completed");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> TavilySearch {
        TavilySearch::new("test-key", 5)
            .with_endpoint(format!("{}/search", server.uri()))
            .with_retry_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_request_serialization() {
        let request = TavilyRequest {
            query: "rust",
            max_results: 5,
            search_depth: SearchDepth::Advanced,
            topic: Topic::News,
            include_answer: false,
            include_raw_content: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["search_depth"], "advanced");
        assert_eq!(json["topic"], "news");
    }

    #[test]
    fn test_max_results_clamped() {
        assert_eq!(TavilySearch::new("k", 0).max_results, 1);
        assert_eq!(TavilySearch::new("k", 100).max_results, MAX_RESULTS_LIMIT);
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            ProviderError::from(TavilyError::RateLimited),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from(TavilyError::Unauthorized),
            ProviderError::Search(_)
        ));
        assert!(!TavilyError::Unauthorized.is_retryable());
        assert!(TavilyError::Server(503, String::new()).is_retryable());
    }

    #[tokio::test]
    async fn test_search_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"query": "rust async"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"title": "Async Book", "url": "https://rust-lang.github.io/async-book/", "content": "Async in Rust", "score": 0.9},
                    {"title": "Tokio", "url": "https://tokio.rs", "content": "Runtime", "score": 0.8}
                ]
            })))
            .mount(&server)
            .await;

        let hits = provider(&server).search("rust async").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Async Book");
        assert_eq!(hits[1].source, "tavily");
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server).search("q").await.unwrap_err();
        assert!(matches!(err, ProviderError::Search(_)));
    }

    #[tokio::test]
    async fn test_server_error_retried_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = provider(&server)
            .with_max_retries(2)
            .search("q")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
