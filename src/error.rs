//! Error types
//!
//! Two layers, mirroring how failures propagate through a research run:
//!
//! - [`ProviderError`]: a single external call (search, fetch, completion)
//!   failed or timed out. These are caught at the smallest scope (per URL,
//!   per sub-query) and turned into absence of data.
//! - [`ResearchError`]: the whole run failed. Only total acquisition failure
//!   and invalid requests surface here.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Failure of one call to an external collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Search failed: {0}")]
    Search(String),

    #[error("Rate limited by {0}, please wait")]
    RateLimited(String),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout {
                operation: "http request",
                after: Duration::ZERO,
            }
        } else {
            ProviderError::Http(e.to_string())
        }
    }
}

/// Top-level failure of a research run
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Every sub-query failed ({attempted} attempted) for query: {query}")]
    TotalAcquisitionFailure { query: String, attempted: usize },

    #[error("Invalid research request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run `fut` with an upper bound on its latency.
///
/// A timeout is reported exactly like a failed call.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            operation,
            after: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Fetch {
            url: "https://example.com".to_string(),
            reason: "404".to_string(),
        };
        assert!(err.to_string().contains("https://example.com"));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let ok = with_timeout("noop", Duration::from_secs(1), async { Ok::<_, ProviderError>(7) })
            .await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let slow = with_timeout("slow call", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ProviderError>(())
        })
        .await;

        assert!(matches!(
            slow,
            Err(ProviderError::Timeout { operation: "slow call", .. })
        ));
    }

    #[test]
    fn test_total_failure_message() {
        let err = ResearchError::TotalAcquisitionFailure {
            query: "q".into(),
            attempted: 3,
        };
        assert!(err.to_string().contains("3 attempted"));
    }
}
