//! Completion service trait definition
//!
//! Every component that needs a model (planner, classifier, harvester,
//! synthesizer, compiler) talks to it through this one capability.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Core completion capability: `complete(system, user) -> text`
///
/// Implementations must not assume synchronous latency; every call is an
/// await point and may fail independently.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use deep_research::llm::CompletionService;
///
/// struct Echo;
///
/// #[async_trait]
/// impl CompletionService for Echo {
///     async fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
///         Ok(user.to_string())
///     }
///
///     fn name(&self) -> &str { "echo" }
/// }
/// ```
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate a completion for a system instruction and a user prompt
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;

    /// Provider name for logging/debugging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Mock provider for testing
    struct MockCompletion {
        response_prefix: String,
    }

    #[async_trait]
    impl CompletionService for MockCompletion {
        async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
            if system.is_empty() {
                return Err(ProviderError::Completion("missing system prompt".into()));
            }
            Ok(format!("{}: {}", self.response_prefix, user))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_mock_completion() {
        let service = MockCompletion {
            response_prefix: "Echo".to_string(),
        };

        let response = service.complete("be brief", "Hello, world!").await.unwrap();
        assert_eq!(response, "Echo: Hello, world!");
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let service: Arc<dyn CompletionService> = Arc::new(MockCompletion {
            response_prefix: "Dyn".to_string(),
        });

        assert_eq!(service.name(), "mock");
        assert!(service.complete("", "x").await.is_err());
    }
}
