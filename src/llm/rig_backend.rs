//! Completion backends built on Rig
//!
//! Wraps rig-core's Ollama and OpenAI clients behind [`CompletionService`].
//! A fresh agent is built per call because every research stage uses its
//! own system instruction.

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{ollama, openai};
use tracing::debug;

use super::provider::CompletionService;
use crate::error::ProviderError;

/// Which Rig provider a [`RigCompletion`] talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    /// Local Ollama server (default http://localhost:11434)
    Ollama { host: String },
    /// OpenAI API, key read from OPENAI_API_KEY
    OpenAi,
}

enum RigClient {
    Ollama(ollama::Client),
    OpenAi(openai::Client),
}

/// [`CompletionService`] backed by a Rig provider client
pub struct RigCompletion {
    client: RigClient,
    backend_name: &'static str,
    model: String,
    temperature: f64,
}

impl RigCompletion {
    /// Create a completion service for `backend` using `model`.
    pub fn new(backend: LlmBackend, model: impl Into<String>, temperature: f64) -> Self {
        let (client, backend_name) = match backend {
            LlmBackend::Ollama { host } => {
                // Rig's Ollama client reads its base URL from the environment.
                std::env::set_var("OLLAMA_API_BASE_URL", &host);
                (RigClient::Ollama(ollama::Client::from_env()), "ollama")
            }
            LlmBackend::OpenAi => (RigClient::OpenAi(openai::Client::from_env()), "openai"),
        };

        Self {
            client,
            backend_name,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionService for RigCompletion {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        debug!(
            backend = self.backend_name,
            model = %self.model,
            prompt_chars = user.len(),
            "Sending completion request"
        );

        let response = match &self.client {
            RigClient::Ollama(client) => {
                let agent = client
                    .agent(&self.model)
                    .preamble(system)
                    .temperature(self.temperature)
                    .build();
                agent.prompt(user).await
            }
            RigClient::OpenAi(client) => {
                let agent = client
                    .agent(&self.model)
                    .preamble(system)
                    .temperature(self.temperature)
                    .build();
                agent.prompt(user).await
            }
        };

        response.map_err(|e| {
            ProviderError::Completion(format!("{} completion failed: {}", self.backend_name, e))
        })
    }

    fn name(&self) -> &str {
        self.backend_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rig_completion_is_a_service() {
        fn assert_service<T: CompletionService>() {}
        assert_service::<RigCompletion>();
    }

    #[test]
    fn test_ollama_backend_construction() {
        let service = RigCompletion::new(
            LlmBackend::Ollama {
                host: "http://localhost:11434".to_string(),
            },
            "llama3.2",
            0.3,
        );

        assert_eq!(service.name(), "ollama");
        assert_eq!(service.model(), "llama3.2");
    }

    #[tokio::test]
    #[ignore] // Requires a running Ollama server
    async fn test_ollama_complete() {
        let service = RigCompletion::new(
            LlmBackend::Ollama {
                host: "http://localhost:11434".to_string(),
            },
            "llama3.2",
            0.0,
        );

        let response = service
            .complete("Answer with one word.", "Say 'hello' and nothing else.")
            .await
            .unwrap();
        assert!(response.to_lowercase().contains("hello"));
    }
}
