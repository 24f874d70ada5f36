//! Environment configuration
//!
//! Settings for the CLI, loaded from environment variables and an optional
//! `.env` file, plus the wiring that turns them into [`ResearchServices`].

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use crate::fetch::HttpFetcher;
use crate::llm::{LlmBackend, RigCompletion};
use crate::research::{ResearchConfig, ResearchServices};
use crate::search::{DuckDuckGoSearch, MultiSearch, SearchProvider, TavilySearch};

// =============================================================================
// PROVIDER SELECTION
// =============================================================================

/// Completion backend selected by `LLM_PROVIDER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    Ollama,
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => anyhow::bail!("LLM_PROVIDER must be 'ollama' or 'openai', got: {}", other),
        }
    }
}

/// Search backend selected by `SEARCH_PROVIDER`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchBackend {
    #[default]
    DuckDuckGo,
    Tavily,
    /// Every configured provider through [`MultiSearch`]
    All,
}

impl FromStr for SearchBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "tavily" => Ok(Self::Tavily),
            "all" => Ok(Self::All),
            other => anyhow::bail!(
                "SEARCH_PROVIDER must be 'duckduckgo', 'tavily' or 'all', got: {}",
                other
            ),
        }
    }
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_provider: LlmProvider,

    /// Ollama model (e.g. "llama3.2")
    pub ollama_model: String,

    /// Ollama server URL
    pub ollama_host: String,

    pub openai_model: String,

    /// 0.0 = deterministic, 2.0 = most creative
    pub temperature: f64,

    pub search_provider: SearchBackend,

    pub tavily_api_key: Option<String>,

    /// Hits requested from each search provider per query
    pub max_search_results: usize,

    /// Default rounds when the CLI does not pass `--depth`
    pub research_depth: usize,

    /// Default sub-queries per round when the CLI does not pass `--breadth`
    pub research_breadth: usize,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: LlmProvider::Ollama,
            ollama_model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
            search_provider: SearchBackend::DuckDuckGo,
            tavily_api_key: None,
            max_search_results: 10,
            research_depth: 2,
            research_breadth: 4,
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(val) = get("LLM_PROVIDER") {
            config.llm_provider = val.parse()?;
        }
        if let Some(val) = get("OLLAMA_MODEL") {
            config.ollama_model = val;
        }
        if let Some(val) = get("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }
        if let Some(val) = get("OPENAI_MODEL") {
            config.openai_model = val;
        }
        if let Some(val) = get("TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("TEMPERATURE must be a valid floating-point number (e.g., 0.5)")?;
        }
        if let Some(val) = get("SEARCH_PROVIDER") {
            config.search_provider = val.parse()?;
        }
        config.tavily_api_key = get("TAVILY_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(val) = get("MAX_SEARCH_RESULTS") {
            config.max_search_results = val
                .parse()
                .context("MAX_SEARCH_RESULTS must be a valid positive integer")?;
        }
        if let Some(val) = get("RESEARCH_DEPTH") {
            config.research_depth = val
                .parse()
                .context("RESEARCH_DEPTH must be a non-negative integer")?;
        }
        if let Some(val) = get("RESEARCH_BREADTH") {
            config.research_breadth = val
                .parse()
                .context("RESEARCH_BREADTH must be a non-negative integer")?;
        }
        if let Some(val) = get("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Fail fast on values the run could not work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }
        if self.max_search_results == 0 {
            anyhow::bail!("MAX_SEARCH_RESULTS must be at least 1");
        }
        if self.active_model().trim().is_empty() {
            anyhow::bail!("Model name cannot be empty");
        }
        if matches!(self.search_provider, SearchBackend::Tavily) && self.tavily_api_key.is_none() {
            anyhow::bail!("SEARCH_PROVIDER=tavily requires TAVILY_API_KEY");
        }
        if self.llm_provider == LlmProvider::OpenAi && env::var("OPENAI_API_KEY").is_err() {
            anyhow::bail!("LLM_PROVIDER=openai requires OPENAI_API_KEY");
        }
        Ok(())
    }

    /// Model name for the selected provider
    pub fn active_model(&self) -> &str {
        match self.llm_provider {
            LlmProvider::Ollama => &self.ollama_model,
            LlmProvider::OpenAi => &self.openai_model,
        }
    }

    /// Override the model of the selected provider
    pub fn set_model(&mut self, model: impl Into<String>) {
        match self.llm_provider {
            LlmProvider::Ollama => self.ollama_model = model.into(),
            LlmProvider::OpenAi => self.openai_model = model.into(),
        }
    }

    /// Search providers for the selected backend
    pub fn search_provider(&self) -> Result<Arc<dyn SearchProvider>> {
        let ddg = || Arc::new(DuckDuckGoSearch::new(self.max_search_results)) as Arc<dyn SearchProvider>;
        let tavily = |key: &str| {
            Arc::new(TavilySearch::new(key, self.max_search_results)) as Arc<dyn SearchProvider>
        };

        Ok(match (self.search_provider, self.tavily_api_key.as_deref()) {
            (SearchBackend::DuckDuckGo, _) => ddg(),
            (SearchBackend::Tavily, Some(key)) => tavily(key),
            (SearchBackend::Tavily, None) => anyhow::bail!("TAVILY_API_KEY is not set"),
            (SearchBackend::All, Some(key)) => Arc::new(MultiSearch::new(vec![ddg(), tavily(key)])),
            (SearchBackend::All, None) => Arc::new(MultiSearch::new(vec![ddg()])),
        })
    }

    /// Build the collaborators a research run needs
    pub fn build_services(&self, research: &ResearchConfig) -> Result<ResearchServices> {
        let backend = match self.llm_provider {
            LlmProvider::Ollama => LlmBackend::Ollama {
                host: self.ollama_host.clone(),
            },
            LlmProvider::OpenAi => LlmBackend::OpenAi,
        };

        Ok(ResearchServices {
            llm: Arc::new(RigCompletion::new(backend, self.active_model(), self.temperature)),
            search: self.search_provider()?,
            fetcher: Arc::new(HttpFetcher::new(research.fetch_timeout)),
        })
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm_provider, LlmProvider::Ollama);
        assert_eq!(config.active_model(), "llama3.2");
        assert_eq!(config.ollama_host, "http://localhost:11434");
        assert_eq!(config.search_provider, SearchBackend::DuckDuckGo);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("OLLAMA_MODEL", "qwen2.5"),
            ("TEMPERATURE", "0.2"),
            ("SEARCH_PROVIDER", "all"),
            ("TAVILY_API_KEY", "tvly-123"),
            ("RESEARCH_DEPTH", "3"),
            ("RESEARCH_BREADTH", "5"),
        ]))
        .unwrap();

        assert_eq!(config.active_model(), "qwen2.5");
        assert!((config.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.search_provider, SearchBackend::All);
        assert_eq!(config.tavily_api_key.as_deref(), Some("tvly-123"));
        assert_eq!(config.research_depth, 3);
        assert_eq!(config.research_breadth, 5);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("TEMPERATURE", "warm")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LLM_PROVIDER", "claude")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SEARCH_PROVIDER", "bing")])).is_err());
    }

    #[test]
    fn test_validation_invalid_values() {
        let mut config = Config::default();
        config.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_search_results = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search_provider = SearchBackend::Tavily;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_model_targets_active_provider() {
        let mut config = Config::default();
        config.set_model("mistral");
        assert_eq!(config.ollama_model, "mistral");
        assert_eq!(config.openai_model, "gpt-4o-mini");
    }

    #[test]
    fn test_search_provider_selection() {
        let config = Config::default();
        assert_eq!(config.search_provider().unwrap().name(), "duckduckgo");

        let mut config = Config::default();
        config.search_provider = SearchBackend::All;
        assert_eq!(config.search_provider().unwrap().name(), "multi");

        config.search_provider = SearchBackend::Tavily;
        assert!(config.search_provider().is_err());
    }
}
