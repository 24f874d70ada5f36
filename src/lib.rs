//! deep-research: multi-round research engine on Rig
//!
//! Takes a natural-language query, plans and runs several rounds of web
//! search, filters and harvests the results, and compiles a cited report.
//!
//! - `CompletionService` trait: model calls (Ollama or OpenAI via Rig)
//! - `SearchProvider` trait: DuckDuckGo, Tavily, or both at once
//! - `ContentFetcher` trait: page fetching and main-text extraction
//! - `ResearchOrchestrator`: the plan / search / reflect / compile loop
//!
//! ```rust,ignore
//! use deep_research::{Config, ResearchConfig, ResearchOrchestrator};
//!
//! let research = ResearchConfig::default();
//! let services = Config::from_env()?.build_services(&research)?;
//! let orchestrator = ResearchOrchestrator::new(services, research);
//!
//! let result = orchestrator.run("How do solid-state batteries work?", 2, 3).await?;
//! println!("{}", result.to_markdown(false));
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod research;
pub mod search;

// Re-exports for convenience
pub use config::{Config, LlmProvider, SearchBackend};
pub use error::{ProviderError, ResearchError};
pub use fetch::{ContentFetcher, HttpFetcher};
pub use llm::{CompletionService, LlmBackend, RigCompletion};
pub use search::{DuckDuckGoSearch, MultiSearch, SearchHit, SearchProvider, TavilySearch};

pub use research::{
    ChannelObserver, Clarification, DetailLevel, ProgressObserver, QueryClarifier, QuickResult,
    QuickSearch, ResearchConfig, ResearchOrchestrator, ResearchResult, ResearchServices,
    ResearchStage, SessionSnapshot, TracingObserver,
};
