//! Multi-round research pipeline
//!
//! ```text
//!              ┌──────────────────────── ResearchOrchestrator ───────────────────────┐
//!  query ────▶ │ plan ─▶ [ generate queries ─▶ search batch ─▶ reflect ] x depth ─▶ compile │ ─▶ ResearchResult
//!              └───────────────────────────────┬─────────────────────────────────────┘
//!                                              │ per sub-query (concurrent)
//!                                              ▼
//!                 search ─▶ RelevanceClassifier ─▶ ContentHarvester ─▶ AnalysisSynthesizer
//! ```

mod clarifier;
mod classifier;
mod compiler;
mod config;
mod harvester;
mod orchestrator;
mod planner;
mod progress;
mod prompts;
mod quick;
mod result;
mod session;
mod stage;
mod synthesizer;

pub use clarifier::{parse_questions, Clarification, QueryClarifier, MAX_QUESTIONS};
pub use classifier::{CacheStats, RelevanceClassifier, DENYLISTED_DOMAINS};
pub use compiler::{
    renumber_section, unresolved_citations, CitationTable, Renumbered, ReportCompiler,
};
pub use config::{DetailLevel, ResearchConfig};
pub use harvester::{parse_reliability, ContentHarvester, HarvestReport};
pub use orchestrator::{ResearchOrchestrator, ResearchServices};
pub use planner::{parse_subqueries, QueryPlanner, MAX_QUERY_CHARS};
pub use progress::{ChannelObserver, ProgressObserver, SessionSnapshot, TracingObserver};
pub use prompts::ResearchPrompts;
pub use quick::{QuickResult, QuickSearch};
pub use result::{format_elapsed, output_path, CitedSource, ResearchResult, ResearchStats};
pub use session::{
    normalize_url, AnalysisSection, ContentDocument, LedgerEntry, Reliability, ResearchSession,
    SessionCounters, SourceRecord, SubQuery, SubQueryOutcome, TraceEntry,
};
pub use stage::ResearchStage;
pub use synthesizer::AnalysisSynthesizer;
