//! Research session state
//!
//! [`ResearchSession`] is the root aggregate of one run. Only the
//! orchestrator mutates it; sub-query pipelines return a
//! [`SubQueryOutcome`] which is merged with [`ResearchSession::apply_outcome`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::stage::ResearchStage;
use crate::search::SearchHit;

/// Identity key for a source URL.
///
/// Lower-cases scheme and host, drops the fragment, a leading `www.`, the
/// default port and a trailing `/`. The query string is kept verbatim.
/// Unparseable input normalizes to its trimmed lower-cased text.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };
    let Some(host) = url.host_str() else {
        return trimmed.to_lowercase();
    };

    let host = host.strip_prefix("www.").unwrap_or(host);
    let mut out = format!("{}://{}", url.scheme(), host);
    // Url::port() is None when the port is the scheme default
    if let Some(port) = url.port() {
        out.push_str(&format!(":{}", port));
    }
    out.push_str(url.path().trim_end_matches('/'));
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }
    out
}

/// A derived search string and the round that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuery {
    pub text: String,
    pub round: usize,
}

impl SubQuery {
    pub fn new(text: impl Into<String>, round: usize) -> Self {
        Self {
            text: text.into(),
            round,
        }
    }
}

impl fmt::Display for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// One discovery of a source by a sub-query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Search provider that returned it
    pub provider: String,
}

impl SourceRecord {
    pub fn key(&self) -> String {
        normalize_url(&self.url)
    }
}

impl From<SearchHit> for SourceRecord {
    fn from(hit: SearchHit) -> Self {
        Self {
            url: hit.url,
            title: hit.title,
            snippet: hit.snippet,
            provider: hit.source,
        }
    }
}

/// Trustworthiness judgment for a harvested document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Reliability {
    High,
    #[default]
    Medium,
    Low,
}

impl Reliability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Harvested text for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDocument {
    pub source: SourceRecord,
    pub content: String,
    pub reliability: Reliability,
    pub justification: String,
}

/// Synthesized analysis for one sub-query.
///
/// `text` cites documents as `[1]..[k]`, indexing into `source_urls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub subquery: SubQuery,
    pub text: String,
    pub source_urls: Vec<String>,
}

impl AnalysisSection {
    pub fn empty(subquery: SubQuery) -> Self {
        Self {
            subquery,
            text: String::new(),
            source_urls: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Labeled section of the findings ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEntry {
    Plan { text: String },
    Reflection { round: usize, notes: String },
    Analysis(AnalysisSection),
}

impl LedgerEntry {
    /// Render as markdown for prompts and fallback reports
    pub fn render(&self) -> String {
        match self {
            Self::Plan { text } => {
                format!("# Research Plan\n\n{}\n\n# Initial Findings\n\n", text.trim())
            }
            Self::Reflection { notes, .. } => {
                format!("## Reflection on Current Findings\n\n{}\n\n", notes.trim())
            }
            Self::Analysis(section) => format!(
                "## Research on '{}':\n\n{}\n\n",
                section.subquery.text,
                section.text.trim()
            ),
        }
    }
}

/// Chain-of-thought entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub at: DateTime<Utc>,
    pub stage: ResearchStage,
    pub message: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Everything one sub-query pipeline produced.
///
/// Returned to the orchestrator instead of writing into the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQueryOutcome {
    pub subquery: SubQuery,
    /// The search call failed or timed out
    pub failed: bool,
    /// Raw hits returned by search
    pub search_hits: usize,
    /// Hits selected for harvesting, in rank order
    pub sources: Vec<SourceRecord>,
    pub section: Option<AnalysisSection>,
    pub rejected: usize,
    pub dropped_low: usize,
    pub fetch_failures: usize,
    /// Trace messages, appended in order on merge
    pub notes: Vec<String>,
}

impl SubQueryOutcome {
    pub fn new(subquery: SubQuery) -> Self {
        Self {
            subquery,
            failed: false,
            search_hits: 0,
            sources: Vec::new(),
            section: None,
            rejected: 0,
            dropped_low: 0,
            fetch_failures: 0,
            notes: Vec::new(),
        }
    }

    pub fn failed(subquery: SubQuery, reason: impl Into<String>) -> Self {
        let mut outcome = Self::new(subquery);
        outcome.failed = true;
        outcome.notes.push(reason.into());
        outcome
    }
}

/// Run counters accumulated across rounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub attempted_subqueries: usize,
    pub failed_subqueries: usize,
    pub search_hits: usize,
    pub rejected_sources: usize,
    pub dropped_low: usize,
    pub fetch_failures: usize,
}

/// Root aggregate of one research run
#[derive(Debug, Clone)]
pub struct ResearchSession {
    pub id: Uuid,
    pub query: String,
    pub depth: usize,
    pub breadth: usize,
    /// Completed Searching stages
    pub current_round: usize,
    pub stage: ResearchStage,
    pub status: String,
    pub ledger: Vec<LedgerEntry>,
    /// Every discovery event, in discovery order
    pub sources: Vec<SourceRecord>,
    pub subqueries: Vec<SubQuery>,
    pub trace: Vec<TraceEntry>,
    pub counters: SessionCounters,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl ResearchSession {
    pub fn new(query: impl Into<String>, depth: usize, breadth: usize) -> Self {
        let stage = ResearchStage::Initializing;
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            depth,
            breadth,
            current_round: 0,
            stage,
            status: stage.status_label().to_string(),
            ledger: Vec::new(),
            sources: Vec::new(),
            subqueries: Vec::new(),
            trace: Vec::new(),
            counters: SessionCounters::default(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Append a chain-of-thought entry
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(session = %self.id, stage = %self.stage, "{}", message);
        self.trace.push(TraceEntry {
            at: Utc::now(),
            stage: self.stage,
            message,
        });
    }

    /// Move to `stage`, updating the status label
    pub fn enter(&mut self, stage: ResearchStage) {
        self.stage = stage;
        self.status = stage.status_label().to_string();
        if stage == ResearchStage::Searching {
            self.current_round += 1;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whole ledger rendered as markdown
    pub fn findings_text(&self) -> String {
        self.ledger.iter().map(LedgerEntry::render).collect()
    }

    /// Notes of the most recent reflection, if any
    pub fn latest_reflection(&self) -> Option<&str> {
        self.ledger.iter().rev().find_map(|entry| match entry {
            LedgerEntry::Reflection { notes, .. } => Some(notes.as_str()),
            _ => None,
        })
    }

    pub fn analyses(&self) -> impl Iterator<Item = &AnalysisSection> {
        self.ledger.iter().filter_map(|entry| match entry {
            LedgerEntry::Analysis(section) => Some(section),
            _ => None,
        })
    }

    /// Case-insensitive check against every issued sub-query
    pub fn has_issued(&self, text: &str) -> bool {
        let needle = text.trim().to_lowercase();
        self.subqueries
            .iter()
            .any(|q| q.text.trim().to_lowercase() == needle)
    }

    pub fn issued_texts(&self) -> Vec<String> {
        self.subqueries.iter().map(|q| q.text.clone()).collect()
    }

    /// Merge one sub-query pipeline's results
    pub fn apply_outcome(&mut self, outcome: SubQueryOutcome) {
        self.counters.attempted_subqueries += 1;
        if outcome.failed {
            self.counters.failed_subqueries += 1;
        }
        self.counters.search_hits += outcome.search_hits;
        self.counters.rejected_sources += outcome.rejected;
        self.counters.dropped_low += outcome.dropped_low;
        self.counters.fetch_failures += outcome.fetch_failures;

        for note in outcome.notes {
            self.log(note);
        }
        self.sources.extend(outcome.sources);
        if let Some(section) = outcome.section {
            if !section.is_empty() {
                self.ledger.push(LedgerEntry::Analysis(section));
            }
        }
    }

    /// True when sub-queries were attempted and every one failed
    pub fn total_acquisition_failure(&self) -> bool {
        self.counters.attempted_subqueries > 0
            && self.counters.failed_subqueries == self.counters.attempted_subqueries
    }
}
