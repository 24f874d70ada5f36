//! Report compiler
//!
//! 1. Deduplicate the source table by normalized URL and number sources
//!    `1..N` in first-seen order.
//! 2. Rewrite each analysis section's local `[i]` markers to global numbers.
//! 3. Generate the final report from the renumbered ledger.
//! 4. Validate every marker; unresolved numbers are flagged, never fixed.

use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{info, warn};

use super::classifier::CacheStats;
use super::config::{DetailLevel, ResearchConfig};
use super::prompts::ResearchPrompts;
use super::result::{format_elapsed, CitedSource, ResearchResult, ResearchStats};
use super::session::{normalize_url, AnalysisSection, LedgerEntry, ResearchSession, SourceRecord};
use crate::error::with_timeout;
use crate::llm::CompletionService;

/// `[3]` or `[1, 4, 7]`
static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("valid regex"));

/// Deduplicated sources with stable citation numbers
#[derive(Debug, Clone, Default)]
pub struct CitationTable {
    numbers: HashMap<String, usize>,
    sources: Vec<CitedSource>,
}

impl CitationTable {
    /// Number sources by first discovery; later duplicates are ignored.
    pub fn build(records: &[SourceRecord]) -> Self {
        let mut table = Self::default();
        for record in records {
            let key = record.key();
            if table.numbers.contains_key(&key) {
                continue;
            }
            let number = table.sources.len() + 1;
            table.numbers.insert(key, number);
            table.sources.push(CitedSource {
                number,
                url: record.url.clone(),
                title: record.title.clone(),
                provider: record.provider.clone(),
            });
        }
        table
    }

    pub fn number_for(&self, url: &str) -> Option<usize> {
        self.numbers.get(&normalize_url(url)).copied()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[CitedSource] {
        &self.sources
    }

    pub fn into_sources(self) -> Vec<CitedSource> {
        self.sources
    }

    /// One `[n] title - url` line per source
    pub fn reference_list(&self) -> String {
        self.sources
            .iter()
            .map(|s| format!("[{}] {} - {}", s.number, s.title, s.url))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A section rewritten to global numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renumbered {
    pub text: String,
    /// Local numbers with no matching source in the section
    pub unresolved: Vec<usize>,
}

/// Rewrite a section's local markers to global citation numbers.
///
/// A local number outside `1..=source_urls.len()` is dropped from its
/// marker and reported; a marker left empty becomes `[?]`.
pub fn renumber_section(section: &AnalysisSection, table: &CitationTable) -> Renumbered {
    let mut unresolved = Vec::new();
    let text = CITATION
        .replace_all(&section.text, |caps: &Captures| {
            let mut numbers: Vec<usize> = Vec::new();
            for local in parse_numbers(&caps[1]) {
                let global = local
                    .checked_sub(1)
                    .and_then(|i| section.source_urls.get(i))
                    .and_then(|url| table.number_for(url));
                match global {
                    Some(n) if !numbers.contains(&n) => numbers.push(n),
                    Some(_) => {}
                    None => unresolved.push(local),
                }
            }
            if numbers.is_empty() {
                return "[?]".to_string();
            }
            let joined: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
            format!("[{}]", joined.join(", "))
        })
        .into_owned();

    Renumbered { text, unresolved }
}

/// Every cited number outside `1..=n`, in encounter order
pub fn unresolved_citations(text: &str, n: usize) -> Vec<usize> {
    CITATION
        .captures_iter(text)
        .flat_map(|caps| parse_numbers(&caps[1]))
        .filter(|&num| num == 0 || num > n)
        .collect()
}

fn parse_numbers(list: &str) -> Vec<usize> {
    list.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

pub struct ReportCompiler {
    llm: Arc<dyn CompletionService>,
    llm_timeout: Duration,
    detail_level: DetailLevel,
    include_objective: bool,
}

impl ReportCompiler {
    pub fn new(llm: Arc<dyn CompletionService>, config: &ResearchConfig) -> Self {
        Self {
            llm,
            llm_timeout: config.llm_timeout,
            detail_level: config.detail_level,
            include_objective: config.include_objective,
        }
    }

    /// Build the immutable result for a finished session
    pub async fn compile(&self, session: &ResearchSession, relevance_cache: CacheStats) -> ResearchResult {
        let table = CitationTable::build(&session.sources);
        info!(
            discovered = session.sources.len(),
            unique = table.len(),
            "Compiling report"
        );

        let mut flagged: BTreeSet<usize> = BTreeSet::new();
        let analyses: Vec<AnalysisSection> = session
            .analyses()
            .map(|section| {
                let renumbered = renumber_section(section, &table);
                flagged.extend(renumbered.unresolved);
                AnalysisSection {
                    text: renumbered.text,
                    ..section.clone()
                }
            })
            .collect();
        let ledger = render_ledger(session, &analyses);

        let report = if analyses.is_empty() {
            no_findings_report(&session.query)
        } else {
            self.generate_report(&session.query, &ledger, &table).await
        };

        flagged.extend(unresolved_citations(&report, table.len()));
        if !flagged.is_empty() {
            warn!(citations = ?flagged, "Report cites numbers with no matching source");
        }

        let elapsed = session.elapsed();
        let counters = session.counters;
        let stats = ResearchStats {
            elapsed,
            elapsed_formatted: format_elapsed(elapsed),
            sources_count: table.len(),
            subqueries_count: session.subqueries.len(),
            depth: session.depth,
            breadth: session.breadth,
            rounds_completed: session.current_round,
            detail_level: self.detail_level,
            search_hits: counters.search_hits,
            rejected_sources: counters.rejected_sources,
            dropped_low: counters.dropped_low,
            fetch_failures: counters.fetch_failures,
            failed_subqueries: counters.failed_subqueries,
            unresolved_citations: flagged.into_iter().collect(),
            relevance_cache,
        };

        ResearchResult {
            id: session.id,
            query: session.query.clone(),
            report,
            sources: table.into_sources(),
            subqueries: session.subqueries.clone(),
            analyses,
            trace: session.trace.clone(),
            stats,
            generated_at: chrono::Utc::now(),
        }
    }

    async fn generate_report(&self, query: &str, ledger: &str, table: &CitationTable) -> String {
        let result = with_timeout(
            "report generation",
            self.llm_timeout,
            self.llm.complete(
                &ResearchPrompts::report_system(self.detail_level, self.include_objective),
                &ResearchPrompts::report_user(query, ledger, &table.reference_list(), table.len()),
            ),
        )
        .await;

        match result {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Report generation returned nothing, using findings");
                ledger.trim().to_string()
            }
            Err(e) => {
                warn!(error = %e, "Report generation failed, using findings");
                ledger.trim().to_string()
            }
        }
    }
}

/// Ledger rendered with analysis sections swapped for their renumbered copies
fn render_ledger(session: &ResearchSession, analyses: &[AnalysisSection]) -> String {
    let mut renumbered = analyses.iter();
    session
        .ledger
        .iter()
        .map(|entry| match entry {
            LedgerEntry::Analysis(_) => match renumbered.next() {
                Some(section) => LedgerEntry::Analysis(section.clone()).render(),
                None => entry.render(),
            },
            other => other.render(),
        })
        .collect()
}

fn no_findings_report(query: &str) -> String {
    format!(
        "## Executive Summary\n\n\
         No findings were gathered for the query \"{}\". \
         The searches returned no sources that could be analyzed, \
         so no conclusions can be drawn.\n\n\
         ## Recommendations for Further Research\n\n\
         Try rephrasing the query, broadening its scope, or configuring a different search provider.",
        query
    )
}
