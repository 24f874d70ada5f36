//! Research orchestrator
//!
//! Drives [`ResearchStage`] transitions for one run. Sub-queries of a round
//! run in batches; every pipeline in a batch runs concurrently on the
//! calling task and returns a [`SubQueryOutcome`]. Outcomes are merged into
//! the session after the batch join, in submission order, so discovery
//! order and citation numbering are deterministic.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::classifier::RelevanceClassifier;
use super::compiler::ReportCompiler;
use super::config::ResearchConfig;
use super::harvester::ContentHarvester;
use super::planner::QueryPlanner;
use super::progress::{ProgressObserver, SessionSnapshot};
use super::result::ResearchResult;
use super::session::{
    normalize_url, LedgerEntry, ResearchSession, SourceRecord, SubQuery, SubQueryOutcome,
};
use super::stage::ResearchStage;
use super::synthesizer::AnalysisSynthesizer;
use crate::error::{with_timeout, ResearchError};
use crate::fetch::ContentFetcher;
use crate::llm::CompletionService;
use crate::search::{SearchHit, SearchProvider};

/// External collaborators a run depends on
#[derive(Clone)]
pub struct ResearchServices {
    pub llm: Arc<dyn CompletionService>,
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn ContentFetcher>,
}

pub struct ResearchOrchestrator {
    search: Arc<dyn SearchProvider>,
    planner: QueryPlanner,
    classifier: RelevanceClassifier,
    harvester: ContentHarvester,
    synthesizer: AnalysisSynthesizer,
    compiler: ReportCompiler,
    config: ResearchConfig,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ResearchOrchestrator {
    pub fn new(services: ResearchServices, config: ResearchConfig) -> Self {
        let ResearchServices {
            llm,
            search,
            fetcher,
        } = services;

        Self {
            search,
            planner: QueryPlanner::new(llm.clone(), config.llm_timeout),
            classifier: RelevanceClassifier::new(
                llm.clone(),
                config.relevance_cache_capacity,
                config.llm_timeout,
            ),
            harvester: ContentHarvester::new(fetcher, llm.clone())
                .with_limits(config.max_urls_per_subquery, config.max_document_chars)
                .with_timeouts(config.fetch_timeout, config.llm_timeout),
            synthesizer: AnalysisSynthesizer::new(llm.clone(), config.llm_timeout),
            compiler: ReportCompiler::new(llm, &config),
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn classifier(&self) -> &RelevanceClassifier {
        &self.classifier
    }

    /// Research `query` for `depth` rounds of up to `breadth` sub-queries.
    ///
    /// Fails only when the request is invalid or every attempted sub-query
    /// failed; everything else degrades into less data.
    pub async fn run(
        &self,
        query: &str,
        depth: usize,
        breadth: usize,
    ) -> Result<ResearchResult, ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::InvalidRequest("query is empty".to_string()));
        }
        self.config.check_request(depth, breadth)?;

        info!(query = %query, depth, breadth, "Starting research");
        let mut session = ResearchSession::new(query, depth, breadth);
        let mut pending: Vec<SubQuery> = Vec::new();
        let mut result = None;
        let mut stage = Some(ResearchStage::Initializing);

        while let Some(current) = stage {
            self.enter(&mut session, current);

            match current {
                ResearchStage::Initializing => self.initialize(&mut session).await,
                ResearchStage::GeneratingQueries => {
                    pending = self.generate_queries(&mut session).await;
                }
                ResearchStage::Searching => {
                    self.search_round(&mut session, std::mem::take(&mut pending))
                        .await;
                }
                ResearchStage::Reflecting => self.reflect(&mut session).await,
                ResearchStage::Compiling => {
                    if session.total_acquisition_failure() {
                        warn!(query = %query, "Every sub-query failed");
                        return Err(ResearchError::TotalAcquisitionFailure {
                            query: query.to_string(),
                            attempted: session.counters.attempted_subqueries,
                        });
                    }
                    result = Some(
                        self.compiler
                            .compile(&session, self.classifier.cache_stats())
                            .await,
                    );
                }
                ResearchStage::Complete => {
                    if let Some(result) = result.as_mut() {
                        result.trace = session.trace.clone();
                    }
                }
            }

            stage = current.next(session.current_round, session.depth);
        }

        let result = result.ok_or_else(|| {
            ResearchError::InvalidRequest("research finished without compiling".to_string())
        })?;
        info!(
            query = %query,
            sources = result.stats.sources_count,
            subqueries = result.stats.subqueries_count,
            elapsed = %result.stats.elapsed_formatted,
            "Research complete"
        );
        Ok(result)
    }

    /// Record the transition and notify the observer
    fn enter(&self, session: &mut ResearchSession, stage: ResearchStage) {
        session.enter(stage);
        let message = match stage {
            ResearchStage::Searching => {
                format!("{} (round {}/{})", stage.status_label(), session.current_round, session.depth)
            }
            _ => stage.status_label().to_string(),
        };
        session.log(message);

        if let Some(observer) = &self.observer {
            observer.notify(&SessionSnapshot::capture(session));
        }
    }

    async fn initialize(&self, session: &mut ResearchSession) {
        let plan = match self.planner.plan(&session.query).await {
            Ok(plan) => {
                session.log(format!("Created research plan for query: {}", session.query));
                plan
            }
            Err(e) => {
                warn!(error = %e, "Research plan failed, seeding a minimal plan");
                session.log(format!("Research plan unavailable ({}); using the query itself", e));
                format!("Investigate: {}", session.query)
            }
        };
        session.ledger.push(LedgerEntry::Plan { text: plan });
    }

    async fn generate_queries(&self, session: &mut ResearchSession) -> Vec<SubQuery> {
        let round = session.current_round + 1;
        let generated = self
            .planner
            .generate_subqueries(
                &session.query,
                &session.findings_text(),
                session.latest_reflection(),
                session.breadth,
                &session.issued_texts(),
                round,
            )
            .await;

        let mut queries = match generated {
            Ok(queries) => queries,
            Err(e) => {
                warn!(round, error = %e, "Query generation failed");
                session.log(format!("Query generation failed: {}", e));
                Vec::new()
            }
        };

        if queries.is_empty() && session.breadth > 0 && !session.has_issued(&session.query) {
            queries.push(SubQuery::new(session.query.clone(), round));
        }

        session.subqueries.extend(queries.iter().cloned());
        session.log(format!(
            "Generated {} search queries for investigation: {}",
            queries.len(),
            queries.iter().map(|q| q.text.as_str()).collect::<Vec<_>>().join(" | ")
        ));
        queries
    }

    /// Append reflection notes; a failed reflection only leaves a trace entry
    async fn reflect(&self, session: &mut ResearchSession) {
        match self.planner.reflect(&session.findings_text()).await {
            Ok(notes) if !notes.is_empty() => {
                session.ledger.push(LedgerEntry::Reflection {
                    round: session.current_round,
                    notes,
                });
                session.log(format!(
                    "Reflected on findings after round {}",
                    session.current_round
                ));
            }
            Ok(_) => session.log("Reflection produced no notes"),
            Err(e) => {
                warn!(round = session.current_round, error = %e, "Reflection failed");
                session.log(format!("Reflection failed: {}", e));
            }
        }
    }

    async fn search_round(&self, session: &mut ResearchSession, queries: Vec<SubQuery>) {
        for batch in queries.chunks(self.config.batch_size.max(1)) {
            let outcomes = join_all(batch.iter().map(|q| self.explore(q))).await;
            for outcome in outcomes {
                session.apply_outcome(outcome);
            }
        }
        session.log(format!(
            "Finished round {}/{} with {} sources discovered",
            session.current_round,
            session.depth,
            session.sources.len()
        ));
    }

    /// Search, filter, harvest and synthesize one sub-query
    async fn explore(&self, subquery: &SubQuery) -> SubQueryOutcome {
        let mut outcome = SubQueryOutcome::new(subquery.clone());
        outcome.notes.push(format!("Searching for: {}", subquery.text));

        let hits = match with_timeout(
            "search",
            self.config.search_timeout,
            self.search.search(&subquery.text),
        )
        .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(subquery = %subquery, error = %e, "Search failed");
                outcome.failed = true;
                outcome
                    .notes
                    .push(format!("Search failed for '{}': {}", subquery.text, e));
                return outcome;
            }
        };
        outcome.search_hits = hits.len();

        let selected = self.select_sources(hits, &subquery.text, &mut outcome).await;
        if selected.is_empty() {
            outcome
                .notes
                .push(format!("No relevant sources found for '{}'", subquery.text));
            return outcome;
        }

        let report = self.harvester.harvest(&selected, &subquery.text).await;
        outcome.dropped_low = report.dropped_low;
        outcome.fetch_failures = report.failures;
        outcome.notes.extend(report.notes);
        outcome.sources = selected;

        match self.synthesizer.synthesize(subquery, &report.documents).await {
            Ok(section) => {
                outcome.notes.push(format!(
                    "Analyzed {} documents for '{}'",
                    section.source_urls.len(),
                    subquery.text
                ));
                outcome.section = Some(section);
            }
            Err(e) => {
                outcome
                    .notes
                    .push(format!("Synthesis failed for '{}': {}", subquery.text, e));
            }
        }

        outcome
    }

    /// Relevant, fetchable, distinct hits in rank order, bounded per sub-query
    async fn select_sources(
        &self,
        hits: Vec<SearchHit>,
        subquery: &str,
        outcome: &mut SubQueryOutcome,
    ) -> Vec<SourceRecord> {
        let mut seen = HashSet::new();
        let candidates: Vec<SearchHit> = hits
            .into_iter()
            .filter(|h| h.is_fetchable() && seen.insert(normalize_url(&h.url)))
            .collect();

        let verdicts = join_all(candidates.iter().map(|h| {
            self.classifier
                .is_relevant(&h.url, &h.title, &h.snippet, subquery)
        }))
        .await;

        let relevant: Vec<SearchHit> = candidates
            .into_iter()
            .zip(verdicts)
            .filter_map(|(hit, keep)| keep.then_some(hit))
            .collect();
        outcome.rejected = outcome.search_hits - relevant.len();

        relevant
            .into_iter()
            .take(self.config.max_urls_per_subquery)
            .map(|hit| {
                outcome.notes.push(format!("Selected relevant URL: {}", hit.url));
                SourceRecord::from(hit)
            })
            .collect()
    }
}
