//! Quick search mode
//!
//! One search and one completion: the model summarizes the result
//! snippets directly, with no planning, harvesting or follow-up rounds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::config::ResearchConfig;
use super::orchestrator::ResearchServices;
use super::prompts::ResearchPrompts;
use crate::error::{with_timeout, ResearchError};
use crate::llm::CompletionService;
use crate::search::{SearchHit, SearchProvider};

/// Summary of one search's results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickResult {
    pub query: String,
    pub summary: String,
    pub sources: Vec<SearchHit>,
    pub generated_at: DateTime<Utc>,
}

impl QuickResult {
    pub fn to_markdown(&self) -> String {
        let mut md = vec![
            format!("# Search Results: {}\n", self.query),
            format!("*Generated on: {}*\n", self.generated_at.format("%Y-%m-%d %H:%M:%S")),
            format!("## Summary\n\n{}\n", self.summary),
            "## Sources\n".to_string(),
        ];
        for (i, hit) in self.sources.iter().enumerate() {
            md.push(format!("### {}. {}", i + 1, hit.title));
            md.push(format!("**URL:** {}", hit.url));
            md.push(format!("**Source:** {}", hit.source));
            if !hit.snippet.is_empty() {
                md.push(format!("**Snippet:** {}", hit.snippet));
            }
            md.push(String::new());
        }
        md.join("\n")
    }
}

pub struct QuickSearch {
    llm: Arc<dyn CompletionService>,
    search: Arc<dyn SearchProvider>,
    search_timeout: Duration,
    llm_timeout: Duration,
}

impl QuickSearch {
    pub fn new(services: &ResearchServices, config: &ResearchConfig) -> Self {
        Self {
            llm: services.llm.clone(),
            search: services.search.clone(),
            search_timeout: config.search_timeout,
            llm_timeout: config.llm_timeout,
        }
    }

    /// Search once and summarize the hits.
    ///
    /// A failed search is a total acquisition failure. A failed summary
    /// degrades to a note; the hits are still returned.
    pub async fn run(&self, query: &str, detailed: bool) -> Result<QuickResult, ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::InvalidRequest("query is empty".to_string()));
        }

        info!(query = %query, detailed, "Starting quick search");
        let hits = with_timeout("search", self.search_timeout, self.search.search(query))
            .await
            .map_err(|e| {
                warn!(error = %e, "Quick search failed");
                ResearchError::TotalAcquisitionFailure {
                    query: query.to_string(),
                    attempted: 1,
                }
            })?;

        let summary = if hits.is_empty() {
            format!("The search returned no results for \"{}\".", query)
        } else {
            self.summarize(query, &hits, detailed).await
        };

        info!(sources = hits.len(), "Quick search complete");
        Ok(QuickResult {
            query: query.to_string(),
            summary,
            sources: hits,
            generated_at: Utc::now(),
        })
    }

    async fn summarize(&self, query: &str, hits: &[SearchHit], detailed: bool) -> String {
        let listing = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "[{}] {}\nSource: {}\nURL: {}\nSnippet: {}",
                    i + 1,
                    hit.title,
                    hit.source,
                    hit.url,
                    hit.snippet
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let summary = with_timeout(
            "quick summary",
            self.llm_timeout,
            self.llm.complete(
                &ResearchPrompts::quick_system(detailed),
                &ResearchPrompts::quick_user(query, &listing),
            ),
        )
        .await;

        match summary {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => "Summary unavailable: the model returned nothing.".to_string(),
            Err(e) => {
                warn!(error = %e, "Quick summary failed");
                format!("Summary unavailable: {}", e)
            }
        }
    }
}
