//! Query planner
//!
//! Produces the research plan, reflection notes and each round's
//! sub-queries. Model output for sub-queries is cleaned line by line:
//! decoration is stripped first, then duplicates are filtered.

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info};

use super::prompts::ResearchPrompts;
use super::session::SubQuery;
use crate::error::{with_timeout, ProviderError};
use crate::llm::CompletionService;

/// Search providers reject longer queries
pub const MAX_QUERY_CHARS: usize = 400;

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•+]\s+").expect("valid regex"));
static ENUMERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\(\d+\)|\d+[.)])\s*").expect("valid regex"));
static BOLD_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\*[^*]+:\*\*|\*\*[^*]+\*\*\s*:)\s*").expect("valid regex")
});
static QUERY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(search\s+)?query\s*\d*\s*[:.\-]\s*").expect("valid regex")
});

pub struct QueryPlanner {
    llm: Arc<dyn CompletionService>,
    llm_timeout: Duration,
}

impl QueryPlanner {
    pub fn new(llm: Arc<dyn CompletionService>, llm_timeout: Duration) -> Self {
        Self { llm, llm_timeout }
    }

    /// Research plan seeding the findings ledger
    pub async fn plan(&self, query: &str) -> Result<String, ProviderError> {
        info!(query = %query, "Creating research plan");
        let plan = self
            .complete(
                "research plan",
                &ResearchPrompts::plan_system(),
                &ResearchPrompts::plan_user(query),
            )
            .await?;

        Ok(plan.replace("**", "").replace("## ", "").replace("# ", "").trim().to_string())
    }

    /// Reflection notes over the accumulated findings
    pub async fn reflect(&self, findings: &str) -> Result<String, ProviderError> {
        info!(findings_chars = findings.len(), "Reflecting on findings");
        let notes = self
            .complete(
                "reflection",
                &ResearchPrompts::reflect_system(),
                &ResearchPrompts::reflect_user(findings),
            )
            .await?;
        Ok(notes.trim().to_string())
    }

    /// Derive at most `breadth` new sub-queries for `round`.
    ///
    /// Fewer valid queries than `breadth` is not an error.
    pub async fn generate_subqueries(
        &self,
        query: &str,
        findings: &str,
        reflection: Option<&str>,
        breadth: usize,
        issued: &[String],
        round: usize,
    ) -> Result<Vec<SubQuery>, ProviderError> {
        if breadth == 0 {
            return Ok(Vec::new());
        }

        let raw = self
            .complete(
                "query generation",
                &ResearchPrompts::queries_system(),
                &ResearchPrompts::queries_user(query, findings, reflection, breadth, issued),
            )
            .await?;

        let queries: Vec<SubQuery> = parse_subqueries(&raw, breadth, issued)
            .into_iter()
            .map(|text| SubQuery::new(text, round))
            .collect();

        info!(round, count = queries.len(), "Generated sub-queries");
        Ok(queries)
    }

    async fn complete(
        &self,
        operation: &'static str,
        system: &str,
        user: &str,
    ) -> Result<String, ProviderError> {
        with_timeout(operation, self.llm_timeout, self.llm.complete(system, user)).await
    }
}

/// Clean model output into at most `breadth` distinct queries.
///
/// Distinctness is case-insensitive, against `issued` and within the batch.
pub fn parse_subqueries(raw: &str, breadth: usize, issued: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = issued.iter().map(|q| q.trim().to_lowercase()).collect();
    let mut queries = Vec::new();

    for line in raw.lines() {
        if queries.len() >= breadth {
            break;
        }
        let Some(cleaned) = clean_line(line) else {
            continue;
        };
        if seen.insert(cleaned.to_lowercase()) {
            queries.push(cleaned);
        } else {
            debug!(query = %cleaned, "Skipping duplicate sub-query");
        }
    }

    queries
}

/// Strip list and label decoration from one line.
///
/// Returns `None` for headings, preamble lines and anything unusable.
fn clean_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut text = BULLET.replace(line, "").into_owned();
    text = ENUMERATION.replace(&text, "").into_owned();
    text = BOLD_LABEL.replace(&text, "").into_owned();
    text = QUERY_PREFIX.replace(&text, "").into_owned();

    let text = text
        .replace("**", "")
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '_' | '“' | '”'))
        .trim()
        .to_string();

    if text.is_empty() || text.ends_with(':') || text.chars().count() > MAX_QUERY_CHARS {
        return None;
    }
    Some(text)
}
