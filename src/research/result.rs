//! Research result and output sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use super::classifier::CacheStats;
use super::config::DetailLevel;
use super::session::{AnalysisSection, SubQuery, TraceEntry};
use crate::error::ResearchError;

/// Trace messages too routine to show in the rendered process section
const ROUTINE_TRACE: [&str; 3] = ["searching for", "selected relevant url", "completed"];

/// Maximum trace lines rendered before sampling kicks in
const MAX_TRACE_LINES: usize = 20;

/// A deduplicated source with its citation number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedSource {
    pub number: usize,
    pub url: String,
    pub title: String,
    pub provider: String,
}

/// Aggregate statistics for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchStats {
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub elapsed_formatted: String,
    /// Deduplicated sources
    pub sources_count: usize,
    pub subqueries_count: usize,
    pub depth: usize,
    pub breadth: usize,
    pub rounds_completed: usize,
    pub detail_level: DetailLevel,
    pub search_hits: usize,
    pub rejected_sources: usize,
    pub dropped_low: usize,
    pub fetch_failures: usize,
    pub failed_subqueries: usize,
    /// Citation numbers with no matching source, sorted
    pub unresolved_citations: Vec<usize>,
    pub relevance_cache: CacheStats,
}

/// Immutable outcome of a research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub id: Uuid,
    pub query: String,
    pub report: String,
    pub sources: Vec<CitedSource>,
    pub subqueries: Vec<SubQuery>,
    pub analyses: Vec<AnalysisSection>,
    pub trace: Vec<TraceEntry>,
    pub stats: ResearchStats,
    pub generated_at: DateTime<Utc>,
}

impl ResearchResult {
    /// Render report, references and process summary as markdown
    pub fn to_markdown(&self, include_trace: bool) -> String {
        let mut md = vec![
            format!("# Research Report: {}\n", self.query),
            format!("*Generated on: {}*\n", self.generated_at.format("%Y-%m-%d %H:%M:%S")),
            format!("{}\n", self.report.trim()),
        ];

        md.push("## References\n".to_string());
        if self.sources.is_empty() {
            md.push("No sources were found.\n".to_string());
        }
        for source in &self.sources {
            let title = if source.title.is_empty() {
                "Untitled Source"
            } else {
                source.title.as_str()
            };
            md.push(format!(
                "**[{}]** *{}* - **Source**: {}\n  <{}>\n",
                source.number, title, source.provider, source.url
            ));
        }

        let stats = &self.stats;
        md.push("## Research Process\n".to_string());
        md.push(format!("- **Depth**: {}", stats.depth));
        md.push(format!("- **Breadth**: {}", stats.breadth));
        md.push(format!("- **Time Taken**: {}", stats.elapsed_formatted));
        md.push(format!("- **Subqueries Explored**: {}", stats.subqueries_count));
        md.push(format!("- **Sources Analyzed**: {}\n", stats.sources_count));

        if include_trace && !self.trace.is_empty() {
            md.push("## Research Process: Chain of Thought\n".to_string());
            for entry in significant_trace(&self.trace) {
                md.push(format!("- {}", entry));
            }
            md.push(String::new());
        }

        md.join("\n")
    }

    pub fn to_json(&self) -> Result<String, ResearchError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ResearchError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a result previously saved as JSON
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ResearchError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write to `path`: JSON for `.json`, markdown otherwise
    pub fn save_to_file(&self, path: impl AsRef<Path>, include_trace: bool) -> Result<(), ResearchError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let contents = if is_json {
            self.to_json()?
        } else {
            self.to_markdown(include_trace)
        };

        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Auto-named report file in `dir`: `<query slug>_<YYYYmmdd_HHMMSS>.<extension>`.
///
/// The slug keeps the first 50 characters of the query, with anything
/// other than letters, digits, `-` and `_` turned into `_`.
pub fn output_path(dir: impl AsRef<Path>, query: &str, extension: &str, at: DateTime<Utc>) -> PathBuf {
    let slug: String = query
        .trim()
        .chars()
        .take(50)
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let slug = match slug.trim_matches('_') {
        "" => "research",
        trimmed => trimmed,
    };
    let file = format!("{}_{}.{}", slug, at.format("%Y%m%d_%H%M%S"), extension);
    dir.as_ref().join(file)
}

/// Format as `Xm Ys`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Drop routine entries, sampling head, middle and tail when still too long
fn significant_trace(trace: &[TraceEntry]) -> Vec<&TraceEntry> {
    let significant: Vec<&TraceEntry> = trace
        .iter()
        .filter(|e| {
            let lower = e.message.to_lowercase();
            !ROUTINE_TRACE.iter().any(|r| lower.contains(r))
        })
        .collect();

    if significant.len() <= MAX_TRACE_LINES {
        return significant;
    }

    let n = significant.len();
    let mid = n / 2;
    significant[..5]
        .iter()
        .chain(&significant[mid - 2..mid + 3])
        .chain(&significant[n - 5..])
        .copied()
        .collect()
}
