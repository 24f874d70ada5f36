//! Analysis synthesizer

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::prompts::ResearchPrompts;
use super::session::{AnalysisSection, ContentDocument, SubQuery};
use crate::error::{with_timeout, ProviderError};
use crate::llm::CompletionService;

/// Merges one sub-query's documents into a single thematic analysis.
///
/// Documents are numbered `[1]..[k]` in the order given; the resulting
/// section keeps their URLs in that order so citations can be renumbered
/// globally at compile time.
pub struct AnalysisSynthesizer {
    llm: Arc<dyn CompletionService>,
    llm_timeout: Duration,
}

impl AnalysisSynthesizer {
    pub fn new(llm: Arc<dyn CompletionService>, llm_timeout: Duration) -> Self {
        Self { llm, llm_timeout }
    }

    /// Empty `documents` yields an empty section without a model call.
    pub async fn synthesize(
        &self,
        subquery: &SubQuery,
        documents: &[ContentDocument],
    ) -> Result<AnalysisSection, ProviderError> {
        if documents.is_empty() {
            return Ok(AnalysisSection::empty(subquery.clone()));
        }

        info!(subquery = %subquery, documents = documents.len(), "Synthesizing analysis");

        let text = with_timeout(
            "synthesis",
            self.llm_timeout,
            self.llm.complete(
                ResearchPrompts::synthesis_system(),
                &ResearchPrompts::synthesis_user(&subquery.text, &format_documents(documents)),
            ),
        )
        .await
        .inspect_err(|e| warn!(subquery = %subquery, error = %e, "Synthesis failed"))?;

        Ok(AnalysisSection {
            subquery: subquery.clone(),
            text: text.trim().to_string(),
            source_urls: documents.iter().map(|d| d.source.url.clone()).collect(),
        })
    }
}

fn format_documents(documents: &[ContentDocument]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "[{}] {}\nURL: {}\nReliability: {} ({})\n\n{}\n",
                i + 1,
                doc.source.title,
                doc.source.url,
                doc.reliability,
                doc.justification,
                doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}
