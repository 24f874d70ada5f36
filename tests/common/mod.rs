//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deep_research::{
    CompletionService, ContentFetcher, ProviderError, ResearchConfig, ResearchOrchestrator,
    ResearchServices, SearchHit, SearchProvider,
};

/// Which pipeline step a completion call belongs to, told apart by system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Plan,
    Reflect,
    Queries,
    Relevance,
    Reliability,
    Extraction,
    Synthesis,
    Report,
}

impl Step {
    fn classify(system: &str) -> Self {
        if system.contains("detailed research plan") {
            Step::Plan
        } else if system.contains("analyzing research findings") {
            Step::Reflect
        } else if system.contains("generating targeted search queries") {
            Step::Queries
        } else if system.contains("search result is relevant") {
            Step::Relevance
        } else if system.contains("reliability of a web source") {
            Step::Reliability
        } else if system.contains("from a web page") {
            Step::Extraction
        } else if system.contains("analyzing web content") {
            Step::Synthesis
        } else {
            Step::Report
        }
    }
}

/// Completion service answering each step with canned text.
///
/// - Sub-query batches come from a queue, then `follow-up angle N`.
/// - Results whose prompt mentions `offtopic` are judged irrelevant.
/// - Sources whose prompt mentions `lowquality` are rated LOW.
/// - Synthesis cites every numbered document it was given.
pub struct ScriptedLlm {
    queries: Mutex<VecDeque<String>>,
    report: Mutex<String>,
    failing: Mutex<HashSet<Step>>,
    calls: Mutex<Vec<(Step, String)>>,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self {
            queries: Mutex::new(VecDeque::new()),
            report: Mutex::new("## Executive Summary\n\nThe evidence points one way [1].".into()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one round's worth of sub-queries, one per line
    pub fn with_queries(self, batch: &str) -> Self {
        self.queries.lock().unwrap().push_back(batch.to_string());
        self
    }

    pub fn with_report(self, report: &str) -> Self {
        *self.report.lock().unwrap() = report.to_string();
        self
    }

    pub fn failing(self, step: Step) -> Self {
        self.failing.lock().unwrap().insert(step);
        self
    }

    pub fn count(&self, step: Step) -> usize {
        self.calls.lock().unwrap().iter().filter(|(s, _)| *s == step).count()
    }

    pub fn prompts(&self, step: Step) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == step)
            .map(|(_, user)| user.clone())
            .collect()
    }
}

#[async_trait]
impl CompletionService for ScriptedLlm {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let step = Step::classify(system);
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((step, user.to_string()));
            calls.iter().filter(|(s, _)| *s == step).count()
        };

        if self.failing.lock().unwrap().contains(&step) {
            return Err(ProviderError::Completion(format!("{:?} unavailable", step)));
        }

        let answer = match step {
            Step::Plan => "Key aspects: background, current state, open problems.".to_string(),
            Step::Reflect => "Gaps remain around costs and long-term data.".to_string(),
            Step::Queries => self
                .queries
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| format!("follow-up angle {}", nth)),
            Step::Relevance if user.contains("offtopic") => "IRRELEVANT".to_string(),
            Step::Relevance => "RELEVANT".to_string(),
            Step::Reliability if user.contains("lowquality") => {
                "RELIABILITY: LOW - anonymous forum post".to_string()
            }
            Step::Reliability => "RELIABILITY: HIGH - established publication".to_string(),
            Step::Extraction => "Extracted facts relevant to the query.".to_string(),
            Step::Synthesis => {
                let documents = user.matches("\nURL: ").count();
                let cites: Vec<String> = (1..=documents).map(|i| i.to_string()).collect();
                format!("Sources agree on the main point [{}].", cites.join(", "))
            }
            Step::Report => self.report.lock().unwrap().clone(),
        };
        Ok(answer)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Search stub keyed by lower-cased query; unknown queries return no hits
#[derive(Default)]
pub struct StubSearch {
    results: HashMap<String, Vec<SearchHit>>,
    failing: HashSet<String>,
    fail_all: bool,
    issued: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, query: &str, urls: &[&str]) -> Self {
        let hits = urls
            .iter()
            .map(|url| SearchHit::new(*url, format!("Page at {}", url), "snippet", "stub"))
            .collect();
        self.results.insert(query.to_lowercase(), hits);
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_lowercase());
        self
    }

    pub fn failing_always(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        self.issued.lock().unwrap().push(query.to_string());
        let key = query.to_lowercase();
        if self.fail_all || self.failing.contains(&key) {
            return Err(ProviderError::Search(format!("backend down for '{}'", query)));
        }
        Ok(self.results.get(&key).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Fetcher serving every URL except those marked missing
#[derive(Default)]
pub struct StubFetcher {
    missing: HashSet<String>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing(mut self, url: &str) -> Self {
        self.missing.insert(url.to_string());
        self
    }
}

#[async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        if self.missing.contains(url) {
            return Err(ProviderError::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            });
        }
        Ok(format!(
            "<html><body><nav>Home</nav><article><p>Body text of {}</p></article></body></html>",
            url
        ))
    }

    fn extract_main_text(&self, raw: &str) -> String {
        deep_research::fetch::extract_html_text(raw)
    }
}

/// Short timeouts so a misbehaving mock fails fast
pub fn test_config() -> ResearchConfig {
    ResearchConfig::default()
        .with_search_timeout(Duration::from_secs(5))
        .with_fetch_timeout(Duration::from_secs(5))
        .with_llm_timeout(Duration::from_secs(5))
}

pub fn orchestrator(
    llm: Arc<ScriptedLlm>,
    search: Arc<StubSearch>,
    fetcher: Arc<StubFetcher>,
) -> ResearchOrchestrator {
    ResearchOrchestrator::new(
        ResearchServices {
            llm,
            search,
            fetcher,
        },
        test_config(),
    )
}
