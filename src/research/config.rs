//! Research run configuration
//!
//! Fan-out bounds, per-call timeouts and report options for the
//! orchestrator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ResearchError;

/// How much detail the compiled report should go into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Low,
    Medium,
    #[default]
    High,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Low => "low",
            DetailLevel::Medium => "medium",
            DetailLevel::High => "high",
        }
    }
}

impl std::str::FromStr for DetailLevel {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(DetailLevel::Low),
            "medium" => Ok(DetailLevel::Medium),
            "high" => Ok(DetailLevel::High),
            other => Err(ResearchError::Config(format!(
                "unknown detail level '{}', expected low, medium or high",
                other
            ))),
        }
    }
}

/// Research orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Upper bound accepted for the requested depth
    pub max_depth: usize,

    /// Upper bound accepted for the requested breadth
    pub max_breadth: usize,

    /// Sub-queries processed concurrently within one round
    pub batch_size: usize,

    /// URLs harvested per sub-query
    pub max_urls_per_subquery: usize,

    /// Characters of extracted main text sent to the model per document
    pub max_document_chars: usize,

    /// Entries kept by the relevance cache
    pub relevance_cache_capacity: usize,

    /// Timeout for one search provider call
    #[serde(with = "humantime_serde")]
    pub search_timeout: Duration,

    /// Timeout for fetching one URL
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Timeout for one completion call
    #[serde(with = "humantime_serde")]
    pub llm_timeout: Duration,

    /// Report detail level
    pub detail_level: DetailLevel,

    /// Whether the report may open with an "Objective" section
    pub include_objective: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_breadth: 10,
            batch_size: 3,
            max_urls_per_subquery: 5,
            max_document_chars: 8000,
            relevance_cache_capacity: 100,
            search_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(20),
            llm_timeout: Duration::from_secs(120),
            detail_level: DetailLevel::default(),
            include_objective: false,
        }
    }
}

impl ResearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sub-query batch size (minimum 1)
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the per-sub-query URL bound
    pub fn with_max_urls_per_subquery(mut self, max: usize) -> Self {
        self.max_urls_per_subquery = max;
        self
    }

    pub fn with_max_document_chars(mut self, max: usize) -> Self {
        self.max_document_chars = max;
        self
    }

    /// Set the relevance cache capacity (minimum 1)
    pub fn with_relevance_cache_capacity(mut self, capacity: usize) -> Self {
        self.relevance_cache_capacity = capacity.max(1);
        self
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_detail_level(mut self, level: DetailLevel) -> Self {
        self.detail_level = level;
        self
    }

    pub fn with_include_objective(mut self, include: bool) -> Self {
        self.include_objective = include;
        self
    }

    pub fn with_limits(mut self, max_depth: usize, max_breadth: usize) -> Self {
        self.max_depth = max_depth;
        self.max_breadth = max_breadth;
        self
    }

    /// Validate the configuration before a run starts.
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.max_urls_per_subquery == 0 {
            return Err(ResearchError::Config(
                "max_urls_per_subquery must be at least 1".to_string(),
            ));
        }
        if self.max_document_chars == 0 {
            return Err(ResearchError::Config(
                "max_document_chars must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 || self.relevance_cache_capacity == 0 {
            return Err(ResearchError::Config(
                "batch_size and relevance_cache_capacity must be at least 1".to_string(),
            ));
        }
        for (name, timeout) in [
            ("search_timeout", self.search_timeout),
            ("fetch_timeout", self.fetch_timeout),
            ("llm_timeout", self.llm_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ResearchError::Config(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }

    /// Check a requested depth/breadth pair against the configured limits.
    pub fn check_request(&self, depth: usize, breadth: usize) -> Result<(), ResearchError> {
        if depth > self.max_depth {
            return Err(ResearchError::InvalidRequest(format!(
                "depth {} exceeds the maximum of {}",
                depth, self.max_depth
            )));
        }
        if breadth == 0 && depth > 0 {
            return Err(ResearchError::InvalidRequest(
                "breadth must be at least 1 when depth is positive".to_string(),
            ));
        }
        if breadth > self.max_breadth {
            return Err(ResearchError::InvalidRequest(format!(
                "breadth {} exceeds the maximum of {}",
                breadth, self.max_breadth
            )));
        }
        Ok(())
    }
}
