//! Orchestrator state machine
//!
//! ```text
//! Initializing ──▶ GeneratingQueries ──▶ Searching ──┬──▶ Compiling ──▶ Complete
//!      │                  ▲                          │
//!      │                  └──── Reflecting ◀─────────┘  (current_round < depth)
//!      └──────────────────────────────────────▶ Compiling  (depth == 0)
//! ```
//!
//! The single back-edge is guarded by the round counter, which `Searching`
//! increments, so the loop runs exactly `depth` times.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResearchStage {
    /// Seeds the ledger with a research plan. Visited once.
    #[default]
    Initializing,
    /// Planner derives the next batch of sub-queries
    GeneratingQueries,
    /// Search, filter, harvest and synthesize each sub-query
    Searching,
    /// Reflection over accumulated findings
    Reflecting,
    /// Report compilation
    Compiling,
    /// Terminal
    Complete,
}

impl ResearchStage {
    /// Transition function.
    ///
    /// `current_round` is the number of completed `Searching` stages.
    /// Returns `None` from the terminal stage.
    pub fn next(self, current_round: usize, depth: usize) -> Option<Self> {
        match self {
            Self::Initializing if depth == 0 => Some(Self::Compiling),
            Self::Initializing => Some(Self::GeneratingQueries),
            Self::GeneratingQueries => Some(Self::Searching),
            Self::Searching if current_round < depth => Some(Self::Reflecting),
            Self::Searching => Some(Self::Compiling),
            Self::Reflecting => Some(Self::GeneratingQueries),
            Self::Compiling => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Status label shown to observers while in this stage
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing research",
            Self::GeneratingQueries => "Generating research queries",
            Self::Searching => "Searching and analyzing content",
            Self::Reflecting => "Reflecting on findings",
            Self::Compiling => "Generating final report",
            Self::Complete => "Complete",
        }
    }
}

impl fmt::Display for ResearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::GeneratingQueries => "generating_queries",
            Self::Searching => "searching",
            Self::Reflecting => "reflecting",
            Self::Compiling => "compiling",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}
