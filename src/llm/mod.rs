//! LLM completion abstractions
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Planner / Classifier / Harvester /           │
//! │ Synthesizer / Compiler                       │
//! └──────────────────────┬───────────────────────┘
//!                        │ complete(system, user)
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │        CompletionService (trait)             │
//! └──────────────────────┬───────────────────────┘
//!                        │ implemented by
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ RigCompletion (Ollama | OpenAI via rig-core) │
//! └──────────────────────────────────────────────┘
//! ```

mod provider;
mod rig_backend;

pub use provider::CompletionService;
pub use rig_backend::{LlmBackend, RigCompletion};
