//! Interactive query clarification
//!
//! Before a run, the model asks a few follow-up questions; the answers are
//! folded into a refined research context that replaces the raw query.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{info, warn};

use super::prompts::ResearchPrompts;
use crate::error::{with_timeout, ProviderError};
use crate::llm::CompletionService;

/// Questions asked per clarification
pub const MAX_QUESTIONS: usize = 3;

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•+]|\(?\d+[.)])\s*").expect("valid regex"));

/// A question the user was asked and what they answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clarification {
    pub question: String,
    pub answer: String,
}

pub struct QueryClarifier {
    llm: Arc<dyn CompletionService>,
    llm_timeout: Duration,
}

impl QueryClarifier {
    pub fn new(llm: Arc<dyn CompletionService>, llm_timeout: Duration) -> Self {
        Self { llm, llm_timeout }
    }

    /// Up to [`MAX_QUESTIONS`] follow-up questions for `query`
    pub async fn questions(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        let raw = with_timeout(
            "clarifying questions",
            self.llm_timeout,
            self.llm.complete(
                &ResearchPrompts::clarify_system(),
                &ResearchPrompts::clarify_user(query, MAX_QUESTIONS),
            ),
        )
        .await?;

        let questions = parse_questions(&raw, MAX_QUESTIONS);
        info!(count = questions.len(), "Generated clarifying questions");
        Ok(questions)
    }

    /// Fold the answers into a refined research context.
    ///
    /// Without any non-empty answer, or when refinement fails, the original
    /// query comes back unchanged.
    pub async fn refine(&self, query: &str, clarifications: &[Clarification]) -> String {
        let answered: Vec<&Clarification> = clarifications
            .iter()
            .filter(|c| !c.answer.trim().is_empty())
            .collect();
        if answered.is_empty() {
            return query.to_string();
        }

        let transcript = answered
            .iter()
            .map(|c| format!("Q: {}\nA: {}", c.question, c.answer.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        let refined = with_timeout(
            "query refinement",
            self.llm_timeout,
            self.llm.complete(
                &ResearchPrompts::refine_system(),
                &ResearchPrompts::refine_user(query, &transcript),
            ),
        )
        .await;

        match refined {
            Ok(text) => {
                let cleaned = text.replace("**", "").replace("## ", "").replace("# ", "");
                let cleaned = cleaned.trim();
                if cleaned.is_empty() {
                    query.to_string()
                } else {
                    cleaned.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "Query refinement failed, keeping the original query");
                query.to_string()
            }
        }
    }
}

/// Lines that read as questions, stripped of list markers
pub fn parse_questions(raw: &str, max: usize) -> Vec<String> {
    raw.lines()
        .map(|line| line.trim().replace("**", ""))
        .filter(|line| line.contains('?'))
        .map(|line| LIST_MARKER.replace(&line, "").trim().to_string())
        .filter(|line| line.len() > 1)
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays answers in order and records the user prompts
    struct Replay {
        answers: Mutex<Vec<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Replay {
        fn new(answers: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionService for Replay {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.answers.lock().unwrap().remove(0)
        }

        fn name(&self) -> &str {
            "replay"
        }
    }

    fn clarification(question: &str, answer: &str) -> Clarification {
        Clarification {
            question: question.into(),
            answer: answer.into(),
        }
    }

    #[test]
    fn test_parse_questions() {
        let raw = "Here are some questions:\n\
                   1. Which regions matter most?\n\
                   - **What time frame?**\n\
                   (3) Are industry sources acceptable?\n\
                   4. Anything else?";
        assert_eq!(
            parse_questions(raw, 3),
            vec![
                "Which regions matter most?",
                "What time frame?",
                "Are industry sources acceptable?",
            ]
        );
        assert!(parse_questions("No questions here.", 3).is_empty());
    }

    #[tokio::test]
    async fn test_questions_from_model() {
        let llm = Replay::new(vec![Ok("1. Scope?\n2. Depth?".into())]);
        let clarifier = QueryClarifier::new(llm.clone(), Duration::from_secs(5));

        let questions = clarifier.questions("grid storage").await.unwrap();
        assert_eq!(questions, vec!["Scope?", "Depth?"]);
        assert!(llm.prompts.lock().unwrap()[0].contains("grid storage"));
    }

    #[tokio::test]
    async fn test_refine_uses_answers() {
        let llm = Replay::new(vec![Ok("**Objective:** Compare storage costs\n## Focus\nEurope".into())]);
        let clarifier = QueryClarifier::new(llm.clone(), Duration::from_secs(5));

        let refined = clarifier
            .refine(
                "grid storage",
                &[clarification("Scope?", "costs"), clarification("Region?", "  ")],
            )
            .await;

        assert_eq!(refined, "Objective: Compare storage costs\nFocus\nEurope");
        let prompt = llm.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Q: Scope?\nA: costs"));
        assert!(!prompt.contains("Region?"));
    }

    #[tokio::test]
    async fn test_refine_keeps_query_without_answers_or_model() {
        let llm = Replay::new(vec![Err(ProviderError::Completion("down".into()))]);
        let clarifier = QueryClarifier::new(llm.clone(), Duration::from_secs(5));

        let unanswered = clarifier.refine("grid storage", &[clarification("Scope?", "")]).await;
        assert_eq!(unanswered, "grid storage");
        assert!(llm.prompts.lock().unwrap().is_empty());

        let failed = clarifier.refine("grid storage", &[clarification("Scope?", "costs")]).await;
        assert_eq!(failed, "grid storage");
    }
}
