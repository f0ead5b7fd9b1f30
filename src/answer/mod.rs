//! Answer composition
//!
//! Summarizes the top-N ranked products with one LLM call under a hard
//! timeout. Generation errors, timeouts, empty output and citations of
//! products outside the supplied set all fall back to a deterministic
//! template, so the caller always gets an answer.

pub(crate) mod prompt;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::llm::{CompletionRequest, LanguageModel};
use crate::pipeline::Deadline;
use crate::telemetry::Degradation;
use crate::types::{Candidate, Predicate};

pub use validate::{cited_ids, validate_answer, Violation};

/// Answer composer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Candidates passed to the model and named in the template
    pub top_n: usize,
    pub timeout_ms: u64,
    pub temperature: f32,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            timeout_ms: 30_000,
            temperature: 0.2,
        }
    }
}

impl AnswerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Deterministic answer built from the top titles
pub fn template_answer(raw_query: &str, results: &[Candidate], top_n: usize) -> String {
    if results.is_empty() {
        return empty_answer(raw_query);
    }
    let titles: Vec<&str> = results.iter().take(top_n).map(|c| c.title.as_str()).collect();
    format!(
        "Found {} results for '{}': {}",
        results.len(),
        raw_query,
        titles.join("; ")
    )
}

/// Answer for an empty result set
pub fn empty_answer(raw_query: &str) -> String {
    format!("No products matched '{}'.", raw_query)
}

pub struct AnswerComposer {
    llm: Arc<dyn LanguageModel>,
    model: String,
    config: AnswerConfig,
}

impl AnswerComposer {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>, config: AnswerConfig) -> Self {
        Self {
            llm,
            model: model.into(),
            config,
        }
    }

    /// Compose with the configured timeout
    pub async fn compose(&self, raw_query: &str, results: &[Candidate]) -> String {
        self.compose_within(raw_query, &[], results, &Deadline::unbounded())
            .await
            .0
    }

    /// Compose with the timeout clipped to `deadline`; parsed filters are
    /// shown to the model for context
    pub async fn compose_within(
        &self,
        raw_query: &str,
        filters: &[Predicate],
        results: &[Candidate],
        deadline: &Deadline,
    ) -> (String, Option<Degradation>) {
        if results.is_empty() {
            return (empty_answer(raw_query), None);
        }

        let top = &results[..results.len().min(self.config.top_n.max(1))];
        let request = CompletionRequest::text(
            &self.model,
            prompt::SYSTEM_PROMPT.to_string(),
            prompt::user_prompt(raw_query, filters, top),
            self.config.temperature,
        );
        let timeout = deadline.clip(self.config.timeout());
        let started = Instant::now();

        let outcome = tokio::time::timeout(timeout, self.llm.complete(&request)).await;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "generation call finished");

        let reason = match outcome {
            Ok(Ok(text)) => {
                let allowed: HashSet<&str> = top.iter().map(|c| c.item_id.as_str()).collect();
                match validate_answer(&text, &allowed) {
                    Ok(()) => return (text.trim().to_string(), None),
                    Err(violation) => violation.to_string(),
                }
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("generation timed out after {}ms", timeout.as_millis()),
        };

        (
            template_answer(raw_query, results, self.config.top_n),
            Some(Degradation::GenerationDegraded { reason }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Result, ShopError};
    use crate::types::StoreHit;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn candidate(id: &str, title: &str) -> Candidate {
        Candidate::from_hit(StoreHit {
            id: id.to_string(),
            similarity: 0.5,
            metadata: json!({"title": title}).as_object().cloned().unwrap(),
        })
    }

    fn results() -> Vec<Candidate> {
        vec![
            candidate("B1", "Pegasus 40"),
            candidate("B2", "Ghost 15"),
            candidate("B3", "Clifton 9"),
        ]
    }

    enum Reply {
        Text(&'static str),
        Fail,
        Stall,
    }

    struct Scripted {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Fail => Err(ShopError::Llm("HTTP 500".to_string())),
                Reply::Stall => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("late".to_string())
                }
            }
        }
    }

    fn composer(llm: Arc<Scripted>, timeout_ms: u64) -> AnswerComposer {
        AnswerComposer::new(
            llm,
            "test-model",
            AnswerConfig {
                top_n: 2,
                timeout_ms,
                temperature: 0.2,
            },
        )
    }

    #[test]
    fn test_template_answer() {
        assert_eq!(
            template_answer("running shoes", &results(), 2),
            "Found 3 results for 'running shoes': Pegasus 40; Ghost 15"
        );
        assert_eq!(template_answer("x", &[], 5), "No products matched 'x'.");
    }

    #[tokio::test]
    async fn test_grounded_answer_passes() {
        let llm = Arc::new(Scripted::new(Reply::Text("The Pegasus 40 [B1] is a great pick.")));
        let (text, degradation) = composer(llm, 1_000)
            .compose_within("running shoes", &[], &results(), &Deadline::unbounded())
            .await;
        assert_eq!(text, "The Pegasus 40 [B1] is a great pick.");
        assert!(degradation.is_none());
    }

    #[tokio::test]
    async fn test_citation_outside_top_n_falls_back() {
        // B3 was retrieved but not shown to the model
        let llm = Arc::new(Scripted::new(Reply::Text("Try the Clifton 9 [B3].")));
        let (text, degradation) = composer(llm, 1_000)
            .compose_within("running shoes", &[], &results(), &Deadline::unbounded())
            .await;
        assert!(text.starts_with("Found 3 results"));
        assert!(matches!(degradation, Some(Degradation::GenerationDegraded { .. })));
    }

    #[tokio::test]
    async fn test_uncited_answer_falls_back() {
        let llm = Arc::new(Scripted::new(Reply::Text(
            "You should buy the Nike Air Zoom Turbo 9000, it is $45.",
        )));
        let (text, degradation) = composer(llm, 1_000)
            .compose_within("running shoes", &[], &results(), &Deadline::unbounded())
            .await;
        assert_eq!(text, "Found 3 results for 'running shoes': Pegasus 40; Ghost 15");
        match degradation {
            Some(Degradation::GenerationDegraded { reason }) => assert!(reason.contains("cites no")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_and_timeout_fall_back() {
        let llm = Arc::new(Scripted::new(Reply::Fail));
        let text = composer(llm, 1_000).compose("running shoes", &results()).await;
        assert_eq!(text, "Found 3 results for 'running shoes': Pegasus 40; Ghost 15");

        let llm = Arc::new(Scripted::new(Reply::Stall));
        let (text, degradation) = composer(llm, 20)
            .compose_within("running shoes", &[], &results(), &Deadline::unbounded())
            .await;
        assert!(text.contains("Pegasus 40"));
        match degradation {
            Some(Degradation::GenerationDegraded { reason }) => assert!(reason.contains("timed out")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_results_skip_the_model() {
        let llm = Arc::new(Scripted::new(Reply::Text("anything")));
        let text = composer(Arc::clone(&llm), 1_000).compose("unicorn saddle", &[]).await;
        assert_eq!(text, "No products matched 'unicorn saddle'.");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }
}
