//! Query parser
//!
//! Turns raw shopping text into a `StructuredQuery` with one JSON-mode LLM
//! call. The model output is validated field by field (see `payload`); any
//! provider failure or timeout yields the raw-text fallback, so parsing
//! never fails.

pub mod payload;
pub(crate) mod prompt;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::llm::{CompletionRequest, LanguageModel};
use crate::types::StructuredQuery;

pub use payload::{interpret, Interpretation};

/// Parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Hard ceiling on the extraction call
    pub timeout_ms: u64,
    pub temperature: f32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            temperature: 0.0,
        }
    }
}

impl ParserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// LLM-backed query parser
pub struct QueryParser {
    llm: Arc<dyn LanguageModel>,
    model: String,
    config: ParserConfig,
}

impl QueryParser {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>, config: ParserConfig) -> Self {
        Self {
            llm,
            model: model.into(),
            config,
        }
    }

    /// Parse with the configured timeout
    pub async fn parse(&self, raw: &str) -> StructuredQuery {
        self.parse_within(raw, self.config.timeout()).await.query
    }

    /// Parse with the timeout clipped to `budget`, keeping the degradations
    pub async fn parse_within(&self, raw: &str, budget: Duration) -> Interpretation {
        let timeout = self.config.timeout().min(budget);
        let request = CompletionRequest::text(
            &self.model,
            prompt::SYSTEM_PROMPT.to_string(),
            prompt::user_prompt(raw),
            self.config.temperature,
        )
        .with_schema(prompt::response_schema());

        let started = Instant::now();
        let completion = tokio::time::timeout(timeout, self.llm.complete(&request)).await;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "parse call finished");

        match completion {
            Ok(Ok(text)) => interpret(raw, &text),
            Ok(Err(e)) => Interpretation::fallback(raw, e.to_string()),
            Err(_) => Interpretation::fallback(
                raw,
                format!("extraction timed out after {}ms", timeout.as_millis()),
            ),
        }
    }
}
